use crate::dto::HealthRes;

/// Simple health service shared by every API surface.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "QMS is alive".into(),
        }
    }
}
