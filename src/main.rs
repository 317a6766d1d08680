use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use qms_core::config::{
    consultation_limit_from_env_value, default_departments, load_department_seed,
    u32_from_env_value, usize_from_env_value,
};
use qms_core::constants::{DEFAULT_APPOINTMENT_SLOT_MINUTES, DEFAULT_HISTORY_LIMIT};
use qms_core::{Clinic, CoreConfig, Department, LoadThresholds};

/// Main entry point for the QMS application
///
/// Resolves configuration from the environment, builds the clinic services and serves the REST
/// API until interrupted.
///
/// # Environment Variables
/// - `QMS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `QMS_HISTORY_LIMIT`: retained no-show/completed entries per department (default: 50)
/// - `QMS_CONSULTATION_LIMIT`: `unlimited`, `staff` or a positive integer (default: unlimited)
/// - `QMS_APPOINTMENT_SLOT_MINUTES`: booking overlap window (default: 30)
/// - `QMS_DEPARTMENTS_FILE`: optional YAML department seed
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("qms=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("QMS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(core_config_from_env()?);
    let departments = departments_from_env()?;
    tracing::info!(
        departments = departments.len(),
        history_limit = cfg.history_limit(),
        consultation_limit = ?cfg.consultation_limit(),
        "configuration resolved"
    );

    let clinic = Arc::new(Clinic::new(cfg, departments)?);
    let app = router(AppState::new(clinic));

    tracing::info!("++ Starting QMS REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- QMS REST stopped");
    Ok(())
}

fn core_config_from_env() -> anyhow::Result<CoreConfig> {
    let history_limit = usize_from_env_value(
        std::env::var("QMS_HISTORY_LIMIT").ok(),
        DEFAULT_HISTORY_LIMIT,
    )?;
    let consultation_limit =
        consultation_limit_from_env_value(std::env::var("QMS_CONSULTATION_LIMIT").ok())?;
    let slot_minutes = u32_from_env_value(
        std::env::var("QMS_APPOINTMENT_SLOT_MINUTES").ok(),
        DEFAULT_APPOINTMENT_SLOT_MINUTES,
    )?;

    Ok(CoreConfig::new(
        history_limit,
        consultation_limit,
        slot_minutes,
        LoadThresholds::default(),
    )?)
}

fn departments_from_env() -> anyhow::Result<Vec<Department>> {
    match std::env::var("QMS_DEPARTMENTS_FILE") {
        Ok(path) if !path.trim().is_empty() => {
            tracing::info!("loading departments from {}", path);
            Ok(load_department_seed(Path::new(path.trim()))?)
        }
        _ => Ok(default_departments()?),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
