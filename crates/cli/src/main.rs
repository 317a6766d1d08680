mod script;

use clap::{Parser, Subcommand};
use qms_core::config::{default_departments, load_department_seed};
use qms_core::{Clinic, CoreConfig, DepartmentId, PatientId, QueueStatus};
use qms_types::NonEmptyText;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "qms")]
#[command(about = "Hospital queue management CLI")]
struct Cli {
    /// YAML department seed file (defaults to the built-in departments)
    #[arg(long, global = true)]
    departments: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List departments
    Departments,
    /// Walk three patients through the cardiology queue
    Demo,
    /// Run a YAML script of queue operations against a fresh clinic
    Run {
        /// Path to the script
        script: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("qms_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let departments = match &cli.departments {
        Some(path) => load_department_seed(path)?,
        None => default_departments()?,
    };

    match cli.command {
        Some(Commands::Departments) => {
            for d in departments {
                println!(
                    "{:<12} {:<18} avg {:>3} min, staff {}",
                    d.id().as_str(),
                    d.name().as_str(),
                    d.average_processing_minutes(),
                    d.staff_available()
                );
            }
        }
        Some(Commands::Demo) => {
            let clinic = Clinic::new(Arc::new(CoreConfig::default()), departments)?;
            demo(&clinic)?;
        }
        Some(Commands::Run { script }) => {
            let text = std::fs::read_to_string(&script)?;
            let steps = script::parse(&text)?;
            let clinic = Clinic::new(Arc::new(CoreConfig::default()), departments)?;
            let mut session = script::Session::new(&clinic);
            for (i, step) in steps.into_iter().enumerate() {
                match session.run(step) {
                    Ok(output) => println!("[{}] {}", i + 1, output),
                    Err(e) => eprintln!("[{}] error ({}): {}", i + 1, e.kind(), e),
                }
            }
        }
        None => {
            println!("Use 'qms --help' for commands");
        }
    }

    Ok(())
}

fn demo(clinic: &Clinic) -> Result<(), Box<dyn std::error::Error>> {
    let cardiology = DepartmentId::parse("cardiology")?;
    let projector = clinic.projector();

    let mut entries = Vec::new();
    for (id, name) in [("A", "Alice Adams"), ("B", "Bob Brown"), ("C", "Carol Clark")] {
        let patient = PatientId::parse(id)?;
        clinic
            .patients()
            .register(patient.clone(), NonEmptyText::new(name)?, NonEmptyText::new("555-0100")?)?;
        entries.push(clinic.walk_in(&cardiology, &patient)?);
    }

    let print_queue = |title: &str| -> Result<(), Box<dyn std::error::Error>> {
        println!("{title}");
        for entry in clinic.engine().list_active(&cardiology)? {
            let snap = projector.project(&cardiology, &entry.id)?;
            println!(
                "  #{} {:<2} {:<16} wait {:>3} min  {:>5.1}%",
                snap.position,
                entry.patient_id.as_str(),
                entry.status.to_string(),
                snap.estimated_wait_minutes,
                snap.percent_complete
            );
        }
        Ok(())
    };

    print_queue("Cardiology queue after three arrivals:")?;
    clinic.set_entry_status(&entries[0].id, QueueStatus::NoShow)?;
    print_queue("After A is marked no-show:")?;
    clinic.set_entry_status(&entries[1].id, QueueStatus::InConsultation)?;
    print_queue("After B starts a consultation:")?;

    let summary = projector.summary(&cardiology)?;
    println!(
        "Summary: {} waiting, {} in consultation, {} no-show, load {}",
        summary.waiting, summary.in_consultation, summary.no_show, summary.load
    );
    Ok(())
}
