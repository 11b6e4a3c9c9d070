//! Farmstead - Scenario Runner
//!
//! Loads a TOML scenario, runs it for a number of monthly steps and prints
//! the activity and shortfall events.

use clap::Parser;
use std::path::PathBuf;

use farmstead::arbitration::events::ArbitrationEvent;
use farmstead::core::error::Result;
use farmstead::simulation::scenario::Scenario;

/// Run a farm scenario and report resource arbitration outcomes
#[derive(Parser, Debug)]
#[command(name = "farmstead")]
#[command(about = "Run a farm scenario and report resource arbitration outcomes")]
struct Args {
    /// Scenario file (TOML)
    #[arg(long)]
    scenario: PathBuf,

    /// Number of monthly steps to run
    #[arg(long, default_value_t = 12)]
    steps: u64,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("farmstead=info")),
        )
        .init();

    let args = Args::parse();
    let scenario = Scenario::load_from_toml(&args.scenario)?;
    let mut farm = scenario.build()?;
    farm.initialise()?;

    for _ in 0..args.steps {
        let today = farm.calendar.today();
        let outcome = farm.run_step();
        for event in farm.events.drain() {
            if args.json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::error!("Failed to serialize event: {}", e),
                }
            } else {
                println!("{}-{:02} {}", today.year, today.month, describe(&event));
            }
        }
        outcome?;
    }

    let warnings = farm.diagnostics.warnings().count();
    if warnings > 0 {
        tracing::warn!(warnings, "run finished with warnings");
    }
    tracing::info!(steps = args.steps, "run complete");
    Ok(())
}

fn describe(event: &ArbitrationEvent) -> String {
    match event {
        ArbitrationEvent::ActivityPerformed {
            activity_name, status, ..
        } => format!("[a={}] {:?}", activity_name, status),
        ArbitrationEvent::Shortfall {
            activity_name,
            resource,
            requested,
            available,
            route,
            ..
        } => format!(
            "[a={}] short of [r={}]: requested {:.2}, available {:.2} ({:?})",
            activity_name, resource, requested, available, route
        ),
    }
}
