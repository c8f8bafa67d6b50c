//! azure-smoke: runs Azure SDK smoke scenarios against local emulators.

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use azure_smoke::{scenario, Args, Config, Scenario};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug {
        Level::DEBUG
    } else if args.silent {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let scenarios = if args.scenarios.is_empty() {
        Scenario::defaults()
    } else {
        args.scenarios.clone()
    };

    let config = Config::from(args);
    let report = scenario::run_all(&scenarios, &config).await;

    for result in &report.results {
        println!(
            "{:<15} {:<8} {:>7.2}s",
            result.scenario.as_str(),
            match result.outcome {
                scenario::Outcome::Passed => "passed",
                scenario::Outcome::Failed(_) => "FAILED",
            },
            result.elapsed.as_secs_f64()
        );
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
