mod app;

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    sync::Arc,
    time::Duration,
};

use tracing_subscriber::{prelude::*, EnvFilter};
use yardsim_core::{
    config::{self, AppConfig},
    Advisor, AdvisoryRequest, YardSimulation,
};

const HEADLESS_FLAG: &str = "--headless";

#[tokio::main]
async fn main() -> Result<()> {
    let headless = std::env::args().any(|arg| arg == HEADLESS_FLAG);
    init_logging(headless)?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;

    let mut simulation = YardSimulation::from_config(&config)?;
    let advisor = Arc::new(Advisor::from_config(&config.advisor, simulation.topology())?);
    simulation.start();

    if headless {
        return run_headless(simulation, &advisor).await;
    }

    let mut app = app::YardApp::new(simulation, advisor);
    app.run().await
}

/// Apply one advisory batch and print snapshots as JSON lines until the yard
/// is at rest again.
async fn run_headless(simulation: YardSimulation, advisor: &Advisor) -> Result<()> {
    let request = AdvisoryRequest::from_snapshot(&simulation.snapshot());
    let batch = advisor.propose(&request).await?;
    tracing::info!(
        source = %advisor.describe(),
        assignments = batch.assignments.len(),
        "Advice received"
    );
    simulation.commands().apply_assignments(&batch.assignments);

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    loop {
        ticker.tick().await;
        let snapshot = simulation.snapshot();
        println!("{}", serde_json::to_string(&snapshot)?);
        if !snapshot.is_animating {
            break;
        }
    }
    Ok(())
}

fn init_logging(to_console: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("yardsim.log");

    let env_filter = EnvFilter::from_default_env();

    // The terminal belongs to the UI unless running headless; stdout then
    // carries snapshots, so console logs go to stderr.
    let console_layer = to_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
