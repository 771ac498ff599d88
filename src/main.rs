//! Weirdhost Keeper - one-shot renewal and startup run
//!
//! Reads its configuration from the environment, drives the panel in a real
//! browser, writes the status report, and exits non-zero when any target
//! carries a login-failure or error marker.

use std::process::ExitCode;

use tracing::{error, info};

use weirdhost_keeper::config::Config;
use weirdhost_keeper::runner::Runner;
use weirdhost_keeper::{init_logging, report};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::from(1);
        }
    };

    info!(
        "Starting renewal run for {} server(s)",
        config.targets.len()
    );
    for (i, target) in config.targets.iter().enumerate() {
        info!("Server {}: {}", i + 1, target.url);
    }

    let runner = Runner::new(config);
    let book = runner.run().await;

    if let Err(e) = report::write(&book, report::REPORT_PATH) {
        error!("Failed to write report: {:#}", e);
    }

    for (id, outcome) in book.entries() {
        info!(
            "{}: renew={} start={}",
            id,
            outcome.renew.tag(),
            outcome.start.tag()
        );
    }
    info!(
        "Renewed {}/{}, started {}/{}",
        book.renew_success_count(),
        book.len(),
        book.start_success_count(),
        book.len()
    );

    if book.any_failure() {
        error!("Run finished with failures");
        ExitCode::from(1)
    } else {
        info!("Run finished successfully");
        ExitCode::SUCCESS
    }
}
