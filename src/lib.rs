//! Weirdhost Keeper
//!
//! Automates periodic renewal and startup of Weirdhost-hosted server
//! instances by driving a real Chrome browser: authenticate, open each
//! server's management page, click its renew and start controls, classify
//! what happened, and write a status report.

pub mod auth;
pub mod browser;
pub mod challenge;
pub mod config;
pub mod flows;
pub mod outcome;
pub mod report;
pub mod resolve;
pub mod runner;

/// Initialize console logging, filterable through `RUST_LOG`.
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}
