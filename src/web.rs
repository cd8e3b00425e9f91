#![cfg(not(tarpaulin_include))]

use plotdesk::app;
use plotdesk::config::AppConfig;

/// Main entry point for the web application
///
/// Reads the listen address and data directory from `PLOTDESK_ADDR` /
/// `PLOTDESK_DATA_DIR` or positional arguments `[addr] [data_dir]`, then
/// runs the server until it stops.
///
/// Log output is controlled by `RUST_LOG` (default `info`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    app::run(config).await
}
