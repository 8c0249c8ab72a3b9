pub mod cli;
pub mod core;
pub mod extend;
pub mod forecast;
pub mod ingest;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod providers;

use anyhow::Result;
use tracing::{debug, info};

pub use cli::forecast::ForecastArgs;

pub enum AppCommand {
    Forecast(ForecastArgs),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Salecast starting...");

    let config = match config_path {
        Some(path) => core::config::AppConfig::load_from_path(path)?,
        None => core::config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Forecast(args) => cli::forecast::run(&config, &args).await,
    }
}
