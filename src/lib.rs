pub mod cli;
pub mod core;
pub mod providers;

use crate::cli::settings::SettingsAction;
use crate::core::CurrencyCode;
use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Rates { base: Option<CurrencyCode> },
    Convert {
        amount: String,
        base: Option<CurrencyCode>,
    },
    Settings(SettingsAction),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxview starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        base_url = %config.providers.exchangerate.base_url,
        data_path = ?config.data_path,
        "Loaded config"
    );
    if config.providers.exchangerate.api_key.trim().is_empty() {
        warn!("No API key configured for the exchangerate provider");
    }

    match command {
        AppCommand::Rates { base } => cli::rates::run(&config, base).await,
        AppCommand::Convert { amount, base } => cli::convert::run(&config, &amount, base).await,
        AppCommand::Settings(action) => cli::settings::run(&config, action).await,
    }
}
