pub mod cli;
pub mod core;
pub mod providers;

pub use crate::core::config;

use crate::core::dashboard::DashboardSettings;
use crate::core::{RatesProvider, Timeframe};
use crate::providers::{CachingRatesProvider, HttpRatesProvider};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    /// Print current rates once
    Rates,
    /// Print a trend chart once; missing values come from config
    Trend {
        currency: Option<String>,
        timeframe: Option<String>,
    },
    /// Run the live dashboard
    Watch,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxdash starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let http_provider = HttpRatesProvider::new(&config.api.base_url, config.request_timeout())?;
    let provider: Arc<dyn RatesProvider> =
        Arc::new(CachingRatesProvider::new(http_provider, &config.cache));

    match command {
        AppCommand::Rates => cli::rates::run(provider.as_ref()).await,
        AppCommand::Trend {
            currency,
            timeframe,
        } => {
            let currency = currency.unwrap_or_else(|| config.dashboard.currency.clone());
            let timeframe = match timeframe {
                Some(t) => t.parse::<Timeframe>()?,
                None => config.dashboard.timeframe,
            };
            cli::trend::run(provider.as_ref(), &currency, timeframe).await
        }
        AppCommand::Watch => {
            let settings = DashboardSettings::from(&config.dashboard);
            cli::watch::run(provider, settings).await
        }
    }
}
