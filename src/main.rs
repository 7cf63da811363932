use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxdash::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fxdash::AppCommand {
    fn from(cmd: Commands) -> fxdash::AppCommand {
        match cmd {
            Commands::Rates => fxdash::AppCommand::Rates,
            Commands::Trend {
                currency,
                timeframe,
            } => fxdash::AppCommand::Trend {
                currency,
                timeframe,
            },
            Commands::Watch => fxdash::AppCommand::Watch,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display current exchange rates
    Rates,
    /// Display the rate trend for a currency
    Trend {
        /// Currency code, e.g. EUR
        currency: Option<String>,

        /// One of: daily, weekly, monthly
        #[arg(short, long)]
        timeframe: Option<String>,
    },
    /// Run the live dashboard
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fxdash::cli::setup::setup(),
        Some(cmd) => fxdash::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
