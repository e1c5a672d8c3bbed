use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxview::cli::settings::SettingsAction;
use fxview::core::CurrencyCode;
use fxview::core::log::init_logging;

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

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display latest exchange rates for the displayed currencies
    Rates {
        /// Switch to this base currency first (persisted)
        #[arg(short, long)]
        base: Option<CurrencyCode>,
    },
    /// Convert an amount of the base currency
    Convert {
        /// Amount in the base currency, e.g. 125.50
        amount: String,
        /// Switch to this base currency first (persisted)
        #[arg(short, long)]
        base: Option<CurrencyCode>,
    },
    /// Show or change display settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsCommands>,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Change the base currency and refresh rates
    Base { code: CurrencyCode },
    /// Replace the ordered list of displayed currencies
    Display {
        #[arg(required = true)]
        codes: Vec<CurrencyCode>,
    },
    /// Show or hide a single currency
    Toggle { code: CurrencyCode },
}

impl From<SettingsCommands> for SettingsAction {
    fn from(cmd: SettingsCommands) -> SettingsAction {
        match cmd {
            SettingsCommands::Base { code } => SettingsAction::SetBase(code),
            SettingsCommands::Display { codes } => SettingsAction::SetDisplayed(codes),
            SettingsCommands::Toggle { code } => SettingsAction::Toggle(code),
        }
    }
}

impl From<Commands> for fxview::AppCommand {
    fn from(cmd: Commands) -> fxview::AppCommand {
        match cmd {
            Commands::Rates { base } => fxview::AppCommand::Rates { base },
            Commands::Convert { amount, base } => fxview::AppCommand::Convert { amount, base },
            Commands::Settings { action } => fxview::AppCommand::Settings(
                action.map_or(SettingsAction::Show, SettingsAction::from),
            ),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => fxview::cli::setup::setup_at_path(path),
            None => fxview::cli::setup::setup(),
        },
        Some(cmd) => fxview::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
