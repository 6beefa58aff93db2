//! avcal CLI: camera and microphone discovery and calibration.
//!
//! Usage:
//!   avcal check                      Check device access
//!   avcal devices                    List devices and exclusions
//!   avcal acquire [--hold SECS] [--json]  Open every device and reconcile settings
//!   avcal show <ID>                  Show stored settings of a device
//!   avcal set-video <ID> [OPTIONS]   Replace a camera's image settings
//!   avcal set-volume <ID> <N>        Set a microphone's monitor volume
//!   avcal exclude <ACTION>           Maintain the exclusion list
//!   avcal reset <ID>                 Forget a device's stored settings
//!   avcal config [--write]           Show or write the configuration

use std::path::PathBuf;

use avcal_common::config::AppConfig;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "avcal",
    about = "Select and calibrate cameras and microphones",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings store to use instead of the configured one
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check camera and audio server access
    Check,

    /// List devices the platform exposes
    Devices,

    /// Open every non-excluded device and reconcile its settings
    Acquire {
        /// Keep the streams open for this many seconds (Ctrl+C ends early)
        #[arg(long)]
        hold: Option<u64>,

        /// Print the flow state and acquisition report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show stored settings of a device
    Show {
        /// Device identifier
        id: String,
    },

    /// Replace a camera's image settings and apply them live
    SetVideo {
        /// Camera identifier
        id: String,

        #[arg(long, allow_hyphen_values = true)]
        brightness: Option<i32>,

        #[arg(long, allow_hyphen_values = true)]
        contrast: Option<i32>,

        #[arg(long, allow_hyphen_values = true)]
        saturation: Option<i32>,
    },

    /// Set a microphone's monitor volume (0-100) and apply it live
    SetVolume {
        /// Microphone identifier
        id: String,

        /// Volume in [0, 100]
        volume: u8,
    },

    /// Maintain the list of hidden devices
    Exclude {
        #[command(subcommand)]
        action: ExcludeAction,
    },

    /// Forget a device's stored settings
    Reset {
        /// Device identifier
        id: String,
    },

    /// Show the effective configuration
    Config {
        /// Write it to the configuration file
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand)]
pub enum ExcludeAction {
    /// Hide a device
    Add { id: String },
    /// Show a hidden device again
    Remove { id: String },
    /// List hidden devices
    List,
    /// Show every device again
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    avcal_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Check => commands::check::run(),
        Commands::Devices => commands::devices::run(&config).await,
        Commands::Acquire { hold, json } => commands::acquire::run(&config, hold, json).await,
        Commands::Show { id } => commands::settings::show(&config, &id),
        Commands::SetVideo {
            id,
            brightness,
            contrast,
            saturation,
        } => commands::settings::set_video(&config, &id, brightness, contrast, saturation).await,
        Commands::SetVolume { id, volume } => {
            commands::settings::set_volume(&config, &id, volume).await
        }
        Commands::Exclude { action } => commands::exclude::run(&config, action),
        Commands::Reset { id } => commands::settings::reset(&config, &id),
        Commands::Config { write } => commands::config::run(&config, write),
    }
}
