use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anthias_fleet::config::Config;

mod commands;

use commands::OutputFormat;

#[derive(Parser)]
#[command(
    name = "anthias-fleet",
    version,
    about = "Monitor and control Anthias signage players through a Fleet Manager",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange a username and password for an API token
    Login {
        /// Fleet Manager username
        #[arg(short, long)]
        username: String,

        /// Password
        #[arg(short, long, env = "FLEET_PASSWORD", hide_env_values = true)]
        password: String,

        /// Fleet Manager URL; overrides the config
        #[arg(long)]
        url: Option<String>,
    },

    /// Run one refresh cycle and print the fleet
    Snapshot {
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Include per-player readings
        #[arg(long)]
        readings: bool,
    },

    /// Keep polling and log every refresh until Ctrl+C
    Watch,

    /// Poll and serve the fleet status API
    Serve {
        /// Listen address; overrides the config
        #[arg(long)]
        bind: Option<String>,

        /// Disable CORS headers
        #[arg(long)]
        no_cors: bool,
    },

    /// List the Fleet Manager media library
    Media {
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Control a single player
    Player {
        /// Player id
        player_id: String,

        #[command(subcommand)]
        action: commands::player::PlayerAction,
    },

    /// Deploy a media file to a player
    Deploy {
        /// Player id
        player_id: String,

        /// Media file id
        media_file_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    match cli.command {
        Commands::Login {
            username,
            password,
            url,
        } => {
            tracing::info!(username = %username, "Starting login command");
            commands::login(&config, &username, &password, url).await?;
        }

        Commands::Snapshot { format, readings } => {
            tracing::info!(format = ?format, "Starting snapshot command");
            commands::snapshot(&config, format, readings).await?;
        }

        Commands::Watch => {
            tracing::info!("Starting watch command");
            commands::watch(&config).await?;
        }

        Commands::Serve { bind, no_cors } => {
            tracing::info!(bind = ?bind, "Starting serve command");
            commands::serve(config, bind, !no_cors).await?;
        }

        Commands::Media { format } => {
            tracing::info!(format = ?format, "Starting media command");
            commands::media(&config, format).await?;
        }

        Commands::Player { player_id, action } => {
            tracing::info!(player_id = %player_id, "Starting player command");
            commands::player(&config, player_id, action).await?;
        }

        Commands::Deploy {
            player_id,
            media_file_id,
        } => {
            tracing::info!(player_id = %player_id, media_file_id = %media_file_id, "Starting deploy command");
            commands::deploy(&config, player_id, media_file_id).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("anthias_fleet=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("anthias_fleet={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
