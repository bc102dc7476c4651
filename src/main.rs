use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ship_it::{AppClientFactory, AppState, Config};

#[derive(Parser)]
#[command(name = "ship-it")]
#[command(about = "GitHub App that cuts release candidates and promotes them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level for ship-it itself; RUST_LOG takes precedence
    #[arg(long, global = true, env = "SHIP_IT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive GitHub webhooks
    Serve {
        /// GitHub App id
        #[arg(long, env = "SHIP_IT_APP_ID")]
        app_id: u64,

        /// Path to the GitHub App private key (PEM)
        #[arg(long, env = "SHIP_IT_KEY_FILE")]
        key_file: PathBuf,

        /// Webhook secret; empty disables signature checks
        #[arg(long, env = "SHIP_IT_SECRET", default_value = "", hide_env_values = true)]
        secret: String,

        /// Port to listen on
        #[arg(long, env = "SHIP_IT_PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Validate a local .ship-it file and print the effective policy
    CheckConfig {
        /// Path to the policy file
        file: PathBuf,

        /// Default branch of the repository the file belongs to
        #[arg(long, default_value = "main")]
        default_branch: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn").add_directive(
            format!("ship_it={}", cli.log_level)
                .parse()
                .context("Invalid log level")?,
        ),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            app_id,
            key_file,
            secret,
            port,
        } => {
            run_server(app_id, key_file, secret, port).await?;
        }
        Commands::CheckConfig {
            file,
            default_branch,
        } => {
            check_config(file, &default_branch)?;
        }
    }

    Ok(())
}

async fn run_server(app_id: u64, key_file: PathBuf, secret: String, port: u16) -> Result<()> {
    let key = fs::read(&key_file)
        .with_context(|| format!("Failed to read private key: {}", key_file.display()))?;

    let factory = AppClientFactory::new(app_id, &key)?;
    let state = AppState::new(factory, secret);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(app_id, port, "Starting ship-it");

    ship_it::serve(addr, state).await
}

fn check_config(file: PathBuf, default_branch: &str) -> Result<()> {
    let config = Config::load(&file, default_branch)?;

    let rendered = serde_yaml::to_string(&config).context("Failed to render policy")?;
    println!("{}", rendered);

    Ok(())
}
