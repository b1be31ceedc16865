//! gvd - robot register daemon
//!
//! Reads one batch of command text from stdin, executes it against the
//! configured robot and prints the batch result as JSON on stdout. Logs go
//! to stderr so the JSON stream stays clean.

use anyhow::{Context, Result};
use clap::Parser;
use gvd::{Config, OutcomeStatus, RobotService};
use tokio::io::AsyncReadExt;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "gvd")]
#[command(about = "Robot register daemon - batch motion commands over Modbus TCP")]
#[command(version)]
struct Args {
    /// Path to the daemon configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Print a robot status snapshot as JSON and exit
    #[arg(long)]
    status: bool,
}

impl Args {
    fn config_path(&self) -> String {
        self.config
            .clone()
            .or_else(|| std::env::var("GVD_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/default_config.yaml".to_string())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config_path();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Using config: {}", config_path);
    let config = Config::load_from_path(&config_path).context("Failed to load configuration")?;
    let service = RobotService::from_config(&config);

    if args.status {
        let status = service
            .status()
            .await
            .context("Failed to read robot status")?;
        println!("{}", serde_json::to_string(&status)?);
        return Ok(());
    }

    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read command batch from stdin")?;

    match service.submit_batch(&text).await {
        Ok(result) => {
            println!("{}", serde_json::to_string(&result)?);
            if result.overall == OutcomeStatus::Error {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Batch rejected: {}", e);
            println!(
                "{}",
                serde_json::json!({ "status": "error", "message": e.to_string() })
            );
            std::process::exit(1);
        }
    }

    Ok(())
}
