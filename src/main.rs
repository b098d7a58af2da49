//! finbot server binary
//!
//! Loads the YAML configuration, opens the SQLite database, and serves
//! the HTTP API.

use clap::Parser;
use finbot_config::Config;
use finbot_store::Database;
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "finbot", about = "Multi-tenant finance backend", version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Print the default configuration and exit
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_default_config {
        print!("{}", Config::generate_default());
        return Ok(());
    }

    let config_missing = !args.config.exists();
    let config = if config_missing {
        Config::default()
    } else {
        Config::load(args.config.clone())?
    };

    // RUST_LOG still wins over the configured level
    env_logger::Builder::new()
        .parse_filters(&config.logging.level)
        .parse_default_env()
        .init();

    if config_missing {
        warn!(
            "Config file {} not found, using defaults",
            args.config.display()
        );
    }

    let db = Database::open(&config.database.path)?;
    info!("Database ready at {}", config.database.path.display());

    finbot_api::start_server(config, db).await
}
