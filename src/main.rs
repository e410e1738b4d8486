use clap::{Parser, Subcommand};
use std::fs;
use std::path::Path;

use hawk_storage::infrastructure::logging;
use hawk_storage::{Config, Diagnostics, JsonStore, Store};

#[derive(Parser)]
#[command(name = "hawk-storage")]
#[command(about = "Storage core of the Hawk messaging server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Data directory (overrides config)
    #[arg(short, long)]
    data_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the store and print what it holds
    Stats,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats => {
            let config = load_config(&cli.config, cli.data_dir);
            logging::init(&config.logging.level);
            if let Err(e) = stats(&config).await {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("hawk-storage v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            logging::init("info");
            init_config(&cli.config);
        }
    }
}

fn load_config(config_path: &str, data_dir: Option<String>) -> Config {
    let mut config = if Path::new(config_path).exists() {
        Config::load(config_path).unwrap_or_else(|e| {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(2);
        })
    } else {
        Config::load_env()
    };

    if let Some(dir) = data_dir {
        config.storage.data_dir = dir.into();
    }
    config
}

async fn stats(config: &Config) -> Result<(), hawk_storage::StorageError> {
    // Counted from the durable documents whatever backend is configured.
    tracing::info!("Reading documents in {}", config.storage.data_dir.display());

    let store = JsonStore::new(&config.storage.data_dir, Diagnostics::current());
    store.open().await?;
    let counts = store.counts().await?;

    println!("users:         {}", counts.users);
    println!("groups:        {}", counts.groups);
    println!("messages:      {}", counts.messages);
    println!("contact lists: {}", counts.contact_lists);

    store.close().await;
    Ok(())
}

fn init_config(path: &str) {
    if Path::new(path).exists() {
        eprintln!("{} already exists, not overwriting", path);
        std::process::exit(1);
    }

    let yaml = match Config::default().to_yaml() {
        Ok(yaml) => yaml,
        Err(e) => {
            eprintln!("Failed to serialize config: {}", e);
            std::process::exit(1);
        }
    };

    match fs::write(path, yaml) {
        Ok(_) => tracing::info!("Wrote default config to {}", path),
        Err(e) => {
            eprintln!("Failed to write {}: {}", path, e);
            std::process::exit(1);
        }
    }
}
