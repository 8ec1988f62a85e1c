//! Entry point for the `parlance` binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parlance_engine::SessionEngine;
use parlance_gateway::GatewayServer;
use parlance_store::{MemoryStore, SqliteStore};

#[derive(Parser)]
#[command(name = "parlance", about = "Conversation session service", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "parlance.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Bind address, overrides the config file
        #[arg(long)]
        host: Option<String>,

        /// Bind port, overrides the config file
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StorageConfig {
    #[serde(default)]
    backend: StorageBackend,
    #[serde(default = "default_db_path")]
    path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("parlance.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

async fn load_config(path: &Path) -> Result<Config> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => {
            let config = toml::from_str(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?;
            info!(path = %path.display(), "Loaded config");
            Ok(config)
        }
        // The service runs fine with no config file at all.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No config file, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            Err(e).with_context(|| format!("failed to read config file {}", path.display()))
        }
    }
}

async fn build_engine(storage: &StorageConfig) -> Result<SessionEngine> {
    Ok(match storage.backend {
        StorageBackend::Sqlite => {
            let store = Arc::new(SqliteStore::connect(storage.path.clone()).await?);
            SessionEngine::new(store.clone(), store)
        }
        StorageBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            SessionEngine::new(store.clone(), store)
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            let engine = Arc::new(build_engine(&config.storage).await?);
            let app = GatewayServer::build(engine);

            let addr = format!("{host}:{port}");
            info!("Starting Parlance gateway on {}", addr);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Parlance gateway listening on {}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
