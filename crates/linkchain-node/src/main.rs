mod api;
mod constants;

use anyhow::Context;
use clap::Parser;
use linkchain_core::constants::{DEFAULT_LOCK_TIMEOUT_MS, GENESIS_PAYLOAD};
use linkchain_core::{ChainConfig, ChainManager};
use linkchain_storage::SledStore;
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{info, warn, Level};

use crate::api::{create_router, AppState};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Data directory for sled
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Keep the chain in memory only; nothing is written to disk
    #[arg(long)]
    in_memory: bool,

    /// Longest a proposal waits for the chain lock, in milliseconds
    #[arg(long, default_value_t = DEFAULT_LOCK_TIMEOUT_MS)]
    lock_timeout_ms: u64,

    /// Genesis payload for a new chain; parsed as JSON, or taken as a plain string
    #[arg(long, default_value = GENESIS_PAYLOAD)]
    genesis: String,
}

impl Args {
    fn chain_config(&self) -> ChainConfig {
        let genesis = serde_json::from_str(&self.genesis)
            .unwrap_or_else(|_| Value::from(self.genesis.as_str()));
        ChainConfig::default()
            .with_genesis_payload(genesis)
            .with_lock_timeout(Duration::from_millis(self.lock_timeout_ms))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.chain_config();
    let chain = if args.in_memory {
        info!("running with an in-memory chain");
        ChainManager::new(config)
    } else {
        let store = Arc::new(SledStore::open(&args.data_dir)?);
        ChainManager::open(store, config)
            .with_context(|| format!("load chain from {}", args.data_dir))?
    };

    let result = chain.verify();
    if result.is_valid() {
        info!(length = chain.snapshot_length(), "chain verified");
    } else {
        warn!(%result, "stored chain failed verification");
    }

    let state = AppState {
        chain: Arc::new(chain),
    };
    let app = create_router(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!("linkchain-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(genesis: &str) -> Args {
        Args::parse_from(["linkchain-node", "--genesis", genesis, "--lock-timeout-ms", "250"])
    }

    #[test]
    fn genesis_accepts_json() {
        let config = args(r#"{"network":"dev"}"#).chain_config();
        assert_eq!(config.genesis_payload, json!({"network": "dev"}));
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
    }

    #[test]
    fn genesis_falls_back_to_plain_text() {
        let config = args("Genesis Block").chain_config();
        assert_eq!(config.genesis_payload, json!("Genesis Block"));
    }
}
