use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use linkchain_core::{Block, ChainConfig, ChainManager, ValidationResult};
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "linkchain-cli")]
#[command(about = "CLI client for the linkchain node")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seal a JSON payload into a new block
    Propose {
        /// Node base URL (e.g. http://127.0.0.1:8080)
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        /// Payload as JSON, e.g. '{"qty":15}'
        #[arg(long)]
        payload: String,
    },
    /// Show the chain tip
    Head {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
    /// Fetch one block
    Block {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long)]
        index: u64,
    },
    /// List a page of blocks
    Blocks {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Ask the node to check the whole chain
    Verify {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
    /// Build the two-block example chain locally and check it
    Demo {
        /// Corrupt block 1 afterwards to show detection
        #[arg(long)]
        tamper: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Propose { node, payload } => {
            let payload: Value =
                serde_json::from_str(&payload).context("payload must be valid JSON")?;
            print_response(client.post(format!("{node}/blocks")).json(&payload)).await?;
        }
        Command::Head { node } => {
            print_response(client.get(format!("{node}/chain/head"))).await?;
        }
        Command::Block { node, index } => {
            print_response(client.get(format!("{node}/blocks/{index}"))).await?;
        }
        Command::Blocks { node, start, limit } => {
            let mut query = vec![("start", start)];
            if let Some(limit) = limit {
                query.push(("limit", limit));
            }
            print_response(client.get(format!("{node}/blocks")).query(&query)).await?;
        }
        Command::Verify { node } => {
            print_response(client.get(format!("{node}/chain/verify"))).await?;
        }
        Command::Demo { tamper } => {
            let result = run_demo(tamper)?;
            println!("{result}");
        }
    }
    Ok(())
}

async fn print_response(request: reqwest::RequestBuilder) -> Result<()> {
    let res = request.send().await?;
    let status = res.status();
    let body = res.text().await?;
    debug!(%status, bytes = body.len(), "response received");
    println!("status: {}", status);
    println!("{body}");
    Ok(())
}

/// Genesis plus `{qty:15}` and `{qty:25}`, optionally with block 1's
/// payload rewritten behind the manager's back.
fn run_demo(tamper: bool) -> Result<ValidationResult> {
    let chain = ChainManager::new(ChainConfig::default());
    println!("<<Adding 1st block>>");
    let first = chain.propose(&json!({ "qty": 15 }))?;
    println!("Sealed block {} with digest {}", first.index(), hex::encode(first.digest()));
    println!("<<Adding 2nd block>>");
    let second = chain.propose(&json!({ "qty": 25 }))?;
    println!("Sealed block {} with digest {}", second.index(), hex::encode(second.digest()));

    if !tamper {
        return Ok(chain.verify());
    }
    let mut blocks = chain.snapshot();
    let (index, timestamp, _, previous, digest) = blocks[1].clone().into_parts();
    blocks[1] = Block::from_parts(index, timestamp, json!({ "qty": 1500 }), previous, digest);
    println!("<<Rewrote block 1 payload to {{\"qty\":1500}}>>");
    let tampered = ChainManager::restore(blocks, ChainConfig::default())?;
    Ok(tampered.verify())
}
