//! Deletes every node and relationship in the configured Neo4j database.
//!
//! Usage: cargo run --bin reset-graph -- --yes

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use socialgraph_common::Config;
use socialgraph_graph::{GraphClient, GraphWriter};

#[derive(Parser)]
#[command(name = "reset-graph", about = "Wipe the crawled graph")]
struct Cli {
    /// Confirm the wipe
    #[arg(long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("socialgraph=info".parse()?))
        .init();

    let cli = Cli::parse();
    if !cli.yes {
        bail!("refusing to wipe the graph without --yes");
    }

    let config = Config::store_from_env()?;
    info!(uri = config.neo4j_uri.as_str(), "Clearing graph");

    let client = GraphClient::from_config(&config).await?;
    GraphWriter::new(client).clear_all().await?;

    Ok(())
}
