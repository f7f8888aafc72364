use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use socialgraph_common::Config;
use socialgraph_crawler::report::{build_summary, write_summary};
use socialgraph_crawler::{CrawlConfig, Crawler, RateLimitedFetcher, UpsertSink};
use socialgraph_graph::{migrate::migrate, GraphClient, GraphReader, GraphWriter};
use vk_client::VkClient;

#[derive(Parser)]
#[command(name = "socialgraph-crawler", about = "Crawl a VK social graph into Neo4j")]
struct Cli {
    /// Seed account id (overrides SEED_USER_ID)
    #[arg(long)]
    user_id: Option<String>,

    /// Traversal depth (overrides CRAWL_MAX_DEPTH)
    #[arg(long)]
    depth: Option<u32>,

    /// Report path (overrides REPORT_OUTPUT)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Crawl only, don't query aggregates or write the report
    #[arg(long)]
    skip_report: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("socialgraph=info".parse()?))
        .init();

    let cli = Cli::parse();

    info!("Social graph crawler starting...");

    let mut config = Config::from_env()?;
    if let Some(user_id) = cli.user_id {
        config.seed_user_id = user_id;
    }
    if let Some(depth) = cli.depth {
        config.max_depth = depth;
    }
    if let Some(output) = cli.output {
        config.report_output = output;
    }
    config.log_redacted();

    let client = GraphClient::from_config(&config).await?;
    migrate(&client).await?;

    let vk = Arc::new(VkClient::new(config.vk_access_token.clone()));
    let fetcher = RateLimitedFetcher::new(vk, config.pacing_delay);
    let sink = UpsertSink::new(Arc::new(GraphWriter::new(client.clone())));
    let crawler = Crawler::new(fetcher, sink, CrawlConfig::from(&config));

    let report = crawler.crawl(&config.seed_user_id).await;

    if cli.skip_report {
        info!("Skipping report");
        return Ok(());
    }

    let reader = GraphReader::new(client);
    let summary = build_summary(&reader, &report).await?;
    write_summary(&summary, &config.report_output).await?;

    let counts = reader.counts().await?;
    info!(
        users = counts.users,
        groups = counts.groups,
        follows = counts.follows,
        subscribes = counts.subscribes,
        "Graph totals"
    );

    Ok(())
}
