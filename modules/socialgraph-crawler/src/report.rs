use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use socialgraph_common::{Entity, Group};
use socialgraph_graph::{GroupDegree, MutualPair, UserDegree};

use crate::engine::{CrawlReport, CrawlStats};
use crate::traits::AggregateReader;

/// Post-crawl snapshot written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub generated_at: DateTime<Utc>,
    pub user_info: Option<Entity>,
    pub followers: Vec<String>,
    pub groups: Vec<Group>,
    pub top_users: Vec<UserDegree>,
    pub top_groups: Vec<GroupDegree>,
    pub mutual_followers: Vec<MutualPair>,
    pub stats: CrawlStats,
}

/// Query the persisted graph and combine it with what the crawl saw of the seed.
pub async fn build_summary(reader: &dyn AggregateReader, report: &CrawlReport) -> Result<CrawlSummary> {
    info!("Querying graph aggregates");
    let top_users = reader.top_users().await.context("top users query failed")?;
    let top_groups = reader.top_groups().await.context("top groups query failed")?;
    let mutual_followers = reader
        .mutual_followers()
        .await
        .context("mutual followers query failed")?;

    Ok(CrawlSummary {
        generated_at: Utc::now(),
        user_info: report.seed.clone(),
        followers: report.discovered_connections.clone(),
        groups: report.discovered_groups.clone(),
        top_users,
        top_groups,
        mutual_followers,
        stats: report.stats.clone(),
    })
}

/// Write the summary as pretty-printed JSON.
pub async fn write_summary(summary: &CrawlSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    info!(path = %path.display(), "Report saved");
    Ok(())
}
