use std::sync::Arc;
use std::time::Duration;

use socialgraph_common::{CrawlError, Entity, Group};

use crate::traits::IdentitySource;

/// Paced, error-typed access to an [`IdentitySource`].
///
/// Callers invoke [`pace`](Self::pace) once per entity before its lookups.
/// Each worker sleeps on its own; there is no global token bucket.
pub struct RateLimitedFetcher {
    source: Arc<dyn IdentitySource>,
    pacing: Duration,
}

impl RateLimitedFetcher {
    pub fn new(source: Arc<dyn IdentitySource>, pacing: Duration) -> Self {
        Self { source, pacing }
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Wait out the per-entity pacing delay.
    pub async fn pace(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }

    pub async fn fetch_profile(&self, id: &str) -> Result<Entity, CrawlError> {
        self.source
            .profile(id)
            .await
            .map_err(|e| CrawlError::fetch(id, e))
    }

    /// Confirmed connections then pending requests. Duplicates are left in;
    /// the visited registry and idempotent edge merges absorb them.
    pub async fn fetch_connections(&self, id: &str) -> Result<Vec<String>, CrawlError> {
        self.source
            .connections(id)
            .await
            .map_err(|e| CrawlError::fetch(id, e))
    }

    /// Group memberships resolved with one batched details lookup.
    pub async fn fetch_groups(&self, id: &str) -> Result<Vec<Group>, CrawlError> {
        let ids = self
            .source
            .group_ids(id)
            .await
            .map_err(|e| CrawlError::fetch(id, e))?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.source
            .group_details(&ids)
            .await
            .map_err(|e| CrawlError::fetch(id, e))
    }
}
