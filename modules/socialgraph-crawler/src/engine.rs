//! Depth-bounded concurrent traversal.
//!
//! The crawl is a queue of [`Task`]s drained by at most `pool_size` spawned
//! workers. A task does one unit of work (visit an entity, link to a known
//! entity, or subscribe to a group) and returns the tasks it discovered, each
//! carrying its own remaining depth. Nothing recurses, so stack use does not
//! grow with traversal depth.
//!
//! Per-entity lifecycle, reported in the `state` field of log events:
//! `claimed → fetching → persisted → expanding → done`, with `failed`
//! reachable from `fetching` and `expanding`.
//!
//! A Follow edge to an entity claimed by another branch is held in the
//! [`VisitedRegistry`] until that entity's visit settles. It is scheduled once
//! the entity has a node and dropped if it never gets one.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use socialgraph_common::{Config, Entity, Group, NodeHandle, RelationshipKind};

use crate::fetcher::RateLimitedFetcher;
use crate::sink::UpsertSink;
use crate::visited::{LinkTarget, VisitedRegistry};

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Hops from the seed whose connection lists are expanded.
    pub max_depth: u32,
    /// Maximum tasks in flight.
    pub pool_size: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            pool_size: 8,
        }
    }
}

impl From<&Config> for CrawlConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_depth: config.max_depth,
            pool_size: config.pool_size,
        }
    }
}

/// Counters from a crawl run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub entities_claimed: u32,
    pub entities_persisted: u32,
    pub invalid_entities: u32,
    pub groups_persisted: u32,
    pub edges_merged: u32,
    pub failures: u32,
    pub tasks_panicked: u32,
}

impl CrawlStats {
    fn absorb(&mut self, other: &CrawlStats) {
        self.entities_persisted += other.entities_persisted;
        self.invalid_entities += other.invalid_entities;
        self.groups_persisted += other.groups_persisted;
        self.edges_merged += other.edges_merged;
        self.failures += other.failures;
        self.tasks_panicked += other.tasks_panicked;
    }
}

impl fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Crawl Complete ===")?;
        writeln!(f, "Entities claimed:   {}", self.entities_claimed)?;
        writeln!(f, "Entities persisted: {}", self.entities_persisted)?;
        writeln!(f, "Invalid entities:   {}", self.invalid_entities)?;
        writeln!(f, "Groups persisted:   {}", self.groups_persisted)?;
        writeln!(f, "Edges merged:       {}", self.edges_merged)?;
        writeln!(f, "Failures:           {}", self.failures)?;
        write!(f, "Tasks panicked:     {}", self.tasks_panicked)
    }
}

/// Result of one crawl: counters plus what was discovered about the seed.
#[derive(Debug, Default, Clone)]
pub struct CrawlReport {
    pub seed: Option<Entity>,
    pub discovered_connections: Vec<String>,
    pub discovered_groups: Vec<Group>,
    pub stats: CrawlStats,
}

/// A unit of work for the pool.
#[derive(Debug)]
enum Task {
    /// Fetch and persist an already-claimed entity, link it from `parent`,
    /// then expand it if depth remains.
    Visit {
        id: String,
        parent: Option<NodeHandle>,
        remaining_depth: u32,
        seed: bool,
    },
    /// Follow edge to a persisted entity claimed by another branch.
    Link { source: NodeHandle, target: NodeHandle },
    /// Persist a group and subscribe `member` to it.
    Subscribe { member: NodeHandle, group: Group },
}

#[derive(Debug, Default)]
struct TaskOutcome {
    stats: CrawlStats,
    follow_ups: Vec<Task>,
    seed: Option<SeedDiscovery>,
}

#[derive(Debug)]
struct SeedDiscovery {
    entity: Entity,
    connections: Vec<String>,
    groups: Vec<Group>,
}

/// Collaborators shared by every task of one crawl.
#[derive(Clone)]
struct CrawlContext {
    fetcher: Arc<RateLimitedFetcher>,
    sink: Arc<UpsertSink>,
    registry: Arc<VisitedRegistry>,
}

pub struct Crawler {
    fetcher: Arc<RateLimitedFetcher>,
    sink: Arc<UpsertSink>,
    config: CrawlConfig,
}

impl Crawler {
    pub fn new(fetcher: RateLimitedFetcher, sink: UpsertSink, config: CrawlConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            sink: Arc::new(sink),
            config,
        }
    }

    /// Crawl from `seed` to the configured depth.
    pub async fn crawl(&self, seed: &str) -> CrawlReport {
        info!(
            seed,
            max_depth = self.config.max_depth,
            pool_size = self.config.pool_size,
            pacing_ms = self.fetcher.pacing().as_millis() as u64,
            "Starting crawl"
        );
        self.expand(seed, self.config.max_depth).await
    }

    /// Expand `id` with `remaining_depth` levels to go. Returns once every
    /// task transitively scheduled from it has completed or failed.
    ///
    /// Each call owns a fresh visited registry.
    pub async fn expand(&self, id: &str, remaining_depth: u32) -> CrawlReport {
        if remaining_depth < 1 {
            debug!(id, "Depth exhausted, nothing to expand");
            return CrawlReport::default();
        }
        if id.trim().is_empty() {
            warn!("Refusing to expand an empty id");
            return CrawlReport {
                stats: CrawlStats {
                    invalid_entities: 1,
                    ..Default::default()
                },
                ..Default::default()
            };
        }

        let ctx = CrawlContext {
            fetcher: self.fetcher.clone(),
            sink: self.sink.clone(),
            registry: Arc::new(VisitedRegistry::new()),
        };
        ctx.registry.try_claim(id);

        let root = Task::Visit {
            id: id.to_string(),
            parent: None,
            remaining_depth,
            seed: true,
        };
        let mut report = self.drive(&ctx, root).await;
        report.stats.entities_claimed = u32::try_from(ctx.registry.len()).unwrap_or(u32::MAX);

        info!(id, "{}", report.stats);
        report
    }

    /// Drain the task queue with a bounded pool of spawned workers.
    async fn drive(&self, ctx: &CrawlContext, root: Task) -> CrawlReport {
        let pool_size = self.config.pool_size.max(1);
        let mut report = CrawlReport::default();
        let mut queue = VecDeque::from([root]);
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < pool_size {
                let Some(task) = queue.pop_front() else { break };
                let ctx = ctx.clone();
                in_flight.push(tokio::spawn(async move { run_task(&ctx, task).await }));
            }

            match in_flight.next().await {
                Some(Ok(outcome)) => {
                    report.stats.absorb(&outcome.stats);
                    if let Some(seed) = outcome.seed {
                        report.seed = Some(seed.entity);
                        report.discovered_connections = seed.connections;
                        report.discovered_groups = seed.groups;
                    }
                    queue.extend(outcome.follow_ups);
                }
                Some(Err(e)) => {
                    error!(error = %e, "Crawl task panicked");
                    report.stats.tasks_panicked += 1;
                }
                None => break,
            }
        }

        report
    }
}

async fn run_task(ctx: &CrawlContext, task: Task) -> TaskOutcome {
    match task {
        Task::Visit {
            id,
            parent,
            remaining_depth,
            seed,
        } => visit(ctx, id, parent, remaining_depth, seed).await,
        Task::Link { source, target } => link(ctx, source, target).await,
        Task::Subscribe { member, group } => subscribe(ctx, member, group).await,
    }
}

async fn visit(
    ctx: &CrawlContext,
    id: String,
    parent: Option<NodeHandle>,
    remaining_depth: u32,
    seed: bool,
) -> TaskOutcome {
    let mut out = TaskOutcome::default();

    debug!(id = id.as_str(), remaining_depth, state = "claimed", "Visiting entity");
    ctx.fetcher.pace().await;

    debug!(id = id.as_str(), state = "fetching", "Fetching profile");
    let entity = match ctx.fetcher.fetch_profile(&id).await {
        Ok(entity) => entity,
        Err(e) => {
            warn!(id = id.as_str(), error = %e, state = "failed", "Profile fetch failed");
            out.stats.failures += 1;
            release(ctx, &[id.as_str()], None, &mut out);
            return out;
        }
    };

    // The source may answer for an alias (a screen name) with the canonical
    // id. The entity is owned by whichever visit claims the canonical id.
    let aliased = entity.is_valid() && entity.id != id;
    if aliased && !ctx.registry.try_claim(&entity.id) {
        debug!(
            id = id.as_str(),
            canonical = entity.id.as_str(),
            state = "done",
            "Canonical id already claimed"
        );
        for (source, target) in ctx.registry.redirect(&id, &entity.id) {
            out.follow_ups.push(Task::Link { source, target });
        }
        if let Some(parent) = parent {
            schedule_link(ctx, parent, &entity.id, &mut out);
        }
        return out;
    }
    let claimed: Vec<&str> = if aliased {
        vec![id.as_str(), entity.id.as_str()]
    } else {
        vec![id.as_str()]
    };

    let handle = match ctx.sink.upsert_entity(&entity).await {
        Ok(Some(handle)) => {
            out.stats.entities_persisted += 1;
            debug!(id = entity.id.as_str(), state = "persisted", "Entity persisted");
            Some(handle)
        }
        Ok(None) => {
            out.stats.invalid_entities += 1;
            None
        }
        Err(e) => {
            warn!(id = id.as_str(), error = %e, state = "failed", "Entity upsert failed");
            out.stats.failures += 1;
            release(ctx, &claimed, None, &mut out);
            return out;
        }
    };
    release(ctx, &claimed, handle.as_ref(), &mut out);

    if let (Some(parent), Some(handle)) = (&parent, &handle) {
        match ctx
            .sink
            .upsert_relationship(parent, handle, RelationshipKind::Follow)
            .await
        {
            Ok(()) => out.stats.edges_merged += 1,
            Err(e) => {
                warn!(from = %parent, to = %handle, error = %e, "Follow edge failed");
                out.stats.failures += 1;
            }
        }
    }

    if remaining_depth < 1 {
        debug!(id = id.as_str(), state = "done", "Depth exhausted");
        return out;
    }

    // Lookups go by the canonical id; an entity without one keeps the id it
    // was discovered under.
    let lookup_id = if entity.is_valid() { entity.id.as_str() } else { id.as_str() };

    debug!(id = lookup_id, state = "expanding", "Fetching connections and groups");
    let connections = match ctx.fetcher.fetch_connections(lookup_id).await {
        Ok(c) => c,
        Err(e) => {
            warn!(id = lookup_id, error = %e, state = "failed", "Connection fetch failed");
            out.stats.failures += 1;
            return out;
        }
    };
    let groups = match ctx.fetcher.fetch_groups(lookup_id).await {
        Ok(g) => g,
        Err(e) => {
            warn!(id = lookup_id, error = %e, state = "failed", "Group fetch failed");
            out.stats.failures += 1;
            return out;
        }
    };

    if handle.is_none() {
        debug!(
            id = lookup_id,
            connections = connections.len(),
            groups = groups.len(),
            "No node for entity, expanding connections without edges"
        );
    }

    for connection in &connections {
        if connection.trim().is_empty() {
            out.stats.invalid_entities += 1;
            continue;
        }
        if ctx.registry.try_claim(connection) {
            out.follow_ups.push(Task::Visit {
                id: connection.clone(),
                parent: handle.clone(),
                remaining_depth: remaining_depth - 1,
                seed: false,
            });
        } else if let Some(handle) = &handle {
            schedule_link(ctx, handle.clone(), connection, &mut out);
        }
    }

    if let Some(handle) = &handle {
        for group in &groups {
            out.follow_ups.push(Task::Subscribe {
                member: handle.clone(),
                group: group.clone(),
            });
        }
    }

    info!(
        id = lookup_id,
        connections = connections.len(),
        groups = groups.len(),
        scheduled = out.follow_ups.len(),
        state = "done",
        "Entity expanded"
    );

    if seed {
        out.seed = Some(SeedDiscovery {
            entity,
            connections,
            groups,
        });
    }
    out
}

/// Link `source` to an entity claimed elsewhere, once that entity has a node.
fn schedule_link(ctx: &CrawlContext, source: NodeHandle, id: &str, out: &mut TaskOutcome) {
    match ctx.registry.link_to(id, source.clone()) {
        LinkTarget::Ready(target) => out.follow_ups.push(Task::Link { source, target }),
        LinkTarget::Deferred => debug!(from = %source, to = id, "Link waits for visit"),
        LinkTarget::Dropped => debug!(from = %source, to = id, "Link target unavailable, dropped"),
    }
}

/// Settle the visit outcome for every id it claimed. Links that were waiting
/// on those ids are scheduled when the entity persisted and dropped otherwise.
fn release(ctx: &CrawlContext, ids: &[&str], handle: Option<&NodeHandle>, out: &mut TaskOutcome) {
    for id in ids {
        let waiting = ctx.registry.settle(id, handle);
        match handle {
            Some(target) => out.follow_ups.extend(waiting.into_iter().map(|source| Task::Link {
                source,
                target: target.clone(),
            })),
            None if !waiting.is_empty() => {
                debug!(id = *id, dropped = waiting.len(), "Dropping links to unavailable entity")
            }
            None => {}
        }
    }
}

async fn link(ctx: &CrawlContext, source: NodeHandle, target: NodeHandle) -> TaskOutcome {
    let mut out = TaskOutcome::default();
    match ctx
        .sink
        .upsert_relationship(&source, &target, RelationshipKind::Follow)
        .await
    {
        Ok(()) => out.stats.edges_merged += 1,
        Err(e) => {
            warn!(from = %source, to = %target, error = %e, "Follow edge failed");
            out.stats.failures += 1;
        }
    }
    out
}

async fn subscribe(ctx: &CrawlContext, member: NodeHandle, group: Group) -> TaskOutcome {
    let mut out = TaskOutcome::default();

    let group_handle = match ctx.sink.upsert_group(&group).await {
        Ok(h) => {
            out.stats.groups_persisted += 1;
            h
        }
        Err(e) => {
            warn!(group = group.id.as_str(), error = %e, "Group upsert failed");
            out.stats.failures += 1;
            return out;
        }
    };

    match ctx
        .sink
        .upsert_relationship(&member, &group_handle, RelationshipKind::Subscribe)
        .await
    {
        Ok(()) => out.stats.edges_merged += 1,
        Err(e) => {
            warn!(from = %member, to = %group_handle, error = %e, "Subscribe edge failed");
            out.stats.failures += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_summary_lists_every_counter() {
        let stats = CrawlStats {
            entities_claimed: 3,
            entities_persisted: 2,
            failures: 1,
            edges_merged: 2,
            ..Default::default()
        };

        // Every claimed entity was either persisted or failed.
        assert_eq!(stats.entities_claimed - stats.entities_persisted, stats.failures);

        let text = stats.to_string();
        assert!(text.contains("Entities claimed:   3"));
        assert!(text.contains("Edges merged:       2"));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["entities_claimed"], 3);
        assert_eq!(json["failures"], 1);
    }

    #[test]
    fn crawl_config_defaults() {
        let config = CrawlConfig::default();
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.pool_size, 8);
    }
}
