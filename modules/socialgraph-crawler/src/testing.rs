// Test mocks for the crawler.
//
// Two mocks matching the trait boundaries:
// - MockSource (IdentitySource): HashMap-based id→profile/connections/groups,
//   with per-id call counters and optional latency
// - MemoryGraph (GraphStore + AggregateReader): stateful in-memory graph
//   with MERGE semantics

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use socialgraph_common::{Entity, Group, NodeHandle, NodeLabel, RelationshipKind};
use socialgraph_graph::{GroupDegree, MutualPair, UserDegree, UserRef};

use crate::traits::{AggregateReader, GraphStore, IdentitySource};

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// HashMap-based identity source. Returns `Err` for unregistered or failing ids.
/// Builder pattern: `.user()`, `.connections()`, `.pending()`, `.groups()`, `.group()`.
#[derive(Default)]
pub struct MockSource {
    profiles: HashMap<String, Entity>,
    aliases: HashMap<String, String>,
    connections: HashMap<String, Vec<String>>,
    pending: HashMap<String, Vec<String>>,
    memberships: HashMap<String, Vec<String>>,
    groups: HashMap<String, Group>,
    failing: HashSet<String>,
    latency: Duration,
    profile_calls: Mutex<HashMap<String, usize>>,
    connection_calls: Mutex<HashMap<String, usize>>,
    group_calls: Mutex<HashMap<String, usize>>,
    group_detail_calls: Mutex<usize>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, id: &str, name: &str) -> Self {
        self.profiles.insert(
            id.to_string(),
            Entity {
                id: id.to_string(),
                display_name: name.to_string(),
                follower_count: None,
                subscription_count: None,
            },
        );
        self
    }

    /// Register a profile under `id` that comes back without an id.
    pub fn anonymous(mut self, id: &str) -> Self {
        self.profiles.insert(id.to_string(), Entity::default());
        self
    }

    /// Answer profile lookups for `alias` with the profile registered under
    /// `canonical`, the way VK resolves screen names.
    pub fn alias(mut self, alias: &str, canonical: &str) -> Self {
        self.aliases.insert(alias.to_string(), canonical.to_string());
        self
    }

    pub fn connections(mut self, id: &str, ids: &[&str]) -> Self {
        self.connections
            .insert(id.to_string(), ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn pending(mut self, id: &str, ids: &[&str]) -> Self {
        self.pending
            .insert(id.to_string(), ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn groups(mut self, id: &str, group_ids: &[&str]) -> Self {
        self.memberships
            .insert(id.to_string(), group_ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn group(mut self, id: &str, name: Option<&str>) -> Self {
        self.groups.insert(id.to_string(), Group::new(id, name));
        self
    }

    /// Every call for `id` fails.
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    /// Sleep before answering each call, to let concurrent branches overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn profile_calls(&self, id: &str) -> usize {
        self.profile_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn connection_calls(&self, id: &str) -> usize {
        self.connection_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn group_calls(&self, id: &str) -> usize {
        self.group_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn group_detail_calls(&self) -> usize {
        *self.group_detail_calls.lock().unwrap()
    }

    /// Largest connection-lookup count over all ids.
    pub fn max_connection_calls(&self) -> usize {
        self.connection_calls
            .lock()
            .unwrap()
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    async fn answer(&self, counter: &Mutex<HashMap<String, usize>>, id: &str) -> Result<()> {
        *counter.lock().unwrap().entry(id.to_string()).or_default() += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(id) {
            bail!("MockSource: {id} is unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl IdentitySource for MockSource {
    async fn profile(&self, id: &str) -> Result<Entity> {
        self.answer(&self.profile_calls, id).await?;
        let id = self.aliases.get(id).map(String::as_str).unwrap_or(id);
        self.profiles
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockSource: no profile registered for {id}"))
    }

    async fn connections(&self, id: &str) -> Result<Vec<String>> {
        self.answer(&self.connection_calls, id).await?;
        let mut ids = self.connections.get(id).cloned().unwrap_or_default();
        ids.extend(self.pending.get(id).cloned().unwrap_or_default());
        Ok(ids)
    }

    async fn group_ids(&self, id: &str) -> Result<Vec<String>> {
        self.answer(&self.group_calls, id).await?;
        Ok(self.memberships.get(id).cloned().unwrap_or_default())
    }

    async fn group_details(&self, ids: &[String]) -> Result<Vec<Group>> {
        *self.group_detail_calls.lock().unwrap() += 1;
        Ok(ids
            .iter()
            .map(|id| {
                self.groups
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| Group::new(id.as_str(), None))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryGraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredNode {
    pub name: Option<String>,
    pub follower_count: Option<u64>,
    pub subscription_count: Option<u64>,
}

/// In-memory graph with the same MERGE semantics as the Neo4j writer:
/// nodes keyed on `(label, id)`, edges on `(source, target, kind)`, edges
/// with a missing endpoint silently dropped.
#[derive(Default)]
pub struct MemoryGraph {
    nodes: Mutex<BTreeMap<(NodeLabel, String), StoredNode>>,
    edges: Mutex<HashSet<(NodeHandle, NodeHandle, RelationshipKind)>>,
    merged_user_ids: Mutex<Vec<String>>,
    failing_users: HashSet<String>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// `merge_user` fails for this id.
    pub fn failing_user(mut self, id: &str) -> Self {
        self.failing_users.insert(id.to_string());
        self
    }

    pub fn has_user(&self, id: &str) -> bool {
        self.nodes
            .lock()
            .unwrap()
            .contains_key(&(NodeLabel::User, id.to_string()))
    }

    pub fn user(&self, id: &str) -> Option<StoredNode> {
        self.nodes
            .lock()
            .unwrap()
            .get(&(NodeLabel::User, id.to_string()))
            .cloned()
    }

    pub fn group_name(&self, id: &str) -> Option<String> {
        self.nodes
            .lock()
            .unwrap()
            .get(&(NodeLabel::Group, id.to_string()))
            .and_then(|n| n.name.clone())
    }

    pub fn user_count(&self) -> usize {
        self.count_label(NodeLabel::User)
    }

    pub fn group_count(&self) -> usize {
        self.count_label(NodeLabel::Group)
    }

    fn count_label(&self, label: NodeLabel) -> usize {
        self.nodes.lock().unwrap().keys().filter(|(l, _)| *l == label).count()
    }

    pub fn has_edge(&self, source: &NodeHandle, target: &NodeHandle, kind: RelationshipKind) -> bool {
        self.edges
            .lock()
            .unwrap()
            .contains(&(source.clone(), target.clone(), kind))
    }

    pub fn has_follow(&self, source: &str, target: &str) -> bool {
        self.has_edge(
            &NodeHandle::user(source),
            &NodeHandle::user(target),
            RelationshipKind::Follow,
        )
    }

    pub fn has_subscribe(&self, user: &str, group: &str) -> bool {
        self.has_edge(
            &NodeHandle::user(user),
            &NodeHandle::group(group),
            RelationshipKind::Subscribe,
        )
    }

    pub fn edge_count(&self) -> usize {
        self.edges.lock().unwrap().len()
    }

    /// Every id ever passed to `merge_user`, in call order.
    pub fn merged_user_ids(&self) -> Vec<String> {
        self.merged_user_ids.lock().unwrap().clone()
    }

    fn name_of(&self, label: NodeLabel, id: &str) -> String {
        self.nodes
            .lock()
            .unwrap()
            .get(&(label, id.to_string()))
            .and_then(|n| n.name.clone())
            .unwrap_or_default()
    }

    fn degrees(&self, kind: RelationshipKind, outgoing: bool) -> Vec<(String, i64)> {
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for (source, target, k) in self.edges.lock().unwrap().iter() {
            if *k != kind {
                continue;
            }
            let key = if outgoing { &source.id } else { &target.id };
            *counts.entry(key.clone()).or_default() += 1;
        }
        let mut ranked: Vec<(String, i64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(5);
        ranked
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn merge_user(&self, entity: &Entity) -> Result<()> {
        self.merged_user_ids.lock().unwrap().push(entity.id.clone());
        if self.failing_users.contains(&entity.id) {
            bail!("MemoryGraph: write rejected for {}", entity.id);
        }
        self.nodes.lock().unwrap().insert(
            (NodeLabel::User, entity.id.clone()),
            StoredNode {
                name: Some(entity.display_name.clone()),
                follower_count: entity.follower_count,
                subscription_count: entity.subscription_count,
            },
        );
        Ok(())
    }

    async fn merge_group(&self, id: &str, name: &str) -> Result<()> {
        self.nodes.lock().unwrap().insert(
            (NodeLabel::Group, id.to_string()),
            StoredNode {
                name: Some(name.to_string()),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn merge_edge(
        &self,
        source: &NodeHandle,
        target: &NodeHandle,
        kind: RelationshipKind,
    ) -> Result<()> {
        {
            let nodes = self.nodes.lock().unwrap();
            if !nodes.contains_key(&(source.label, source.id.clone()))
                || !nodes.contains_key(&(target.label, target.id.clone()))
            {
                return Ok(());
            }
        }

        self.edges
            .lock()
            .unwrap()
            .insert((source.clone(), target.clone(), kind));
        Ok(())
    }
}

#[async_trait]
impl AggregateReader for MemoryGraph {
    async fn top_users(&self) -> Result<Vec<UserDegree>> {
        Ok(self
            .degrees(RelationshipKind::Follow, true)
            .into_iter()
            .map(|(id, follows)| UserDegree {
                name: self.name_of(NodeLabel::User, &id),
                id,
                follows,
            })
            .collect())
    }

    async fn top_groups(&self) -> Result<Vec<GroupDegree>> {
        Ok(self
            .degrees(RelationshipKind::Subscribe, false)
            .into_iter()
            .map(|(id, members)| GroupDegree {
                name: self.name_of(NodeLabel::Group, &id),
                id,
                members,
            })
            .collect())
    }

    async fn mutual_followers(&self) -> Result<Vec<MutualPair>> {
        let edges = self.edges.lock().unwrap().clone();
        let mut pairs: Vec<MutualPair> = edges
            .iter()
            .filter(|(s, t, k)| {
                *k == RelationshipKind::Follow
                    && s.label == NodeLabel::User
                    && t.label == NodeLabel::User
                    && s.id < t.id
                    && edges.contains(&(t.clone(), s.clone(), RelationshipKind::Follow))
            })
            .map(|(s, t, _)| MutualPair {
                a: UserRef {
                    id: s.id.clone(),
                    name: self.name_of(NodeLabel::User, &s.id),
                },
                b: UserRef {
                    id: t.id.clone(),
                    name: self.name_of(NodeLabel::User, &t.id),
                },
            })
            .collect();
        pairs.sort_by(|x, y| (&x.a.id, &x.b.id).cmp(&(&y.a.id, &y.b.id)));
        Ok(pairs)
    }
}
