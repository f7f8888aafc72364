// Trait abstractions for the crawler's external collaborators.
//
// IdentitySource: profiles, connection lists and group lookups (VK in production).
// GraphStore: idempotent node/edge merges (Neo4j in production).
// AggregateReader: post-crawl read queries for the summary report.
//
// These enable deterministic testing with MockSource and MemoryGraph:
// no network, no database, no Docker.

use anyhow::Result;
use async_trait::async_trait;

use socialgraph_common::{display_name, Entity, Group, NodeHandle, RelationshipKind};
use socialgraph_graph::{GraphReader, GraphWriter, GroupDegree, MutualPair, UserDegree};
use vk_client::VkClient;

// ---------------------------------------------------------------------------
// IdentitySource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Profile attributes for one id. Missing fields come back empty rather
    /// than failing the call.
    async fn profile(&self, id: &str) -> Result<Entity>;

    /// Confirmed connections followed by pending requests, duplicates kept.
    async fn connections(&self, id: &str) -> Result<Vec<String>>;

    /// Ids of the groups the entity belongs to.
    async fn group_ids(&self, id: &str) -> Result<Vec<String>>;

    /// Batched group lookup. Empty input must not hit the network.
    async fn group_details(&self, ids: &[String]) -> Result<Vec<Group>>;
}

#[async_trait]
impl IdentitySource for VkClient {
    async fn profile(&self, id: &str) -> Result<Entity> {
        let Some(user) = self.get_user(id).await? else {
            // Unknown or deleted account: an entity without id, skipped downstream.
            return Ok(Entity::default());
        };
        Ok(Entity {
            id: user.id.map(|i| i.to_string()).unwrap_or_default(),
            display_name: display_name(user.first_name.as_deref(), user.last_name.as_deref()),
            follower_count: user.followers_count,
            subscription_count: user.subscriptions,
        })
    }

    async fn connections(&self, id: &str) -> Result<Vec<String>> {
        let mut ids = self.get_friends(id).await?;
        ids.extend(self.get_friend_requests(id).await?);
        Ok(ids.into_iter().map(|i| i.to_string()).collect())
    }

    async fn group_ids(&self, id: &str) -> Result<Vec<String>> {
        let ids = self.get_groups(id).await?;
        Ok(ids.into_iter().map(|i| i.to_string()).collect())
    }

    async fn group_details(&self, ids: &[String]) -> Result<Vec<Group>> {
        let groups = self.get_groups_by_id(ids).await?;
        Ok(groups
            .into_iter()
            .filter_map(|g| {
                let id = g.id?;
                Some(Group {
                    id: id.to_string(),
                    name: g.name,
                })
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// GraphStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Merge a User node keyed on `entity.id`.
    async fn merge_user(&self, entity: &Entity) -> Result<()>;

    /// Merge a Group node keyed on `id`.
    async fn merge_group(&self, id: &str, name: &str) -> Result<()>;

    /// Merge an edge keyed on `(source, target, kind)`.
    async fn merge_edge(
        &self,
        source: &NodeHandle,
        target: &NodeHandle,
        kind: RelationshipKind,
    ) -> Result<()>;
}

#[async_trait]
impl GraphStore for GraphWriter {
    async fn merge_user(&self, entity: &Entity) -> Result<()> {
        Ok(GraphWriter::merge_user(self, entity).await?)
    }

    async fn merge_group(&self, id: &str, name: &str) -> Result<()> {
        Ok(GraphWriter::merge_group(self, id, name).await?)
    }

    async fn merge_edge(
        &self,
        source: &NodeHandle,
        target: &NodeHandle,
        kind: RelationshipKind,
    ) -> Result<()> {
        Ok(GraphWriter::merge_edge(self, source, target, kind).await?)
    }
}

// ---------------------------------------------------------------------------
// AggregateReader
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AggregateReader: Send + Sync {
    async fn top_users(&self) -> Result<Vec<UserDegree>>;
    async fn top_groups(&self) -> Result<Vec<GroupDegree>>;
    async fn mutual_followers(&self) -> Result<Vec<MutualPair>>;
}

#[async_trait]
impl AggregateReader for GraphReader {
    async fn top_users(&self) -> Result<Vec<UserDegree>> {
        Ok(GraphReader::top_users(self).await?)
    }

    async fn top_groups(&self) -> Result<Vec<GroupDegree>> {
        Ok(GraphReader::top_groups(self).await?)
    }

    async fn mutual_followers(&self) -> Result<Vec<MutualPair>> {
        Ok(GraphReader::mutual_followers(self).await?)
    }
}
