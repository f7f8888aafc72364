use neo4rs::query;
use tracing::{debug, info};

use socialgraph_common::{Entity, NodeHandle, RelationshipKind};

use crate::GraphClient;

/// Write-side wrapper for the graph. Every write is a `MERGE` keyed on the
/// node id (or the edge triple), so repeating a write changes nothing.
#[derive(Clone)]
pub struct GraphWriter {
    client: GraphClient,
}

impl GraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Create or update a User node. Callers must have validated the id.
    pub async fn merge_user(&self, entity: &Entity) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (u:User {id: $id})
             SET u.name = $name,
                 u.followers_count = CASE WHEN $followers_count < 0 THEN null ELSE $followers_count END,
                 u.subscriptions = CASE WHEN $subscriptions < 0 THEN null ELSE $subscriptions END",
        )
        .param("id", entity.id.as_str())
        .param("name", entity.display_name.as_str())
        .param("followers_count", count_param(entity.follower_count))
        .param("subscriptions", count_param(entity.subscription_count));

        self.client.graph.run(q).await?;
        debug!(id = entity.id.as_str(), "User node merged");
        Ok(())
    }

    /// Create or update a Group node.
    pub async fn merge_group(&self, id: &str, name: &str) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (g:Group {id: $id})
             SET g.name = $name",
        )
        .param("id", id)
        .param("name", name);

        self.client.graph.run(q).await?;
        debug!(id, name, "Group node merged");
        Ok(())
    }

    /// Merge a typed edge between two existing nodes. Nothing is written when
    /// either endpoint is missing.
    pub async fn merge_edge(
        &self,
        source: &NodeHandle,
        target: &NodeHandle,
        kind: RelationshipKind,
    ) -> Result<(), neo4rs::Error> {
        // Labels and relationship types can't be parameters; both come from enums.
        let cypher = format!(
            "MATCH (s:{src_label} {{id: $source_id}})
             MATCH (t:{dst_label} {{id: $target_id}})
             MERGE (s)-[:{rel}]->(t)",
            src_label = source.label.as_str(),
            dst_label = target.label.as_str(),
            rel = kind.as_str(),
        );
        let q = query(&cypher)
            .param("source_id", source.id.as_str())
            .param("target_id", target.id.as_str());

        self.client.graph.run(q).await?;
        debug!(from = %source, to = %target, kind = %kind, "Edge merged");
        Ok(())
    }

    /// Delete every node and relationship.
    pub async fn clear_all(&self) -> Result<(), neo4rs::Error> {
        self.client.graph.run(query("MATCH (n) DETACH DELETE n")).await?;
        info!("Graph cleared");
        Ok(())
    }
}

/// Unknown counters are sent as -1 and stored as null.
fn count_param(count: Option<u64>) -> i64 {
    count
        .and_then(|c| i64::try_from(c).ok())
        .unwrap_or(-1)
}
