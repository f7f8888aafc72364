use std::sync::Arc;

use tracing::warn;

use socialgraph_common::{CrawlError, Entity, Group, NodeHandle, RelationshipKind};

use crate::traits::GraphStore;

/// Turns fetched entities and relations into idempotent store merges.
pub struct UpsertSink {
    store: Arc<dyn GraphStore>,
}

impl UpsertSink {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Merge an entity. Returns `Ok(None)` without touching the store when
    /// the entity has no id.
    pub async fn upsert_entity(&self, entity: &Entity) -> Result<Option<NodeHandle>, CrawlError> {
        if !entity.is_valid() {
            warn!(
                name = entity.display_name.as_str(),
                error = %CrawlError::InvalidEntity,
                "Skipping entity without id"
            );
            return Ok(None);
        }

        self.store
            .merge_user(entity)
            .await
            .map_err(CrawlError::persistence)?;
        Ok(Some(NodeHandle::user(entity.id.as_str())))
    }

    /// Merge a group, substituting the placeholder name when it has none.
    pub async fn upsert_group(&self, group: &Group) -> Result<NodeHandle, CrawlError> {
        self.store
            .merge_group(&group.id, group.name_or_default())
            .await
            .map_err(CrawlError::persistence)?;
        Ok(NodeHandle::group(group.id.as_str()))
    }

    pub async fn upsert_relationship(
        &self,
        source: &NodeHandle,
        target: &NodeHandle,
        kind: RelationshipKind,
    ) -> Result<(), CrawlError> {
        self.store
            .merge_edge(source, target, kind)
            .await
            .map_err(CrawlError::persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryGraph;

    fn sink() -> (Arc<MemoryGraph>, UpsertSink) {
        let graph = Arc::new(MemoryGraph::new());
        (graph.clone(), UpsertSink::new(graph))
    }

    #[tokio::test]
    async fn invalid_entity_never_reaches_store() {
        let (graph, sink) = sink();

        let handle = sink.upsert_entity(&Entity::new("")).await.unwrap();
        assert!(handle.is_none());
        assert!(graph.merged_user_ids().is_empty());
    }

    #[tokio::test]
    async fn repeated_upserts_leave_one_node_and_edge() {
        let (graph, sink) = sink();
        let a = Entity::new("A");
        let b = Entity::new("B");

        let ha = sink.upsert_entity(&a).await.unwrap().unwrap();
        let hb = sink.upsert_entity(&b).await.unwrap().unwrap();
        sink.upsert_entity(&a).await.unwrap();
        sink.upsert_relationship(&ha, &hb, RelationshipKind::Follow).await.unwrap();
        sink.upsert_relationship(&ha, &hb, RelationshipKind::Follow).await.unwrap();

        assert_eq!(graph.user_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[tokio::test]
    async fn unnamed_group_gets_placeholder() {
        let (graph, sink) = sink();

        let handle = sink.upsert_group(&Group::new("G1", None)).await.unwrap();
        assert_eq!(handle, NodeHandle::group("G1"));
        assert_eq!(graph.group_name("G1").as_deref(), Some("Unnamed Group"));
    }

    #[tokio::test]
    async fn store_failure_is_persistence_error() {
        let graph = Arc::new(MemoryGraph::new().failing_user("A"));
        let sink = UpsertSink::new(graph);

        let err = sink.upsert_entity(&Entity::new("A")).await.unwrap_err();
        assert!(matches!(err, CrawlError::Persistence(_)));
    }
}
