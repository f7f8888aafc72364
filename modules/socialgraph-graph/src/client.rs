use neo4rs::{ConfigBuilder, Graph};

use socialgraph_common::Config;

/// Shared Neo4j connection pool. Cheap to clone.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

impl GraphClient {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, neo4rs::Error> {
        Self::connect_with_pool(uri, user, password, 16).await
    }

    /// Connect using the store settings from `config`. The pool is sized so
    /// every crawl worker can hold a connection.
    pub async fn from_config(config: &Config) -> Result<Self, neo4rs::Error> {
        let pool = config.pool_size.max(1) + 2;
        Self::connect_with_pool(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password, pool)
            .await
    }

    async fn connect_with_pool(
        uri: &str,
        user: &str,
        password: &str,
        max_connections: usize,
    ) -> Result<Self, neo4rs::Error> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(500)
            .max_connections(max_connections)
            .build()?;
        let graph = Graph::connect(config).await?;
        Ok(Self { graph })
    }

    /// Raw driver handle, for ad-hoc queries in tests and tools.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}
