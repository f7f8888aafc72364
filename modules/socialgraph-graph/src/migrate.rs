use neo4rs::query;
use tracing::{info, warn};

use crate::GraphClient;

/// Run idempotent schema migrations. The uniqueness constraints back the
/// `MERGE` on `(label, id)` that every node write relies on.
pub async fn migrate(client: &GraphClient) -> Result<(), neo4rs::Error> {
    let g = &client.graph;

    info!("Running schema migrations...");

    let constraints = [
        "CREATE CONSTRAINT user_id_unique IF NOT EXISTS FOR (u:User) REQUIRE u.id IS UNIQUE",
        "CREATE CONSTRAINT group_id_unique IF NOT EXISTS FOR (g:Group) REQUIRE g.id IS UNIQUE",
    ];

    for c in &constraints {
        run_ignoring_exists(g, c).await?;
    }
    info!("Uniqueness constraints created");

    Ok(())
}

async fn run_ignoring_exists(g: &neo4rs::Graph, cypher: &str) -> Result<(), neo4rs::Error> {
    match g.run(query(cypher)).await {
        Err(e) if already_exists(&e) => {
            warn!(statement = cypher, "Schema object already exists, skipped");
            Ok(())
        }
        other => other,
    }
}

fn already_exists(e: &neo4rs::Error) -> bool {
    let msg = e.to_string().to_lowercase();
    msg.contains("already exists") || msg.contains("equivalent")
}
