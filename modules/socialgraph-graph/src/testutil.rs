//! Disposable Neo4j for integration tests.

use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use crate::{migrate::migrate, GraphClient};

const IMAGE: &str = "neo4j";
const TAG: &str = "5.25.1-community";
const PASSWORD: &str = "testpassword";

/// Start a Community Neo4j, connect, and apply the schema migration.
///
/// Hold the returned container for the whole test; dropping it stops Neo4j.
pub async fn neo4j_container() -> (ContainerAsync<GenericImage>, GraphClient) {
    let container = GenericImage::new(IMAGE, TAG)
        .with_exposed_port(ContainerPort::Tcp(7687))
        .with_wait_for(WaitFor::message_on_stdout("Started."))
        .with_env_var("NEO4J_AUTH", format!("neo4j/{PASSWORD}"))
        .start()
        .await
        .expect("Neo4j container did not start");

    let port = container
        .get_host_port_ipv4(7687)
        .await
        .expect("Neo4j bolt port not mapped");

    let client = GraphClient::connect(&format!("bolt://127.0.0.1:{port}"), "neo4j", PASSWORD)
        .await
        .expect("could not connect to Neo4j container");
    migrate(&client).await.expect("schema migration failed");

    (container, client)
}
