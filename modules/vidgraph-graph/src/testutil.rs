//! Disposable Neo4j for integration tests.

use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use crate::{GraphClient, Neo4jStore};

const BOLT_PORT: u16 = 7687;
const PASSWORD: &str = "vidgraph-test";

/// A Neo4j 5 container with APOC loaded, plus a client connected to it.
/// Dropping the harness stops the container.
pub struct TestNeo4j {
    _container: ContainerAsync<GenericImage>,
    pub client: GraphClient,
}

impl TestNeo4j {
    pub async fn start() -> Self {
        let container = GenericImage::new("neo4j", "5.25.1")
            .with_exposed_port(ContainerPort::Tcp(BOLT_PORT))
            .with_wait_for(WaitFor::message_on_stdout("Started."))
            .with_env_var("NEO4J_AUTH", format!("neo4j/{PASSWORD}"))
            .with_env_var("NEO4J_PLUGINS", "[\"apoc\"]")
            .with_env_var("NEO4J_dbms_security_procedures_unrestricted", "apoc.*")
            .start()
            .await
            .expect("neo4j container did not start");

        let port = container
            .get_host_port_ipv4(BOLT_PORT)
            .await
            .expect("bolt port not mapped");
        let client = GraphClient::connect(&format!("bolt://127.0.0.1:{port}"), "neo4j", PASSWORD)
            .await
            .expect("bolt connect failed");

        Self {
            _container: container,
            client,
        }
    }

    /// A fresh store over this instance.
    pub fn store(&self) -> Neo4jStore {
        Neo4jStore::new(self.client.clone())
    }
}
