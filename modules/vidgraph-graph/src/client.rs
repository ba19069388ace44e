use std::future::Future;

use neo4rs::{ConfigBuilder, Graph};
use tracing::info;

use vidgraph_common::{Config, Result, VidGraphError};

/// Thin wrapper around neo4rs::Graph providing connection setup and teardown.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given credentials.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        Self::connect_to(uri, user, password, None).await
    }

    /// Connect using the loaded application config.
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::connect_to(
            &config.neo4j_uri,
            &config.neo4j_user,
            &config.neo4j_password,
            config.neo4j_database.as_deref(),
        )
        .await
    }

    async fn connect_to(
        uri: &str,
        user: &str,
        password: &str,
        database: Option<&str>,
    ) -> Result<Self> {
        let mut builder = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(500)
            .max_connections(10);
        if let Some(db) = database {
            builder = builder.db(db);
        }
        let config = builder
            .build()
            .map_err(|e| VidGraphError::Config(format!("invalid Neo4j config: {e}")))?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| VidGraphError::connectivity(format!("connect {uri}"), e))?;
        info!(uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Connect, hand a client to `f`, and release the handle afterwards
    /// whether `f` succeeded or not.
    pub async fn scoped<F, Fut, T>(config: &Config, f: F) -> Result<T>
    where
        F: FnOnce(GraphClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = Self::from_config(config).await?;
        let result = f(client.clone()).await;
        client.close();
        result
    }

    /// Release this handle. The connection pool shuts down once every clone
    /// has been closed or dropped.
    pub fn close(self) {
        drop(self.graph);
        info!("Neo4j client closed");
    }

    /// Get a reference to the underlying neo4rs Graph.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}
