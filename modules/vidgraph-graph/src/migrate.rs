use neo4rs::query;
use tracing::{info, warn};

use vidgraph_common::{Result, VidGraphError, KEY_PROPERTY, VIDEO_LABEL};

use crate::GraphClient;

/// Run idempotent schema migrations: the node key constraint and the
/// property indexes the query paths lean on.
pub async fn migrate(client: &GraphClient) -> Result<()> {
    let g = &client.graph;

    info!("Running schema migrations...");

    // Backs MERGE on the node key, so concurrent loads never duplicate a node.
    let constraint = format!(
        "CREATE CONSTRAINT video_key IF NOT EXISTS \
         FOR (n:{VIDEO_LABEL}) REQUIRE n.{KEY_PROPERTY} IS UNIQUE"
    );
    run_ignoring_exists(g, &constraint).await?;
    info!("Key uniqueness constraint created");

    let indexes = [
        format!("CREATE INDEX video_category IF NOT EXISTS FOR (n:{VIDEO_LABEL}) ON (n.category)"),
        format!("CREATE INDEX video_uploader IF NOT EXISTS FOR (n:{VIDEO_LABEL}) ON (n.uploader)"),
    ];
    for idx in &indexes {
        run_ignoring_exists(g, idx).await?;
    }
    info!("Property indexes created");

    Ok(())
}

/// Execute a schema statement, treating "already exists" as success.
async fn run_ignoring_exists(g: &neo4rs::Graph, cypher: &str) -> Result<()> {
    match g.run(query(cypher)).await {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("already exists") || msg.contains("equivalent") {
                warn!("Already exists (skipped): {}", cypher.chars().take(80).collect::<String>());
                Ok(())
            } else {
                Err(VidGraphError::connectivity("schema migration", e))
            }
        }
    }
}
