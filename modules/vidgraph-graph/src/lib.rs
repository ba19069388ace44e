pub mod aggregate;
pub mod client;
pub mod ingest;
pub mod memory;
pub mod migrate;
pub mod neo4j;
pub mod pagerank;
pub mod schema;
pub mod search;
pub mod store;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use aggregate::{Aggregator, CategoryCount, CategoryTopK, DegreeStats, RankedNode};
pub use client::GraphClient;
pub use ingest::{IngestPipeline, LinkStats, LoadStats, ValidationReport};
pub use memory::MemoryStore;
pub use migrate::migrate;
pub use neo4j::Neo4jStore;
pub use pagerank::{PageRankResult, PageRanker, RankGraph};
pub use schema::{SchemaCatalog, SchemaMap};
pub use search::{MatchStrategy, SearchEngine, SearchHit};
pub use store::{AggregationSpec, EdgeOutcome, GraphStore, Predicate, Row, UpsertOutcome};
pub use neo4rs::query;
