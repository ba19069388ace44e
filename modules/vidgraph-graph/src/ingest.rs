use std::ops::AddAssign;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use vidgraph_common::{
    split_related_ids, EdgeType, Result, VidGraphError, VideoRow, RELATED_IDS_PROPERTY,
    VIDEO_LABEL,
};

use crate::store::{EdgeOutcome, GraphStore, Predicate, UpsertOutcome};

/// Related-id pairs sent to the store per edge write.
const LINK_BATCH_SIZE: usize = 1000;

/// Outcome of loading one or more batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub created: u64,
    pub updated: u64,
    pub rejected: u64,
}

impl AddAssign for LoadStats {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
        self.rejected += rhs.rejected;
    }
}

/// Outcome of the edge-linking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub edges_created: u64,
    pub edges_existing: u64,
    /// Related ids that named no loaded node. Dropped, never an error.
    pub broken_reference_count: u64,
}

/// Node count compared to the row count the caller expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub expected: u64,
    pub actual: u64,
}

impl ValidationReport {
    pub fn is_consistent(&self) -> bool {
        self.expected == self.actual
    }
}

/// Two-pass loader: upsert nodes from rows, then link `RELATED` edges once the
/// full node set is known.
///
/// `load_batch` borrows the pipeline shared, `link_related_edges` exclusively,
/// so linking cannot start while any load borrowed from the same pipeline is
/// still in flight. The barrier covers this pipeline only: another pipeline or
/// direct writer holding the same store can still upsert while linking runs,
/// and whatever it adds after the node snapshot is not linked. Route all
/// loads for one graph through a single pipeline.
pub struct IngestPipeline {
    store: Arc<dyn GraphStore>,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Upsert one node per row. Idempotent: the same rows yield the same nodes.
    pub async fn load_batch(&self, rows: Vec<VideoRow>) -> Result<LoadStats> {
        let mut stats = LoadStats::default();
        for row in rows {
            match self.store.upsert_node(row.into_node()).await? {
                UpsertOutcome::Created => stats.created += 1,
                UpsertOutcome::Updated => stats.updated += 1,
            }
        }
        info!(created = stats.created, updated = stats.updated, "Batch loaded");
        Ok(stats)
    }

    /// Validate raw string records and load the well-formed ones. Malformed
    /// records are logged, counted in `rejected`, and skipped.
    pub async fn load_records(&self, records: Vec<Vec<String>>) -> Result<LoadStats> {
        let mut rows = Vec::new();
        let mut rejected = 0u64;
        for (i, record) in records.iter().enumerate() {
            match VideoRow::from_record(i, record) {
                Ok(row) => rows.push(row),
                Err(VidGraphError::Validation { row, reason }) => {
                    warn!(row, reason = reason.as_str(), "Rejected malformed row");
                    rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let mut stats = self.load_batch(rows).await?;
        stats.rejected += rejected;
        Ok(stats)
    }

    /// Load several independent batches concurrently and sum their stats.
    /// Returns only after every batch has finished.
    pub async fn load_batches(&self, batches: Vec<Vec<VideoRow>>) -> Result<LoadStats> {
        let count = batches.len();
        let results = try_join_all(batches.into_iter().map(|rows| self.load_batch(rows))).await?;

        let mut total = LoadStats::default();
        for stats in results {
            total += stats;
        }
        info!(
            batches = count,
            created = total.created,
            updated = total.updated,
            "All batches loaded"
        );
        Ok(total)
    }

    /// Second pass: create one `RELATED` edge per related id that names a
    /// loaded node; count the rest as broken references.
    pub async fn link_related_edges(&mut self) -> Result<LinkStats> {
        let nodes = self
            .store
            .query_nodes(VIDEO_LABEL, &Predicate::exists(RELATED_IDS_PROPERTY))
            .await?;

        let pairs: Vec<(String, String)> = nodes
            .iter()
            .filter_map(|node| {
                let raw = node.get(RELATED_IDS_PROPERTY)?.as_str()?;
                Some(
                    split_related_ids(raw)
                        .into_iter()
                        .map(|target| (node.id.clone(), target)),
                )
            })
            .flatten()
            .collect();

        let mut stats = LinkStats::default();
        for chunk in pairs.chunks(LINK_BATCH_SIZE) {
            let outcomes = self
                .store
                .create_edges(VIDEO_LABEL, chunk, EdgeType::Related)
                .await?;
            for outcome in outcomes {
                match outcome {
                    EdgeOutcome::Created => stats.edges_created += 1,
                    EdgeOutcome::Existing => stats.edges_existing += 1,
                    EdgeOutcome::MissingEndpoint => stats.broken_reference_count += 1,
                }
            }
            debug!(pairs = chunk.len(), "Linked edge batch");
        }

        if stats.broken_reference_count > 0 {
            warn!(
                broken = stats.broken_reference_count,
                "Dropped related ids with no matching node"
            );
        }
        info!(
            nodes = nodes.len(),
            created = stats.edges_created,
            existing = stats.edges_existing,
            "RELATED edges linked"
        );
        Ok(stats)
    }

    /// Remove every node and edge.
    pub async fn clear(&mut self) -> Result<()> {
        self.store.clear_all().await
    }

    /// Compare the ingested node count to `expected_row_count`. A mismatch is
    /// reported and logged, never an error: upstream dedup can shrink counts.
    pub async fn validate(&self, expected_row_count: u64) -> Result<ValidationReport> {
        let actual = self.store.node_count(Some(VIDEO_LABEL)).await?;
        let report = ValidationReport {
            expected: expected_row_count,
            actual,
        };
        if report.is_consistent() {
            info!(nodes = actual, "Node count matches source rows");
        } else {
            warn!(
                expected = expected_row_count,
                actual, "Node count differs from source row count"
            );
        }
        Ok(report)
    }
}
