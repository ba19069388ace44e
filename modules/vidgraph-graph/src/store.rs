//! Storage boundary the core depends on.
//!
//! Matching, ranking and aggregation logic live in the core and only talk to a
//! backend through [`GraphStore`]. [`crate::MemoryStore`] implements it purely in
//! memory; [`crate::Neo4jStore`] translates the same calls to Cypher.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vidgraph_common::{EdgeType, Node, PropertyValue, Result};

use crate::search::levenshtein;

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Node filter evaluated by the backend. Every variant except `All` and `Exists`
/// only ever matches non-null values.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    /// Every listed property is present and non-null.
    Exists(Vec<String>),
    Equals { property: String, value: String },
    Contains { property: String, needle: String },
    StartsWith { property: String, prefix: String },
    EndsWith { property: String, suffix: String },
    WithinDistance {
        property: String,
        query: String,
        tolerance: usize,
    },
}

impl Predicate {
    pub fn exists(property: &str) -> Self {
        Predicate::Exists(vec![property.to_string()])
    }

    /// Property the predicate inspects, if any.
    pub fn property(&self) -> Option<&str> {
        match self {
            Predicate::All | Predicate::Exists(_) => None,
            Predicate::Equals { property, .. }
            | Predicate::Contains { property, .. }
            | Predicate::StartsWith { property, .. }
            | Predicate::EndsWith { property, .. }
            | Predicate::WithinDistance { property, .. } => Some(property),
        }
    }

    /// Reference evaluation. Backends that filter natively must agree with this.
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Exists(props) => props.iter().all(|p| node.get(p).is_some()),
            Predicate::Equals { property, value } => equals(node, property, value),
            Predicate::Contains { property, needle } => {
                string_prop(node, property).is_some_and(|s| s.contains(needle.as_str()))
            }
            Predicate::StartsWith { property, prefix } => {
                string_prop(node, property).is_some_and(|s| s.starts_with(prefix.as_str()))
            }
            Predicate::EndsWith { property, suffix } => {
                string_prop(node, property).is_some_and(|s| s.ends_with(suffix.as_str()))
            }
            // Zero tolerance is exact match, numbers included.
            Predicate::WithinDistance {
                property,
                query,
                tolerance: 0,
            } => equals(node, property, query),
            Predicate::WithinDistance {
                property,
                query,
                tolerance,
            } => string_prop(node, property).is_some_and(|s| levenshtein(s, query) <= *tolerance),
        }
    }
}

/// Strings compare verbatim; numbers compare by value when the query parses
/// as a finite number, so Integer 3 matches both "3" and "3.0".
fn equals(node: &Node, property: &str, value: &str) -> bool {
    match node.get(property) {
        Some(PropertyValue::String(s)) => s == value,
        Some(PropertyValue::Integer(i)) => match value.parse::<i64>() {
            Ok(q) => q == *i,
            Err(_) => parse_number(value).is_some_and(|q| q == *i as f64),
        },
        Some(PropertyValue::Float(f)) => parse_number(value).is_some_and(|q| q == *f),
        _ => false,
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|q| q.is_finite())
}

fn string_prop<'a>(node: &'a Node, property: &str) -> Option<&'a str> {
    node.get(property).and_then(PropertyValue::as_str)
}

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

/// Aggregations a backend computes in one pass. Column names of the returned
/// rows are listed per variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationSpec {
    /// `value`, `count`: nodes per distinct non-null value of `property`.
    GroupCount { label: String, property: String },
    /// `source`, `target`: every edge of `edge_type` between nodes of `label`.
    EdgeList { label: String, edge_type: EdgeType },
    /// `label`, `property`, `type`: one row per observed (label, property, type).
    PropertyTypes,
    /// `id`, `out_degree`, `in_degree`: per node of `label`, distinct neighbours.
    Degrees { label: String, edge_type: EdgeType },
}

pub mod columns {
    pub const VALUE: &str = "value";
    pub const COUNT: &str = "count";
    pub const SOURCE: &str = "source";
    pub const TARGET: &str = "target";
    pub const LABEL: &str = "label";
    pub const PROPERTY: &str = "property";
    pub const TYPE: &str = "type";
    pub const ID: &str = "id";
    pub const OUT_DEGREE: &str = "out_degree";
    pub const IN_DEGREE: &str = "in_degree";
}

/// One aggregation result row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row(BTreeMap<String, PropertyValue>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<PropertyValue>) -> Self {
        self.0.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&PropertyValue> {
        self.0.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(PropertyValue::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(PropertyValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Created,
    /// The edge was already present; nothing changed.
    Existing,
    /// One endpoint does not exist; no edge was written.
    MissingEndpoint,
}

// ---------------------------------------------------------------------------
// The trait
// ---------------------------------------------------------------------------

/// Backend operations required by the core.
///
/// Every mutation is applied atomically with respect to readers. `query_nodes`
/// returns nodes ordered by key ascending.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert or replace the node keyed by `node.id` (whole-record overwrite).
    async fn upsert_node(&self, node: Node) -> Result<UpsertOutcome>;

    /// Create a directed edge if both endpoints exist and the edge is new.
    async fn create_edge(
        &self,
        source: &str,
        target: &str,
        edge_type: EdgeType,
    ) -> Result<EdgeOutcome>;

    /// Create many edges between nodes of `label` in one call. Outcomes come
    /// back in input order; a pair repeated within the batch reports what a
    /// second `create_edge` would. Endpoints of another label count as missing.
    async fn create_edges(
        &self,
        label: &str,
        pairs: &[(String, String)],
        edge_type: EdgeType,
    ) -> Result<Vec<EdgeOutcome>>;

    /// Remove every node and edge.
    async fn clear_all(&self) -> Result<()>;

    async fn query_nodes(&self, label: &str, predicate: &Predicate) -> Result<Vec<Node>>;

    async fn run_aggregation(&self, spec: &AggregationSpec) -> Result<Vec<Row>>;

    /// Set one property on many nodes of `label` in a single write. Returns the
    /// number of nodes updated; ids that do not exist are skipped.
    async fn annotate_nodes(
        &self,
        label: &str,
        property: &str,
        values: &[(String, PropertyValue)],
    ) -> Result<u64>;

    /// Provision a fulltext index over `label.property`. Idempotent.
    async fn create_fulltext_index(&self, label: &str, property: &str) -> Result<()>;

    /// Relevance-scored matches, best first. Fails with `MissingIndex` when no
    /// index was provisioned for `label.property`.
    async fn fulltext_query(
        &self,
        label: &str,
        property: &str,
        query: &str,
    ) -> Result<Vec<(Node, f64)>>;

    /// Number of nodes, optionally restricted to one label.
    async fn node_count(&self, label: Option<&str>) -> Result<u64>;
}
