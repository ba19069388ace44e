use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use vidgraph_common::{EdgeType, Node, PropertyValue, Result, VidGraphError};

use crate::store::{columns, AggregationSpec, GraphStore, Predicate};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub value: PropertyValue,
    pub count: u64,
}

/// A node and the value it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedNode {
    pub id: String,
    pub rank: PropertyValue,
    pub node: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTopK {
    pub category: PropertyValue,
    pub entries: Vec<RankedNode>,
}

/// Min/avg/max of one degree measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DegreeSummary {
    pub min: u64,
    pub max: u64,
    pub avg: f64,
}

impl DegreeSummary {
    fn from_values(values: impl Iterator<Item = u64>) -> Self {
        let mut summary = DegreeSummary {
            min: u64::MAX,
            ..Default::default()
        };
        let mut total = 0u64;
        let mut n = 0u64;
        for v in values {
            summary.min = summary.min.min(v);
            summary.max = summary.max.max(v);
            total += v;
            n += 1;
        }
        if n == 0 {
            return DegreeSummary::default();
        }
        summary.avg = total as f64 / n as f64;
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeDegree {
    pub out_degree: u64,
    pub in_degree: u64,
}

impl NodeDegree {
    pub fn total(&self) -> u64 {
        self.out_degree + self.in_degree
    }
}

/// Degree distribution over the relation graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DegreeStats {
    pub nodes: u64,
    pub outgoing: DegreeSummary,
    pub incoming: DegreeSummary,
    pub total: DegreeSummary,
    /// Per-node degrees, key ascending.
    pub per_node: Vec<(String, NodeDegree)>,
}

/// Category counts, per-category top-K and degree statistics.
pub struct Aggregator {
    store: Arc<dyn GraphStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Nodes per distinct non-null value of `property`, count descending,
    /// ties by value ascending.
    pub async fn category_counts(&self, label: &str, property: &str) -> Result<Vec<CategoryCount>> {
        let rows = self
            .store
            .run_aggregation(&AggregationSpec::GroupCount {
                label: label.to_string(),
                property: property.to_string(),
            })
            .await?;

        let mut counts: Vec<CategoryCount> = rows
            .into_iter()
            .filter_map(|row| {
                let value = row.get(columns::VALUE)?.clone();
                let count = row.get_i64(columns::COUNT)?;
                (!value.is_null()).then(|| CategoryCount {
                    value,
                    count: count.max(0) as u64,
                })
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.natural_cmp(&b.value)));

        info!(label, property, groups = counts.len(), "Category counts computed");
        Ok(counts)
    }

    /// For each distinct `property` value, the `k` nodes with the highest
    /// `rank_field`, descending, ties by node key ascending. Groups come back in
    /// value-ascending order. Nodes without a rank value are not ranked.
    pub async fn category_top_k(
        &self,
        label: &str,
        property: &str,
        rank_field: &str,
        k: usize,
    ) -> Result<Vec<CategoryTopK>> {
        if k == 0 {
            return Err(VidGraphError::invalid("k must be greater than 0"));
        }

        let nodes = self
            .store
            .query_nodes(
                label,
                &Predicate::Exists(vec![property.to_string(), rank_field.to_string()]),
            )
            .await?;

        let mut groups: HashMap<String, CategoryTopK> = HashMap::new();
        for node in nodes {
            let (Some(category), Some(rank)) = (node.get(property), node.get(rank_field)) else {
                continue;
            };
            let (category, rank) = (category.clone(), rank.clone());
            groups
                .entry(category.dedup_key())
                .or_insert_with(|| CategoryTopK {
                    category,
                    entries: Vec::new(),
                })
                .entries
                .push(RankedNode {
                    id: node.id.clone(),
                    rank,
                    node,
                });
        }

        let mut result: Vec<CategoryTopK> = groups.into_values().collect();
        for group in &mut result {
            group
                .entries
                .sort_by(|a, b| b.rank.natural_cmp(&a.rank).then_with(|| a.id.cmp(&b.id)));
            group.entries.truncate(k);
        }
        result.sort_by(|a, b| a.category.natural_cmp(&b.category));

        info!(label, property, rank_field, k, groups = result.len(), "Category top-k computed");
        Ok(result)
    }

    /// In/out/total degree distribution over `RELATED` edges between `label` nodes.
    pub async fn degree_stats(&self, label: &str) -> Result<DegreeStats> {
        let rows = self
            .store
            .run_aggregation(&AggregationSpec::Degrees {
                label: label.to_string(),
                edge_type: EdgeType::Related,
            })
            .await?;

        let mut per_node: Vec<(String, NodeDegree)> = rows
            .iter()
            .filter_map(|row| {
                Some((
                    row.get_str(columns::ID)?.to_string(),
                    NodeDegree {
                        out_degree: row.get_i64(columns::OUT_DEGREE)?.max(0) as u64,
                        in_degree: row.get_i64(columns::IN_DEGREE)?.max(0) as u64,
                    },
                ))
            })
            .collect();
        per_node.sort_by(|a, b| a.0.cmp(&b.0));

        let stats = DegreeStats {
            nodes: per_node.len() as u64,
            outgoing: DegreeSummary::from_values(per_node.iter().map(|(_, d)| d.out_degree)),
            incoming: DegreeSummary::from_values(per_node.iter().map(|(_, d)| d.in_degree)),
            total: DegreeSummary::from_values(per_node.iter().map(|(_, d)| d.total())),
            per_node,
        };
        info!(
            label,
            nodes = stats.nodes,
            avg_out = stats.outgoing.avg,
            max_out = stats.outgoing.max,
            avg_in = stats.incoming.avg,
            max_in = stats.incoming.max,
            "Degree statistics computed"
        );
        Ok(stats)
    }
}
