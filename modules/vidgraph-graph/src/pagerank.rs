//! Graph-wide importance ranking.
//!
//! Power iteration over the `RELATED` graph with uniform teleport. Mass held by
//! dangling nodes (out-degree 0) is spread evenly over every node each round,
//! so the scores always sum to 1. Each iteration reads the previous buffer and
//! fills a separate next buffer in parallel; iterations themselves run strictly
//! in sequence and cancellation is only observed between them.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vidgraph_common::{
    EdgeType, PageRankConfig, PropertyValue, Result, VidGraphError, PAGE_RANK_PROPERTY,
    VIDEO_LABEL,
};

use crate::store::{columns, AggregationSpec, GraphStore, Predicate};

/// Directed graph in index form, ready for iteration. Node indices follow key
/// order, so results are independent of load order.
#[derive(Debug, Clone, Default)]
pub struct RankGraph {
    ids: Vec<String>,
    predecessors: Vec<Vec<usize>>,
    out_degree: Vec<usize>,
}

impl RankGraph {
    /// Build from node keys and `(source, target)` pairs. Duplicate pairs
    /// collapse to one edge; pairs naming unknown keys are dropped.
    pub fn from_edges<I, S>(ids: Vec<String>, edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut ids = ids;
        ids.sort();
        ids.dedup();
        let index: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let n = ids.len();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut dropped = 0usize;
        for (source, target) in edges {
            match (index.get(source.as_ref()), index.get(target.as_ref())) {
                (Some(&s), Some(&t)) => successors[s].push(t),
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(dropped, "Ignored edges with endpoints outside the ranked node set");
        }

        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut out_degree = vec![0usize; n];
        for (s, targets) in successors.iter_mut().enumerate() {
            targets.sort_unstable();
            targets.dedup();
            out_degree[s] = targets.len();
            for &t in targets.iter() {
                predecessors[t].push(s);
            }
        }

        Self {
            ids,
            predecessors,
            out_degree,
        }
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.out_degree.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRankResult {
    /// Final score per node key, key ascending.
    pub scores: Vec<(String, f64)>,
    pub iterations: usize,
    /// False when `max_iterations` was reached before `epsilon`.
    pub converged: bool,
    /// Largest per-node change in the last iteration.
    pub max_delta: f64,
}

impl PageRankResult {
    fn empty() -> Self {
        Self {
            scores: Vec::new(),
            iterations: 0,
            converged: true,
            max_delta: 0.0,
        }
    }

    pub fn score(&self, id: &str) -> Option<f64> {
        self.scores
            .binary_search_by(|(k, _)| k.as_str().cmp(id))
            .ok()
            .map(|i| self.scores[i].1)
    }

    pub fn total_mass(&self) -> f64 {
        self.scores.iter().map(|(_, s)| s).sum()
    }

    /// The `k` highest-scoring nodes, score descending, ties by key ascending.
    pub fn top_k(&self, k: usize) -> Result<Vec<(String, f64)>> {
        if k == 0 {
            return Err(VidGraphError::invalid("k must be greater than 0"));
        }
        let mut ranked = self.scores.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(k);
        Ok(ranked)
    }
}

/// Run the power iteration on an in-memory graph.
pub fn compute(
    graph: &RankGraph,
    config: &PageRankConfig,
    cancel: &CancellationToken,
) -> Result<PageRankResult> {
    config.validate()?;
    let n = graph.node_count();
    if n == 0 {
        return Ok(PageRankResult::empty());
    }

    let nf = n as f64;
    let d = config.damping_factor;
    let teleport = (1.0 - d) / nf;

    let mut prev = vec![1.0 / nf; n];
    let mut next = vec![0.0; n];
    let mut iterations = 0;
    let mut max_delta = f64::INFINITY;
    let mut converged = false;

    while iterations < config.max_iterations {
        if cancel.is_cancelled() {
            info!(iterations, "PageRank cancelled");
            return Err(VidGraphError::Cancelled);
        }

        let dangling_mass: f64 = (0..n)
            .filter(|&u| graph.out_degree[u] == 0)
            .map(|u| prev[u])
            .sum();
        let dangling_share = dangling_mass / nf;

        next.par_iter_mut().enumerate().for_each(|(v, score)| {
            let inbound: f64 = graph.predecessors[v]
                .iter()
                .map(|&u| prev[u] / graph.out_degree[u] as f64)
                .sum();
            *score = teleport + d * (inbound + dangling_share);
        });

        max_delta = prev
            .par_iter()
            .zip(next.par_iter())
            .map(|(a, b)| (a - b).abs())
            .reduce(|| 0.0, f64::max);
        std::mem::swap(&mut prev, &mut next);
        iterations += 1;

        debug!(iteration = iterations, max_delta, dangling_mass, "PageRank iteration");
        if max_delta < config.epsilon {
            converged = true;
            break;
        }
    }

    if !converged {
        warn!(
            iterations,
            max_delta,
            epsilon = config.epsilon,
            "PageRank stopped at iteration cap before converging"
        );
    }

    Ok(PageRankResult {
        scores: graph.ids.iter().cloned().zip(prev).collect(),
        iterations,
        converged,
        max_delta,
    })
}

/// Loads the relation graph from a store, ranks it, and writes scores back.
pub struct PageRanker {
    store: Arc<dyn GraphStore>,
    config: PageRankConfig,
    label: String,
}

impl PageRanker {
    pub fn new(store: Arc<dyn GraphStore>, config: PageRankConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            label: VIDEO_LABEL.to_string(),
        })
    }

    /// Rank nodes of `label` instead of the default video label.
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn config(&self) -> &PageRankConfig {
        &self.config
    }

    /// Snapshot the `RELATED` graph for this ranker's label.
    pub async fn load_graph(&self) -> Result<RankGraph> {
        let nodes = self.store.query_nodes(&self.label, &Predicate::All).await?;
        let rows = self
            .store
            .run_aggregation(&AggregationSpec::EdgeList {
                label: self.label.clone(),
                edge_type: EdgeType::Related,
            })
            .await?;

        let edges: Vec<(String, String)> = rows
            .iter()
            .filter_map(|row| {
                Some((
                    row.get_str(columns::SOURCE)?.to_string(),
                    row.get_str(columns::TARGET)?.to_string(),
                ))
            })
            .collect();
        let ids = nodes.into_iter().map(|n| n.id).collect();
        Ok(RankGraph::from_edges(ids, edges))
    }

    /// Load the graph and iterate until convergence, the iteration cap, or
    /// cancellation. The iteration runs on the blocking pool.
    pub async fn run(&self, cancel: CancellationToken) -> Result<PageRankResult> {
        let graph = self.load_graph().await?;
        info!(
            label = self.label.as_str(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            damping = self.config.damping_factor,
            "Running PageRank"
        );

        let config = self.config;
        let result = tokio::task::spawn_blocking(move || compute(&graph, &config, &cancel))
            .await
            .map_err(|e| anyhow::anyhow!("PageRank task failed: {e}"))??;

        info!(
            iterations = result.iterations,
            converged = result.converged,
            max_delta = result.max_delta,
            "PageRank complete"
        );
        Ok(result)
    }

    /// Persist scores onto each node's `pageRank` property, replacing any
    /// previous value. Returns the number of nodes written.
    pub async fn write_back(&self, result: &PageRankResult) -> Result<u64> {
        let values: Vec<(String, PropertyValue)> = result
            .scores
            .iter()
            .map(|(id, score)| (id.clone(), PropertyValue::Float(*score)))
            .collect();
        let written = self
            .store
            .annotate_nodes(&self.label, PAGE_RANK_PROPERTY, &values)
            .await?;
        info!(written, "PageRank scores written");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> RankGraph {
        RankGraph::from_edges(
            ids.iter().map(|s| s.to_string()).collect(),
            edges.iter().copied(),
        )
    }

    fn run(g: &RankGraph, config: PageRankConfig) -> PageRankResult {
        compute(g, &config, &CancellationToken::new()).unwrap()
    }

    #[test]
    fn empty_graph_is_a_no_op() {
        let result = run(&RankGraph::default(), PageRankConfig::default());
        assert!(result.scores.is_empty());
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn three_cycle_is_uniform() {
        let g = graph(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("C", "A")]);
        let result = run(&g, PageRankConfig::default());
        assert!(result.converged);
        for (_, score) in &result.scores {
            assert!((score - 1.0 / 3.0).abs() < 1e-9, "score {score}");
        }
    }

    #[test]
    fn sink_gains_and_mass_is_kept_each_iteration() {
        let g = graph(&["A", "B"], &[("A", "B")]);
        for cap in 1..=5 {
            let result = run(
                &g,
                PageRankConfig {
                    max_iterations: cap,
                    ..Default::default()
                },
            );
            assert!((result.total_mass() - 1.0).abs() < 1e-12);
            assert!(result.score("B").unwrap() > result.score("A").unwrap());
        }

        let one = run(
            &g,
            PageRankConfig {
                max_iterations: 1,
                ..Default::default()
            },
        );
        assert_eq!(one.iterations, 1);
        assert!(!one.converged);
        assert!((one.score("A").unwrap() - 0.2875).abs() < 1e-12);
        assert!((one.score("B").unwrap() - 0.7125).abs() < 1e-12);
    }

    #[test]
    fn mass_is_conserved_after_convergence() {
        let ids: Vec<String> = (0..40).map(|i| format!("v{i:02}")).collect();
        let mut edges = Vec::new();
        for i in 0..40usize {
            if i % 7 == 0 {
                continue; // dangling
            }
            for j in [(i * 3 + 1) % 40, (i * 5 + 2) % 40, i / 2] {
                edges.push((ids[i].clone(), ids[j].clone()));
            }
        }
        let g = RankGraph::from_edges(ids, edges);
        let config = PageRankConfig::default();
        let result = run(&g, config);

        assert!(result.converged);
        let n = g.node_count() as f64;
        assert!((result.total_mass() - 1.0).abs() <= config.epsilon * n);
    }

    #[test]
    fn result_does_not_depend_on_input_order() {
        let a = graph(&["x", "y", "z"], &[("x", "y"), ("z", "y"), ("y", "x")]);
        let b = graph(&["z", "y", "x"], &[("y", "x"), ("z", "y"), ("x", "y"), ("x", "y")]);
        assert_eq!(
            run(&a, PageRankConfig::default()).scores,
            run(&b, PageRankConfig::default()).scores
        );
    }

    #[test]
    fn top_k_breaks_ties_by_key() {
        let g = graph(&["c", "b", "a", "hub"], &[("a", "hub"), ("b", "hub"), ("c", "hub")]);
        let result = run(&g, PageRankConfig::default());
        let top = result.top_k(3).unwrap();
        let ids: Vec<&str> = top.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["hub", "a", "b"]);
        assert!(matches!(result.top_k(0), Err(VidGraphError::InvalidArgument(_))));
        assert_eq!(result.top_k(10).unwrap().len(), 4);
    }

    #[test]
    fn cancellation_is_checked_before_iterating() {
        let g = graph(&["A", "B"], &[("A", "B")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = compute(&g, &PageRankConfig::default(), &cancel).unwrap_err();
        assert!(matches!(err, VidGraphError::Cancelled));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let g = graph(&["A"], &[]);
        let config = PageRankConfig {
            damping_factor: 1.2,
            ..Default::default()
        };
        let err = compute(&g, &config, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, VidGraphError::InvalidArgument(_)));
    }
}
