use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use vidgraph_common::{Edge, EdgeType, Node, PropertyValue, Result, VidGraphError};

use crate::store::{
    columns, AggregationSpec, EdgeOutcome, GraphStore, Predicate, Row, UpsertOutcome,
};

/// Forward and backward adjacency for one edge type, keyed by node slot.
#[derive(Debug, Default)]
struct Adjacency {
    successors: HashMap<usize, BTreeSet<usize>>,
    predecessors: HashMap<usize, BTreeSet<usize>>,
}

impl Adjacency {
    /// Returns false when the edge already existed.
    fn insert(&mut self, source: usize, target: usize) -> bool {
        if !self.successors.entry(source).or_default().insert(target) {
            return false;
        }
        self.predecessors.entry(target).or_default().insert(source);
        true
    }

    fn out_degree(&self, slot: usize) -> usize {
        self.successors.get(&slot).map_or(0, BTreeSet::len)
    }

    fn in_degree(&self, slot: usize) -> usize {
        self.predecessors.get(&slot).map_or(0, BTreeSet::len)
    }

    fn edge_count(&self) -> usize {
        self.successors.values().map(BTreeSet::len).sum()
    }
}

/// Term-frequency postings for one (label, property) pair.
#[derive(Debug, Default)]
struct FulltextIndex {
    postings: HashMap<String, BTreeMap<usize, u32>>,
    terms_by_slot: HashMap<usize, Vec<String>>,
}

impl FulltextIndex {
    fn remove(&mut self, slot: usize) {
        let Some(terms) = self.terms_by_slot.remove(&slot) else {
            return;
        };
        for term in terms {
            if let Some(docs) = self.postings.get_mut(&term) {
                docs.remove(&slot);
                if docs.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
    }

    fn index(&mut self, slot: usize, text: &str) {
        self.remove(slot);
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return;
        }
        let mut distinct = Vec::new();
        for token in tokens {
            let tf = self.postings.entry(token.clone()).or_default().entry(slot).or_insert(0);
            if *tf == 0 {
                distinct.push(token);
            }
            *tf += 1;
        }
        self.terms_by_slot.insert(slot, distinct);
    }

    /// Sum of tf * idf over the query's distinct terms, per matching slot.
    fn score(&self, query: &str) -> HashMap<usize, f64> {
        let docs = self.terms_by_slot.len().max(1) as f64;
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();

        let mut scores: HashMap<usize, f64> = HashMap::new();
        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let idf = (1.0 + docs / postings.len() as f64).ln();
            for (&slot, &tf) in postings {
                *scores.entry(slot).or_insert(0.0) += tf as f64 * idf;
            }
        }
        scores
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: Vec<Node>,
    by_id: HashMap<String, usize>,
    edges: HashMap<EdgeType, Adjacency>,
    fulltext: HashMap<(String, String), FulltextIndex>,
}

impl GraphState {
    fn slot(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    fn slots_with_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.label == label)
            .map(|(i, _)| i)
    }

    fn reindex_fulltext(&mut self, slot: usize) {
        let node = &self.nodes[slot];
        for ((label, property), index) in self.fulltext.iter_mut() {
            match node.get(property).and_then(PropertyValue::as_str) {
                Some(text) if &node.label == label => index.index(slot, text),
                _ => index.remove(slot),
            }
        }
    }

    fn sorted_by_key(&self, mut slots: Vec<usize>) -> Vec<Node> {
        slots.sort_by(|a, b| self.nodes[*a].id.cmp(&self.nodes[*b].id));
        slots.into_iter().map(|i| self.nodes[i].clone()).collect()
    }
}

/// Pure in-memory [`GraphStore`].
///
/// All state sits behind one `RwLock`: mutations hold the write lock for their
/// whole effect, so readers never see a half-applied upsert or a partially
/// cleared graph.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<GraphState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every edge currently stored, sorted by (type, source, target).
    pub async fn edges(&self) -> Vec<Edge> {
        let state = self.state.read().await;
        let mut edges = Vec::new();
        for (edge_type, adjacency) in &state.edges {
            for (&source, targets) in &adjacency.successors {
                for &target in targets {
                    edges.push(Edge {
                        source: state.nodes[source].id.clone(),
                        target: state.nodes[target].id.clone(),
                        edge_type: *edge_type,
                    });
                }
            }
        }
        edges.sort_by(|a, b| {
            (a.edge_type, &a.source, &a.target).cmp(&(b.edge_type, &b.source, &b.target))
        });
        edges
    }

    /// Successor keys of `id` over `edge_type`, ascending.
    pub async fn successors(&self, id: &str, edge_type: EdgeType) -> Vec<String> {
        self.neighbours(id, edge_type, true).await
    }

    /// Predecessor keys of `id` over `edge_type`, ascending.
    pub async fn predecessors(&self, id: &str, edge_type: EdgeType) -> Vec<String> {
        self.neighbours(id, edge_type, false).await
    }

    async fn neighbours(&self, id: &str, edge_type: EdgeType, forward: bool) -> Vec<String> {
        let state = self.state.read().await;
        let (Some(slot), Some(adjacency)) = (state.slot(id), state.edges.get(&edge_type)) else {
            return Vec::new();
        };
        let map = if forward {
            &adjacency.successors
        } else {
            &adjacency.predecessors
        };
        let mut ids: Vec<String> = map
            .get(&slot)
            .into_iter()
            .flatten()
            .map(|&i| state.nodes[i].id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn get_node(&self, id: &str) -> Option<Node> {
        let state = self.state.read().await;
        state.slot(id).map(|i| state.nodes[i].clone())
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn upsert_node(&self, node: Node) -> Result<UpsertOutcome> {
        let mut state = self.state.write().await;
        let outcome = match state.slot(&node.id) {
            Some(slot) => {
                state.nodes[slot] = node;
                state.reindex_fulltext(slot);
                UpsertOutcome::Updated
            }
            None => {
                let slot = state.nodes.len();
                state.by_id.insert(node.id.clone(), slot);
                state.nodes.push(node);
                state.reindex_fulltext(slot);
                UpsertOutcome::Created
            }
        };
        Ok(outcome)
    }

    async fn create_edge(
        &self,
        source: &str,
        target: &str,
        edge_type: EdgeType,
    ) -> Result<EdgeOutcome> {
        let mut state = self.state.write().await;
        let (Some(s), Some(t)) = (state.slot(source), state.slot(target)) else {
            return Ok(EdgeOutcome::MissingEndpoint);
        };
        let created = state.edges.entry(edge_type).or_default().insert(s, t);
        Ok(if created {
            EdgeOutcome::Created
        } else {
            EdgeOutcome::Existing
        })
    }

    async fn create_edges(
        &self,
        label: &str,
        pairs: &[(String, String)],
        edge_type: EdgeType,
    ) -> Result<Vec<EdgeOutcome>> {
        let mut state = self.state.write().await;
        let mut outcomes = Vec::with_capacity(pairs.len());
        for (source, target) in pairs {
            let endpoint = |id: &str| state.slot(id).filter(|&i| state.nodes[i].label == label);
            let (Some(s), Some(t)) = (endpoint(source), endpoint(target)) else {
                outcomes.push(EdgeOutcome::MissingEndpoint);
                continue;
            };
            let created = state.edges.entry(edge_type).or_default().insert(s, t);
            outcomes.push(if created {
                EdgeOutcome::Created
            } else {
                EdgeOutcome::Existing
            });
        }
        debug!(label, pairs = pairs.len(), "Edge batch applied");
        Ok(outcomes)
    }

    async fn clear_all(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let nodes = state.nodes.len();
        state.nodes.clear();
        state.by_id.clear();
        state.edges.clear();
        for index in state.fulltext.values_mut() {
            *index = FulltextIndex::default();
        }
        info!(nodes, "Cleared in-memory graph");
        Ok(())
    }

    async fn query_nodes(&self, label: &str, predicate: &Predicate) -> Result<Vec<Node>> {
        let state = self.state.read().await;
        let slots: Vec<usize> = state
            .slots_with_label(label)
            .filter(|&i| predicate.matches(&state.nodes[i]))
            .collect();
        Ok(state.sorted_by_key(slots))
    }

    async fn run_aggregation(&self, spec: &AggregationSpec) -> Result<Vec<Row>> {
        let state = self.state.read().await;
        let rows = match spec {
            AggregationSpec::GroupCount { label, property } => {
                let mut groups: HashMap<String, (PropertyValue, i64)> = HashMap::new();
                for i in state.slots_with_label(label) {
                    if let Some(value) = state.nodes[i].get(property) {
                        groups
                            .entry(value.dedup_key())
                            .or_insert_with(|| (value.clone(), 0))
                            .1 += 1;
                    }
                }
                groups
                    .into_values()
                    .map(|(value, count)| {
                        Row::new().with(columns::VALUE, value).with(columns::COUNT, count)
                    })
                    .collect()
            }
            AggregationSpec::EdgeList { label, edge_type } => {
                let mut rows = Vec::new();
                if let Some(adjacency) = state.edges.get(edge_type) {
                    for (&s, targets) in &adjacency.successors {
                        if state.nodes[s].label != *label {
                            continue;
                        }
                        for &t in targets {
                            if state.nodes[t].label == *label {
                                rows.push(
                                    Row::new()
                                        .with(columns::SOURCE, state.nodes[s].id.as_str())
                                        .with(columns::TARGET, state.nodes[t].id.as_str()),
                                );
                            }
                        }
                    }
                }
                rows
            }
            AggregationSpec::PropertyTypes => {
                let mut seen = BTreeSet::new();
                for node in &state.nodes {
                    for (name, value) in node.properties.iter().filter(|(_, v)| !v.is_null()) {
                        seen.insert((node.label.clone(), name.clone(), value.value_type()));
                    }
                }
                seen.into_iter()
                    .map(|(label, property, ty)| {
                        Row::new()
                            .with(columns::LABEL, label)
                            .with(columns::PROPERTY, property)
                            .with(columns::TYPE, ty.as_str())
                    })
                    .collect()
            }
            AggregationSpec::Degrees { label, edge_type } => {
                let empty = Adjacency::default();
                let adjacency = state.edges.get(edge_type).unwrap_or(&empty);
                state
                    .slots_with_label(label)
                    .map(|i| {
                        Row::new()
                            .with(columns::ID, state.nodes[i].id.as_str())
                            .with(columns::OUT_DEGREE, adjacency.out_degree(i) as i64)
                            .with(columns::IN_DEGREE, adjacency.in_degree(i) as i64)
                    })
                    .collect()
            }
        };
        debug!(?spec, rows = rows.len(), "In-memory aggregation");
        Ok(rows)
    }

    async fn annotate_nodes(
        &self,
        label: &str,
        property: &str,
        values: &[(String, PropertyValue)],
    ) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut updated = 0u64;
        for (id, value) in values {
            let Some(slot) = state.slot(id) else {
                continue;
            };
            if state.nodes[slot].label != label {
                continue;
            }
            state.nodes[slot]
                .properties
                .insert(property.to_string(), value.clone());
            state.reindex_fulltext(slot);
            updated += 1;
        }
        Ok(updated)
    }

    async fn create_fulltext_index(&self, label: &str, property: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let key = (label.to_string(), property.to_string());
        if state.fulltext.contains_key(&key) {
            return Ok(());
        }

        let mut index = FulltextIndex::default();
        for i in state.slots_with_label(label) {
            if let Some(text) = state.nodes[i].get(property).and_then(PropertyValue::as_str) {
                index.index(i, text);
            }
        }
        info!(label, property, documents = index.terms_by_slot.len(), "Fulltext index created");
        state.fulltext.insert(key, index);
        Ok(())
    }

    async fn fulltext_query(
        &self,
        label: &str,
        property: &str,
        query: &str,
    ) -> Result<Vec<(Node, f64)>> {
        let state = self.state.read().await;
        let index = state
            .fulltext
            .get(&(label.to_string(), property.to_string()))
            .ok_or_else(|| VidGraphError::MissingIndex {
                label: label.to_string(),
                property: property.to_string(),
            })?;

        let mut hits: Vec<(Node, f64)> = index
            .score(query)
            .into_iter()
            .map(|(slot, score)| (state.nodes[slot].clone(), score))
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        Ok(hits)
    }

    async fn node_count(&self, label: Option<&str>) -> Result<u64> {
        let state = self.state.read().await;
        let count = match label {
            Some(label) => state.slots_with_label(label).count(),
            None => state.nodes.len(),
        };
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, category: &str) -> Node {
        Node::new(id, "Video").with_property("category", category)
    }

    async fn store_with(ids: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for id in ids {
            store.upsert_node(video(id, "Music")).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn upsert_overwrites_whole_record() {
        let store = MemoryStore::new();
        let first = video("a", "Music").with_property("views", 10i64);
        assert_eq!(store.upsert_node(first).await.unwrap(), UpsertOutcome::Created);
        assert_eq!(
            store.upsert_node(video("a", "Comedy")).await.unwrap(),
            UpsertOutcome::Updated
        );

        let node = store.get_node("a").await.unwrap();
        assert_eq!(node.get("category"), Some(&PropertyValue::from("Comedy")));
        assert!(node.get("views").is_none());
        assert_eq!(store.node_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn edges_are_deduplicated_and_adjacency_consistent() {
        let store = store_with(&["a", "b", "c"]).await;
        assert_eq!(
            store.create_edge("a", "b", EdgeType::Related).await.unwrap(),
            EdgeOutcome::Created
        );
        assert_eq!(
            store.create_edge("a", "b", EdgeType::Related).await.unwrap(),
            EdgeOutcome::Existing
        );
        store.create_edge("c", "b", EdgeType::Related).await.unwrap();

        assert_eq!(store.edges().await.len(), 2);
        assert_eq!(store.successors("a", EdgeType::Related).await, vec!["b"]);
        assert_eq!(
            store.predecessors("b", EdgeType::Related).await,
            vec!["a", "c"]
        );
    }

    #[tokio::test]
    async fn edge_to_missing_node_is_refused() {
        let store = store_with(&["a"]).await;
        let outcome = store.create_edge("a", "ghost", EdgeType::Related).await.unwrap();
        assert_eq!(outcome, EdgeOutcome::MissingEndpoint);
        assert!(store.edges().await.is_empty());
    }

    #[tokio::test]
    async fn edge_batch_reports_outcomes_in_order() {
        let store = store_with(&["a", "b"]).await;
        store
            .upsert_node(Node::new("u1", "Uploader"))
            .await
            .unwrap();
        let pairs: Vec<(String, String)> = [("a", "b"), ("a", "b"), ("a", "ghost"), ("a", "u1"), ("b", "a")]
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect();

        let outcomes = store
            .create_edges("Video", &pairs, EdgeType::Related)
            .await
            .unwrap();
        assert_eq!(
            outcomes,
            vec![
                EdgeOutcome::Created,
                EdgeOutcome::Existing,
                EdgeOutcome::MissingEndpoint,
                EdgeOutcome::MissingEndpoint,
                EdgeOutcome::Created,
            ]
        );
        assert_eq!(store.edges().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_a_partial_clear() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let ids: Vec<String> = (0..200).map(|i| format!("v{i:03}")).collect();
        for id in &ids {
            store.upsert_node(video(id, "Music")).await.unwrap();
        }
        let pairs: Vec<(String, String)> = ids.windows(2).map(|w| (w[0].clone(), w[1].clone())).collect();
        store.create_edges("Video", &pairs, EdgeType::Related).await.unwrap();

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut sizes = Vec::new();
                    for _ in 0..50 {
                        let nodes = store.query_nodes("Video", &Predicate::All).await.unwrap();
                        let edges = store
                            .run_aggregation(&AggregationSpec::EdgeList {
                                label: "Video".into(),
                                edge_type: EdgeType::Related,
                            })
                            .await
                            .unwrap();
                        sizes.push((nodes.len(), edges.len()));
                        tokio::task::yield_now().await;
                    }
                    sizes
                })
            })
            .collect();
        store.clear_all().await.unwrap();

        for reader in readers {
            for (nodes, edges) in reader.await.unwrap() {
                assert!(nodes == 200 || nodes == 0, "saw {nodes} nodes");
                assert!(edges == 199 || edges == 0, "saw {edges} edges");
            }
        }
    }

    #[tokio::test]
    async fn clear_removes_nodes_and_edges() {
        let store = store_with(&["a", "b"]).await;
        store.create_edge("a", "b", EdgeType::Related).await.unwrap();
        store.clear_all().await.unwrap();
        assert_eq!(store.node_count(None).await.unwrap(), 0);
        assert!(store.edges().await.is_empty());
    }

    #[tokio::test]
    async fn query_nodes_is_key_ordered() {
        let store = store_with(&["c", "a", "b"]).await;
        let ids: Vec<String> = store
            .query_nodes("Video", &Predicate::All)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(store
            .query_nodes("Channel", &Predicate::All)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn fulltext_requires_index_and_tracks_updates() {
        let store = MemoryStore::new();
        store
            .upsert_node(video("a", "Funny cats").with_property("title", "Funny cats"))
            .await
            .unwrap();

        let err = store.fulltext_query("Video", "category", "cats").await.unwrap_err();
        assert!(matches!(err, VidGraphError::MissingIndex { .. }));

        store.create_fulltext_index("Video", "category").await.unwrap();
        store.upsert_node(video("b", "Cats and dogs")).await.unwrap();

        let hits = store.fulltext_query("Video", "category", "cats").await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|(n, _)| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        store.upsert_node(video("a", "Sports")).await.unwrap();
        let hits = store.fulltext_query("Video", "category", "cats").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "b");
    }

    #[tokio::test]
    async fn rarer_terms_score_higher() {
        let store = MemoryStore::new();
        store.create_fulltext_index("Video", "category").await.unwrap();
        store.upsert_node(video("a", "music live")).await.unwrap();
        store.upsert_node(video("b", "music")).await.unwrap();
        store.upsert_node(video("c", "music")).await.unwrap();

        let hits = store
            .fulltext_query("Video", "category", "live music")
            .await
            .unwrap();
        assert_eq!(hits[0].0.id, "a");
        assert!(hits[0].1 > hits[1].1);
        assert_eq!(hits[1].1, hits[2].1);
        assert_eq!(hits[1].0.id, "b");
    }
}
