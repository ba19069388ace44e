//! Neo4j backend for [`GraphStore`].
//!
//! Nodes are keyed by their `video_id` property under their label. Reads are
//! retried with exponential backoff on transport errors; mutations run exactly
//! once so a partial failure is never replayed.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use neo4rs::{
    query, BoltFloat, BoltInteger, BoltMap, BoltNull, BoltString, BoltType, Query,
    Row as BoltRow,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use vidgraph_common::{
    EdgeType, Node, PropertyValue, Result, VidGraphError, KEY_PROPERTY, VIDEO_LABEL,
};

use crate::store::{
    columns, AggregationSpec, EdgeOutcome, GraphStore, Predicate, Row, UpsertOutcome,
};
use crate::GraphClient;

const READ_ATTEMPTS: u32 = 3;
const READ_BACKOFF: Duration = Duration::from_millis(100);

pub struct Neo4jStore {
    client: GraphClient,
    edge_label: String,
}

impl Neo4jStore {
    pub fn new(client: GraphClient) -> Self {
        Self {
            client,
            edge_label: VIDEO_LABEL.to_string(),
        }
    }

    /// Label whose key index single `create_edge` calls resolve endpoints
    /// against. Defaults to the video label.
    pub fn with_edge_label(mut self, label: &str) -> Self {
        self.edge_label = label.to_string();
        self
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    /// Run a read query, retrying transport failures.
    async fn read<F>(&self, context: &str, build: F) -> Result<Vec<BoltRow>>
    where
        F: Fn() -> Query + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch(build()).await {
                Ok(rows) => return Ok(rows),
                Err(e) if attempt < READ_ATTEMPTS => {
                    let delay = READ_BACKOFF * 2u32.pow(attempt - 1);
                    warn!(context, attempt, error = %e, "Read failed, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(VidGraphError::connectivity(context, e)),
            }
        }
    }

    /// Run a mutation once.
    async fn write(&self, context: &str, q: Query) -> Result<Vec<BoltRow>> {
        self.fetch(q)
            .await
            .map_err(|e| VidGraphError::connectivity(context, e))
    }

    async fn fetch(&self, q: Query) -> Result<Vec<BoltRow>, neo4rs::Error> {
        let mut stream = self.client.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn fulltext_index_exists(&self, name: &str) -> Result<bool> {
        let rows = self
            .read("show fulltext indexes", || {
                query("SHOW FULLTEXT INDEXES YIELD name WHERE name = $name RETURN name")
                    .param("name", name)
            })
            .await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn upsert_node(&self, node: Node) -> Result<UpsertOutcome> {
        let label = ident(&node.label)?;
        let cypher = format!(
            "OPTIONAL MATCH (existing:{label} {{{KEY_PROPERTY}: $id}})
             WITH count(existing) = 0 AS created
             MERGE (n:{label} {{{KEY_PROPERTY}: $id}})
             SET n = $props, n.{KEY_PROPERTY} = $id
             RETURN created"
        );
        let props = BoltMap::from_iter(
            node.properties
                .iter()
                .map(|(k, v)| (BoltString::from(k.as_str()), to_bolt(v))),
        );
        let q = query(&cypher)
            .param("id", node.id.as_str())
            .param("props", BoltType::Map(props));

        let rows = self.write("upsert node", q).await?;
        let created = match rows.first() {
            Some(row) => decode::<bool>(row, "created")?,
            None => true,
        };
        debug!(id = node.id.as_str(), created, "Node upserted");
        Ok(if created {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn create_edge(
        &self,
        source: &str,
        target: &str,
        edge_type: EdgeType,
    ) -> Result<EdgeOutcome> {
        let pair = [(source.to_string(), target.to_string())];
        let outcomes = self.create_edges(&self.edge_label, &pair, edge_type).await?;
        Ok(outcomes
            .into_iter()
            .next()
            .unwrap_or(EdgeOutcome::MissingEndpoint))
    }

    async fn create_edges(
        &self,
        label: &str,
        pairs: &[(String, String)],
        edge_type: EdgeType,
    ) -> Result<Vec<EdgeOutcome>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let cypher = link_cypher(label, edge_type)?;
        let batch = EdgeBatch::new(pairs);
        let edges: Vec<BoltType> = batch
            .unique
            .iter()
            .enumerate()
            .map(|(i, (source, target))| {
                BoltType::Map(BoltMap::from_iter(vec![
                    (
                        BoltString::from("i"),
                        BoltType::Integer(BoltInteger::new(i as i64)),
                    ),
                    (
                        BoltString::from("source"),
                        BoltType::String(BoltString::from(source.as_str())),
                    ),
                    (
                        BoltString::from("target"),
                        BoltType::String(BoltString::from(target.as_str())),
                    ),
                ]))
            })
            .collect();

        let rows = self
            .write("create edges", query(&cypher).param("edges", edges))
            .await?;
        let mut first = vec![EdgeOutcome::MissingEndpoint; batch.unique.len()];
        for row in &rows {
            let i = decode::<i64>(row, "i")?;
            let Some(slot) = usize::try_from(i).ok().and_then(|i| first.get_mut(i)) else {
                continue;
            };
            *slot = match (decode::<bool>(row, "linked")?, decode::<i64>(row, "existing")?) {
                (false, _) => EdgeOutcome::MissingEndpoint,
                (true, 0) => EdgeOutcome::Created,
                (true, _) => EdgeOutcome::Existing,
            };
        }
        debug!(label, pairs = pairs.len(), unique = batch.unique.len(), "Edge batch written");
        Ok(batch.resolve(&first))
    }

    async fn clear_all(&self) -> Result<()> {
        self.client
            .graph
            .run(query("MATCH (n) DETACH DELETE n"))
            .await
            .map_err(|e| VidGraphError::connectivity("clear graph", e))?;
        info!("Graph cleared");
        Ok(())
    }

    async fn query_nodes(&self, label: &str, predicate: &Predicate) -> Result<Vec<Node>> {
        let label_ident = ident(label)?;
        let filter = Filter::build(predicate)?;
        let cypher = format!(
            "MATCH (n:{label_ident}) {where_clause}
             RETURN n.{KEY_PROPERTY} AS id, properties(n) AS props
             ORDER BY id",
            where_clause = filter.where_clause(),
        );

        let rows = self
            .read("query nodes", || filter.bind(query(&cypher)))
            .await?;
        rows.iter().map(|row| node_from_row(row, label)).collect()
    }

    async fn run_aggregation(&self, spec: &AggregationSpec) -> Result<Vec<Row>> {
        match spec {
            AggregationSpec::GroupCount { label, property } => {
                let (label, property) = (ident(label)?, ident(property)?);
                let cypher = format!(
                    "MATCH (n:{label}) WHERE n.{property} IS NOT NULL
                     RETURN n.{property} AS value, count(*) AS count"
                );
                let rows = self.read("group count", || query(&cypher)).await?;
                rows.iter()
                    .map(|row| {
                        Ok(Row::new()
                            .with(columns::VALUE, decode::<PropertyValue>(row, "value")?)
                            .with(columns::COUNT, decode::<i64>(row, "count")?))
                    })
                    .collect()
            }
            AggregationSpec::EdgeList { label, edge_type } => {
                let (label, rel) = (ident(label)?, ident(edge_type.as_str())?);
                let cypher = format!(
                    "MATCH (a:{label})-[:{rel}]->(b:{label})
                     RETURN DISTINCT a.{KEY_PROPERTY} AS source, b.{KEY_PROPERTY} AS target"
                );
                let rows = self.read("edge list", || query(&cypher)).await?;
                rows.iter()
                    .map(|row| {
                        Ok(Row::new()
                            .with(columns::SOURCE, decode::<String>(row, "source")?)
                            .with(columns::TARGET, decode::<String>(row, "target")?))
                    })
                    .collect()
            }
            AggregationSpec::PropertyTypes => {
                let rows = self
                    .read("property types", || {
                        query(
                            "CALL db.schema.nodeTypeProperties()
                             YIELD nodeLabels, propertyName, propertyTypes
                             WITH nodeLabels, propertyName, propertyTypes
                             WHERE propertyName IS NOT NULL
                             UNWIND nodeLabels AS label
                             UNWIND propertyTypes AS type
                             RETURN DISTINCT label, propertyName AS property, type",
                        )
                    })
                    .await?;
                rows.iter()
                    .map(|row| {
                        Ok(Row::new()
                            .with(columns::LABEL, decode::<String>(row, "label")?)
                            .with(columns::PROPERTY, decode::<String>(row, "property")?)
                            .with(columns::TYPE, decode::<String>(row, "type")?))
                    })
                    .collect()
            }
            AggregationSpec::Degrees { label, edge_type } => {
                let (label, rel) = (ident(label)?, ident(edge_type.as_str())?);
                let cypher = format!(
                    "MATCH (n:{label})
                     OPTIONAL MATCH (n)-[:{rel}]->(o:{label})
                     WITH n, count(DISTINCT o) AS out_degree
                     OPTIONAL MATCH (i:{label})-[:{rel}]->(n)
                     RETURN n.{KEY_PROPERTY} AS id, out_degree, count(DISTINCT i) AS in_degree"
                );
                let rows = self.read("degrees", || query(&cypher)).await?;
                rows.iter()
                    .map(|row| {
                        Ok(Row::new()
                            .with(columns::ID, decode::<String>(row, "id")?)
                            .with(columns::OUT_DEGREE, decode::<i64>(row, "out_degree")?)
                            .with(columns::IN_DEGREE, decode::<i64>(row, "in_degree")?))
                    })
                    .collect()
            }
        }
    }

    async fn annotate_nodes(
        &self,
        label: &str,
        property: &str,
        values: &[(String, PropertyValue)],
    ) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        let (label, property_ident) = (ident(label)?, ident(property)?);
        let cypher = format!(
            "UNWIND $rows AS row
             MATCH (n:{label} {{{KEY_PROPERTY}: row.id}})
             SET n.{property_ident} = row.value
             RETURN count(n) AS updated"
        );
        let rows: Vec<BoltType> = values
            .iter()
            .map(|(id, value)| {
                BoltType::Map(BoltMap::from_iter(vec![
                    (
                        BoltString::from("id"),
                        BoltType::String(BoltString::from(id.as_str())),
                    ),
                    (BoltString::from("value"), to_bolt(value)),
                ]))
            })
            .collect();

        let result = self
            .write("annotate nodes", query(&cypher).param("rows", rows))
            .await?;
        let updated = match result.first() {
            Some(row) => decode::<i64>(row, "updated")?.max(0) as u64,
            None => 0,
        };
        info!(property, updated, "Nodes annotated");
        Ok(updated)
    }

    async fn create_fulltext_index(&self, label: &str, property: &str) -> Result<()> {
        let name = fulltext_index_name(label, property)?;
        let cypher = format!(
            "CREATE FULLTEXT INDEX {index} IF NOT EXISTS FOR (n:{label}) ON EACH [n.{property}]",
            index = ident(&name)?,
            label = ident(label)?,
            property = ident(property)?,
        );
        self.client
            .graph
            .run(query(&cypher))
            .await
            .map_err(|e| VidGraphError::connectivity("create fulltext index", e))?;
        self.client
            .graph
            .run(query("CALL db.awaitIndex($name, 300)").param("name", name.as_str()))
            .await
            .map_err(|e| VidGraphError::connectivity("await fulltext index", e))?;
        info!(index = name.as_str(), "Fulltext index ready");
        Ok(())
    }

    async fn fulltext_query(
        &self,
        label: &str,
        property: &str,
        text: &str,
    ) -> Result<Vec<(Node, f64)>> {
        let name = fulltext_index_name(label, property)?;
        if !self.fulltext_index_exists(&name).await? {
            return Err(VidGraphError::MissingIndex {
                label: label.to_string(),
                property: property.to_string(),
            });
        }

        let escaped = escape_lucene(text);
        let cypher = format!(
            "CALL db.index.fulltext.queryNodes($name, $text) YIELD node, score
             RETURN node.{KEY_PROPERTY} AS id, properties(node) AS props, score"
        );
        let rows = self
            .read("fulltext query", || {
                query(&cypher)
                    .param("name", name.as_str())
                    .param("text", escaped.as_str())
            })
            .await?;

        rows.iter()
            .map(|row| Ok((node_from_row(row, label)?, decode::<f64>(row, "score")?)))
            .collect()
    }

    async fn node_count(&self, label: Option<&str>) -> Result<u64> {
        let cypher = match label {
            Some(label) => format!("MATCH (n:{}) RETURN count(n) AS count", ident(label)?),
            None => "MATCH (n) RETURN count(n) AS count".to_string(),
        };
        let rows = self.read("node count", || query(&cypher)).await?;
        match rows.first() {
            Some(row) => Ok(decode::<i64>(row, "count")?.max(0) as u64),
            None => Ok(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Edge batches
// ---------------------------------------------------------------------------

/// Links a batch in one round trip. Endpoints are resolved through the key
/// index of `label`; rows whose endpoints are missing come back unlinked.
fn link_cypher(label: &str, edge_type: EdgeType) -> Result<String> {
    let (label, rel) = (ident(label)?, ident(edge_type.as_str())?);
    Ok(format!(
        "UNWIND $edges AS edge
         OPTIONAL MATCH (a:{label} {{{KEY_PROPERTY}: edge.source}})
         OPTIONAL MATCH (b:{label} {{{KEY_PROPERTY}: edge.target}})
         OPTIONAL MATCH (a)-[r:{rel}]->(b)
         WITH edge, a, b, count(r) AS existing
         FOREACH (_ IN CASE WHEN a IS NOT NULL AND b IS NOT NULL THEN [1] ELSE [] END |
             MERGE (a)-[:{rel}]->(b))
         RETURN edge.i AS i, a IS NOT NULL AND b IS NOT NULL AS linked, existing"
    ))
}

/// Input pairs with in-batch repeats folded, so each distinct pair is
/// written once.
struct EdgeBatch {
    unique: Vec<(String, String)>,
    /// Per input pair: index into `unique`, and whether it repeats an
    /// earlier pair of the batch.
    slots: Vec<(usize, bool)>,
}

impl EdgeBatch {
    fn new(pairs: &[(String, String)]) -> Self {
        let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
        let mut unique = Vec::new();
        let mut slots = Vec::with_capacity(pairs.len());
        for (source, target) in pairs {
            match seen.get(&(source.as_str(), target.as_str())) {
                Some(&i) => slots.push((i, true)),
                None => {
                    seen.insert((source.as_str(), target.as_str()), unique.len());
                    slots.push((unique.len(), false));
                    unique.push((source.clone(), target.clone()));
                }
            }
        }
        Self { unique, slots }
    }

    /// Expand per-unique outcomes back to input order. A repeat of a linked
    /// pair is `Existing`; a repeat of a missing one stays missing.
    fn resolve(&self, first: &[EdgeOutcome]) -> Vec<EdgeOutcome> {
        self.slots
            .iter()
            .map(|&(i, repeat)| match (first[i], repeat) {
                (EdgeOutcome::MissingEndpoint, _) => EdgeOutcome::MissingEndpoint,
                (_, true) => EdgeOutcome::Existing,
                (outcome, false) => outcome,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Predicate translation
// ---------------------------------------------------------------------------

/// A WHERE clause plus the parameters it references.
struct Filter {
    conditions: Vec<String>,
    params: Vec<(&'static str, BoltType)>,
}

impl Filter {
    fn build(predicate: &Predicate) -> Result<Self> {
        let mut filter = Filter {
            conditions: Vec::new(),
            params: Vec::new(),
        };
        match predicate {
            Predicate::All => {}
            Predicate::Exists(props) => {
                for p in props {
                    filter.conditions.push(format!("n.{} IS NOT NULL", ident(p)?));
                }
            }
            Predicate::Equals { property, value } => filter.push_equals(property, value)?,
            Predicate::Contains { property, needle } => {
                filter.param("needle", needle.as_str());
                filter
                    .conditions
                    .push(format!("n.{} CONTAINS $needle", ident(property)?));
            }
            Predicate::StartsWith { property, prefix } => {
                filter.param("prefix", prefix.as_str());
                filter
                    .conditions
                    .push(format!("n.{} STARTS WITH $prefix", ident(property)?));
            }
            Predicate::EndsWith { property, suffix } => {
                filter.param("suffix", suffix.as_str());
                filter
                    .conditions
                    .push(format!("n.{} ENDS WITH $suffix", ident(property)?));
            }
            Predicate::WithinDistance {
                property,
                query: text,
                tolerance: 0,
            } => filter.push_equals(property, text)?,
            Predicate::WithinDistance {
                property,
                query: text,
                tolerance,
            } => {
                let p = ident(property)?;
                filter.param("text", text.as_str());
                filter.param("tolerance", *tolerance as i64);
                filter.conditions.push(format!(
                    "n.{p} IS :: STRING NOT NULL \
                     AND apoc.text.levenshteinDistance(n.{p}, $text) <= $tolerance"
                ));
            }
        }
        Ok(filter)
    }

    /// String equality, widened to numeric equality when `value` parses as a
    /// finite number.
    fn push_equals(&mut self, property: &str, value: &str) -> Result<()> {
        let p = ident(property)?;
        self.param("value", value);
        match value.parse::<f64>() {
            Ok(number) if number.is_finite() => {
                self.param("number", number);
                self.conditions
                    .push(format!("(n.{p} = $value OR n.{p} = $number)"));
            }
            _ => self.conditions.push(format!("n.{p} = $value")),
        }
        Ok(())
    }

    fn param(&mut self, key: &'static str, value: impl Into<BoltType>) {
        self.params.push((key, value.into()));
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    fn bind(&self, mut q: Query) -> Query {
        for (key, value) in &self.params {
            q = q.param(key, value.clone());
        }
        q
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Backtick-quote a label, property or relationship name. Only ASCII
/// alphanumerics and `_` are accepted, so names can never break out of the
/// quoting.
fn ident(name: &str) -> Result<String> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(VidGraphError::invalid(format!("invalid identifier: {name:?}")));
    }
    Ok(format!("`{name}`"))
}

fn fulltext_index_name(label: &str, property: &str) -> Result<String> {
    ident(label)?;
    ident(property)?;
    Ok(format!("fulltext_{}_{}", label.to_lowercase(), property.to_lowercase()))
}

fn escape_lucene(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
        '/',
    ];
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Integer(i) => BoltType::Integer(BoltInteger::new(*i)),
        PropertyValue::Float(f) => BoltType::Float(BoltFloat::new(*f)),
        PropertyValue::String(s) => BoltType::String(BoltString::from(s.as_str())),
        PropertyValue::Null => BoltType::Null(BoltNull),
    }
}

fn decode<T: DeserializeOwned>(row: &BoltRow, column: &str) -> Result<T> {
    row.get::<T>(column)
        .map_err(|e| anyhow::anyhow!("failed to decode column {column}: {e}").into())
}

fn node_from_row(row: &BoltRow, label: &str) -> Result<Node> {
    let id: String = decode(row, "id")?;
    let props: HashMap<String, PropertyValue> = decode(row, "props")?;
    let mut node = Node::new(id, label);
    node.properties.extend(props);
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted_and_checked() {
        assert_eq!(ident("Video").unwrap(), "`Video`");
        assert_eq!(ident("page_rank2").unwrap(), "`page_rank2`");
        assert!(ident("").is_err());
        assert!(ident("a`) DETACH DELETE n //").is_err());
        assert!(ident("has space").is_err());
    }

    #[test]
    fn filter_for_numeric_equality_binds_both_forms() {
        let filter = Filter::build(&Predicate::Equals {
            property: "views".into(),
            value: "1200".into(),
        })
        .unwrap();
        assert_eq!(
            filter.where_clause(),
            "WHERE (n.`views` = $value OR n.`views` = $number)"
        );
        assert_eq!(filter.params.len(), 2);
    }

    #[test]
    fn filter_for_string_equality_binds_value_only() {
        let filter = Filter::build(&Predicate::Equals {
            property: "category".into(),
            value: "Comedy".into(),
        })
        .unwrap();
        assert_eq!(filter.where_clause(), "WHERE n.`category` = $value");
        assert_eq!(filter.params.len(), 1);
    }

    #[test]
    fn zero_distance_filter_is_equality() {
        let approx = Filter::build(&Predicate::WithinDistance {
            property: "views".into(),
            query: "100".into(),
            tolerance: 0,
        })
        .unwrap();
        let exact = Filter::build(&Predicate::Equals {
            property: "views".into(),
            value: "100".into(),
        })
        .unwrap();
        assert_eq!(approx.where_clause(), exact.where_clause());
        let keys = |f: &Filter| f.params.iter().map(|(k, _)| *k).collect::<Vec<_>>();
        assert_eq!(keys(&approx), vec!["value", "number"]);
        assert_eq!(keys(&approx), keys(&exact));
    }

    #[test]
    fn filter_for_all_has_no_where_clause() {
        let filter = Filter::build(&Predicate::All).unwrap();
        assert_eq!(filter.where_clause(), "");
    }

    #[test]
    fn exists_joins_conditions() {
        let filter =
            Filter::build(&Predicate::Exists(vec!["category".into(), "ratings".into()])).unwrap();
        assert_eq!(
            filter.where_clause(),
            "WHERE n.`category` IS NOT NULL AND n.`ratings` IS NOT NULL"
        );
    }

    #[test]
    fn link_query_resolves_endpoints_by_label() {
        let cypher = link_cypher("Video", EdgeType::Related).unwrap();
        assert!(cypher.contains("UNWIND $edges AS edge"));
        assert!(cypher.contains("(a:`Video` {video_id: edge.source})"));
        assert!(cypher.contains("(b:`Video` {video_id: edge.target})"));
        assert!(!cypher.contains("MATCH (a {"));
        assert!(link_cypher("Video Clip", EdgeType::Related).is_err());
    }

    #[test]
    fn edge_batch_folds_repeats() {
        let pairs: Vec<(String, String)> = [("a", "b"), ("a", "ghost"), ("a", "b"), ("a", "ghost"), ("b", "a")]
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect();
        let batch = EdgeBatch::new(&pairs);
        assert_eq!(batch.unique.len(), 3);

        let first = [
            EdgeOutcome::Created,
            EdgeOutcome::MissingEndpoint,
            EdgeOutcome::Existing,
        ];
        assert_eq!(
            batch.resolve(&first),
            vec![
                EdgeOutcome::Created,
                EdgeOutcome::MissingEndpoint,
                EdgeOutcome::Existing,
                EdgeOutcome::MissingEndpoint,
                EdgeOutcome::Existing,
            ]
        );
    }

    #[test]
    fn lucene_specials_are_escaped() {
        assert_eq!(escape_lucene("rock & roll"), "rock \\& roll");
        assert_eq!(escape_lucene("a+b:c"), "a\\+b\\:c");
        assert_eq!(escape_lucene("plain words"), "plain words");
    }

    #[test]
    fn index_names_are_stable() {
        assert_eq!(
            fulltext_index_name("Video", "category").unwrap(),
            "fulltext_video_category"
        );
        assert!(fulltext_index_name("Video", "bad name").is_err());
    }
}
