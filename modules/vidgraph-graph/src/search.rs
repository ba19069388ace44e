use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use vidgraph_common::{Node, Result, VidGraphError};

use crate::store::{GraphStore, Predicate};

/// Edit distance tolerance used when an approximate search omits one.
pub const DEFAULT_TOLERANCE: usize = 3;

/// How a property value is compared against the query. All strategies are
/// case-sensitive except `Fulltext`, whose matching is up to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStrategy {
    Exact,
    Contains,
    Prefix,
    Suffix,
    Fulltext,
    Approximate,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Contains => "contains",
            MatchStrategy::Prefix => "prefix",
            MatchStrategy::Suffix => "suffix",
            MatchStrategy::Fulltext => "fulltext",
            MatchStrategy::Approximate => "approximate",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStrategy {
    type Err = VidGraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exact" => Ok(MatchStrategy::Exact),
            "contains" => Ok(MatchStrategy::Contains),
            "prefix" | "starts_with" => Ok(MatchStrategy::Prefix),
            "suffix" | "ends_with" => Ok(MatchStrategy::Suffix),
            "fulltext" => Ok(MatchStrategy::Fulltext),
            "approximate" | "levenshtein" => Ok(MatchStrategy::Approximate),
            other => Err(VidGraphError::invalid(format!(
                "unknown match strategy: {other}"
            ))),
        }
    }
}

/// One search result. `score` is set only for fulltext matches.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub node: Node,
    pub score: Option<f64>,
}

/// Multi-strategy property matcher over nodes of one label.
pub struct SearchEngine {
    store: Arc<dyn GraphStore>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Search `label` nodes whose `property` matches `query` under `strategy`.
    ///
    /// Non-fulltext hits come back ordered by node key ascending. Fulltext hits
    /// are ordered by score descending, ties by key ascending. An unknown label
    /// or property yields an empty result.
    pub async fn search(
        &self,
        label: &str,
        property: &str,
        query: &str,
        strategy: MatchStrategy,
        tolerance: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let hits = match predicate_for(property, query, strategy, tolerance) {
            None => self.fulltext(label, property, query).await?,
            Some(predicate) => {
                self.store
                    .query_nodes(label, &predicate)
                    .await?
                    .into_iter()
                    .map(|node| SearchHit { node, score: None })
                    .collect()
            }
        };

        info!(label, property, %strategy, hits = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Same as [`search`](Self::search) with the strategy given by name.
    pub async fn search_by_name(
        &self,
        label: &str,
        property: &str,
        query: &str,
        strategy: &str,
        tolerance: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let strategy: MatchStrategy = strategy.parse()?;
        self.search(label, property, query, strategy, tolerance).await
    }

    /// Provision the fulltext index that `MatchStrategy::Fulltext` requires.
    pub async fn create_fulltext_index(&self, label: &str, property: &str) -> Result<()> {
        self.store.create_fulltext_index(label, property).await
    }

    async fn fulltext(&self, label: &str, property: &str, query: &str) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(VidGraphError::invalid("fulltext query must not be empty"));
        }
        let mut scored = self.store.fulltext_query(label, property, query).await?;
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        debug!(label, property, candidates = scored.len(), "Fulltext candidates");
        Ok(scored
            .into_iter()
            .map(|(node, score)| SearchHit {
                node,
                score: Some(score),
            })
            .collect())
    }
}

/// Backend predicate for a strategy. `None` for fulltext, which is served by
/// the index instead.
fn predicate_for(
    property: &str,
    query: &str,
    strategy: MatchStrategy,
    tolerance: Option<usize>,
) -> Option<Predicate> {
    let property = property.to_string();
    let predicate = match strategy {
        MatchStrategy::Exact => Predicate::Equals {
            property,
            value: query.to_string(),
        },
        MatchStrategy::Contains => Predicate::Contains {
            property,
            needle: query.to_string(),
        },
        MatchStrategy::Prefix => Predicate::StartsWith {
            property,
            prefix: query.to_string(),
        },
        MatchStrategy::Suffix => Predicate::EndsWith {
            property,
            suffix: query.to_string(),
        },
        MatchStrategy::Approximate => Predicate::WithinDistance {
            property,
            query: query.to_string(),
            tolerance: tolerance.unwrap_or(DEFAULT_TOLERANCE),
        },
        MatchStrategy::Fulltext => return None,
    };
    Some(predicate)
}

/// Levenshtein distance over chars, unit cost for insert, delete and substitute.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use vidgraph_common::PropertyValue;

    async fn engine() -> SearchEngine {
        let store = MemoryStore::new();
        let rows = [
            ("v3", "Comedy", "alice"),
            ("v1", "Comedy", "bob"),
            ("v2", "comedy", "alicia"),
            ("v4", "Music", "carol"),
            ("v5", "Comedy & Humor", "dave"),
        ];
        for (id, category, uploader) in rows {
            store
                .upsert_node(
                    Node::new(id, "Video")
                        .with_property("category", category)
                        .with_property("uploader", uploader)
                        .with_property("views", 100i64),
                )
                .await
                .unwrap();
        }
        store
            .upsert_node(Node::new("v6", "Video").with_property("category", PropertyValue::Null))
            .await
            .unwrap();
        SearchEngine::new(Arc::new(store))
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.node.id.as_str()).collect()
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
        assert_eq!(levenshtein("café", "cafe"), 1);
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("exact".parse::<MatchStrategy>().unwrap(), MatchStrategy::Exact);
        assert_eq!(
            "starts_with".parse::<MatchStrategy>().unwrap(),
            MatchStrategy::Prefix
        );
        assert_eq!(
            "levenshtein".parse::<MatchStrategy>().unwrap(),
            MatchStrategy::Approximate
        );
        assert!(matches!(
            "regex".parse::<MatchStrategy>(),
            Err(VidGraphError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn exact_is_case_sensitive_and_key_ordered() {
        let engine = engine().await;
        let hits = engine
            .search("Video", "category", "Comedy", MatchStrategy::Exact, None)
            .await
            .unwrap();
        assert_eq!(ids(&hits), vec!["v1", "v3"]);
        assert!(hits.iter().all(|h| h.score.is_none()));
    }

    #[tokio::test]
    async fn substring_strategies() {
        let engine = engine().await;
        let contains = engine
            .search("Video", "category", "edy", MatchStrategy::Contains, None)
            .await
            .unwrap();
        assert_eq!(ids(&contains), vec!["v1", "v2", "v3", "v5"]);

        let prefix = engine
            .search("Video", "uploader", "ali", MatchStrategy::Prefix, None)
            .await
            .unwrap();
        assert_eq!(ids(&prefix), vec!["v2", "v3"]);

        let suffix = engine
            .search("Video", "category", "Humor", MatchStrategy::Suffix, None)
            .await
            .unwrap();
        assert_eq!(ids(&suffix), vec!["v5"]);
    }

    #[tokio::test]
    async fn approximate_with_zero_tolerance_equals_exact() {
        let engine = engine().await;
        let exact = engine
            .search("Video", "category", "Comedy", MatchStrategy::Exact, None)
            .await
            .unwrap();
        let approx = engine
            .search("Video", "category", "Comedy", MatchStrategy::Approximate, Some(0))
            .await
            .unwrap();
        assert_eq!(ids(&exact), ids(&approx));

        let one_off = engine
            .search("Video", "category", "Comedy", MatchStrategy::Approximate, Some(1))
            .await
            .unwrap();
        assert_eq!(ids(&one_off), vec!["v1", "v2", "v3"]);
    }

    #[tokio::test]
    async fn zero_tolerance_equals_exact_on_numeric_property() {
        let store = MemoryStore::new();
        for (id, views, rate) in [("a", 100i64, 3.0), ("b", 200i64, 4.5)] {
            store
                .upsert_node(
                    Node::new(id, "Video")
                        .with_property("views", views)
                        .with_property("rate", rate),
                )
                .await
                .unwrap();
        }
        let engine = SearchEngine::new(Arc::new(store));

        for (property, query) in [("views", "100"), ("views", "200.0"), ("rate", "3"), ("rate", "4.5")] {
            let exact = engine
                .search("Video", property, query, MatchStrategy::Exact, None)
                .await
                .unwrap();
            let approx = engine
                .search("Video", property, query, MatchStrategy::Approximate, Some(0))
                .await
                .unwrap();
            assert_eq!(exact.len(), 1, "{property}={query}");
            assert_eq!(ids(&exact), ids(&approx), "{property}={query}");
        }
    }

    #[tokio::test]
    async fn unknown_label_or_property_is_empty() {
        let engine = engine().await;
        let hits = engine
            .search("Channel", "category", "Comedy", MatchStrategy::Exact, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
        let hits = engine
            .search("Video", "title", "Comedy", MatchStrategy::Contains, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn unknown_strategy_name_is_invalid_argument() {
        let engine = engine().await;
        let err = engine
            .search_by_name("Video", "category", "Comedy", "soundex", None)
            .await
            .unwrap_err();
        assert!(matches!(err, VidGraphError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn fulltext_distinguishes_missing_index_from_no_matches() {
        let engine = engine().await;
        let err = engine
            .search("Video", "category", "comedy", MatchStrategy::Fulltext, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VidGraphError::MissingIndex { .. }));

        engine.create_fulltext_index("Video", "category").await.unwrap();
        let none = engine
            .search("Video", "category", "polka", MatchStrategy::Fulltext, None)
            .await
            .unwrap();
        assert!(none.is_empty());

        let hits = engine
            .search("Video", "category", "comedy humor", MatchStrategy::Fulltext, None)
            .await
            .unwrap();
        assert_eq!(hits[0].node.id, "v5");
        assert_eq!(ids(&hits[1..]), vec!["v1", "v2", "v3"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
