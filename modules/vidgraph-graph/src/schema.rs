use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use vidgraph_common::{PropertyValue, Result, ValueType};

use crate::store::{columns, AggregationSpec, GraphStore, Predicate};

/// label → property → every value type observed for it.
pub type SchemaMap = BTreeMap<String, BTreeMap<String, BTreeSet<ValueType>>>;

/// Read-only introspection of observed labels, properties and value types.
pub struct SchemaCatalog {
    store: Arc<dyn GraphStore>,
}

impl SchemaCatalog {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Observed property types per label. A property whose source data was
    /// inconsistent keeps every type it was seen with.
    pub async fn describe_schema(&self) -> Result<SchemaMap> {
        let rows = self
            .store
            .run_aggregation(&AggregationSpec::PropertyTypes)
            .await?;

        let mut schema = SchemaMap::new();
        for row in &rows {
            let (Some(label), Some(property), Some(ty)) = (
                row.get_str(columns::LABEL),
                row.get_str(columns::PROPERTY),
                row.get_str(columns::TYPE),
            ) else {
                continue;
            };
            let Some(ty) = ValueType::from_str_opt(ty) else {
                warn!(label, property, ty, "Skipping unrecognised property type");
                continue;
            };
            schema
                .entry(label.to_string())
                .or_default()
                .entry(property.to_string())
                .or_default()
                .insert(ty);
        }

        info!(labels = schema.len(), "Schema described");
        Ok(schema)
    }

    /// Distinct non-null values of `property` across `label` nodes, sorted
    /// ascending (numbers numerically, then strings lexicographically).
    /// Nodes without the property are skipped.
    pub async fn list_property_values(
        &self,
        label: &str,
        property: &str,
    ) -> Result<Vec<PropertyValue>> {
        let nodes = self
            .store
            .query_nodes(label, &Predicate::exists(property))
            .await?;

        let mut seen = HashSet::new();
        let mut values: Vec<PropertyValue> = nodes
            .iter()
            .filter_map(|n| n.get(property))
            .filter(|v| seen.insert(v.dedup_key()))
            .cloned()
            .collect();
        values.sort_by(|a, b| a.natural_cmp(b));
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use vidgraph_common::Node;

    async fn catalog() -> SchemaCatalog {
        let store = MemoryStore::new();
        let nodes = vec![
            Node::new("a", "Video")
                .with_property("category", "Music")
                .with_property("age", 10i64),
            Node::new("b", "Video")
                .with_property("category", "Comedy")
                .with_property("age", "unknown"),
            Node::new("c", "Video")
                .with_property("category", "Music")
                .with_property("age", 3i64),
            Node::new("d", "Video").with_property("age", 2.5),
            Node::new("u1", "Uploader").with_property("name", "alice"),
        ];
        for node in nodes {
            store.upsert_node(node).await.unwrap();
        }
        SchemaCatalog::new(Arc::new(store))
    }

    #[tokio::test]
    async fn mixed_types_are_preserved() {
        let schema = catalog().await.describe_schema().await.unwrap();
        assert_eq!(schema.len(), 2);

        let age = &schema["Video"]["age"];
        assert_eq!(
            age.iter().copied().collect::<Vec<_>>(),
            vec![ValueType::String, ValueType::Integer, ValueType::Float]
        );
        assert_eq!(
            schema["Uploader"]["name"].iter().copied().collect::<Vec<_>>(),
            vec![ValueType::String]
        );
    }

    #[tokio::test]
    async fn distinct_values_are_sorted_and_skip_missing() {
        let catalog = catalog().await;
        let categories = catalog.list_property_values("Video", "category").await.unwrap();
        assert_eq!(
            categories,
            vec![PropertyValue::from("Comedy"), PropertyValue::from("Music")]
        );

        let ages = catalog.list_property_values("Video", "age").await.unwrap();
        assert_eq!(
            ages,
            vec![
                PropertyValue::Float(2.5),
                PropertyValue::Integer(3),
                PropertyValue::Integer(10),
                PropertyValue::from("unknown"),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_property_has_no_values() {
        let values = catalog()
            .await
            .list_property_values("Video", "title")
            .await
            .unwrap();
        assert!(values.is_empty());
    }
}
