use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VidGraphError;

// --- Labels, keys, and well-known property names ---

/// Label carried by every ingested video node.
pub const VIDEO_LABEL: &str = "Video";

/// Property holding a node's unique key.
pub const KEY_PROPERTY: &str = "video_id";

/// Raw, comma-joined related-id list kept verbatim for linking and audit.
pub const RELATED_IDS_PROPERTY: &str = "related_ids";

/// Property written by the PageRank writeback.
pub const PAGE_RANK_PROPERTY: &str = "pageRank";

/// Separator used inside the `related_ids` column.
pub const RELATED_IDS_DELIMITER: char = ',';

/// Number of columns in an input row.
pub const ROW_COLUMNS: usize = 10;

// ---------------------------------------------------------------------------
// Property values
// ---------------------------------------------------------------------------

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Integer(i64),
    Float(f64),
    String(String),
    Null,
}

impl PropertyValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            PropertyValue::String(_) => ValueType::String,
            PropertyValue::Integer(_) => ValueType::Integer,
            PropertyValue::Float(_) => ValueType::Float,
            PropertyValue::Null => ValueType::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view of the value. Integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Integer(i) => Some(*i as f64),
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Total ordering used wherever values are sorted: null first, then numbers
    /// (compared numerically across Integer/Float), then strings by byte order.
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &PropertyValue) -> u8 {
            match v {
                PropertyValue::Null => 0,
                PropertyValue::Integer(_) | PropertyValue::Float(_) => 1,
                PropertyValue::String(_) => 2,
            }
        }

        match (self, other) {
            (PropertyValue::Integer(a), PropertyValue::Integer(b)) => a.cmp(b),
            (PropertyValue::String(a), PropertyValue::String(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => rank(a).cmp(&rank(b)),
            },
        }
    }

    /// Key used to deduplicate values. Integer 3 and Float 3.0 stay distinct
    /// because the schema treats them as different observed types.
    pub fn dedup_key(&self) -> String {
        match self {
            PropertyValue::String(s) => format!("s:{s}"),
            PropertyValue::Integer(i) => format!("i:{i}"),
            PropertyValue::Float(f) => format!("f:{}", f.to_bits()),
            PropertyValue::Null => "n".to_string(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "{s}"),
            PropertyValue::Integer(i) => write!(f, "{i}"),
            PropertyValue::Float(x) => write!(f, "{x}"),
            PropertyValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(PropertyValue::Null)
    }
}

/// Observed type of a property value. Names follow Neo4j's schema procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Integer,
    Float,
    Null,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "String",
            ValueType::Integer => "Long",
            ValueType::Float => "Double",
            ValueType::Null => "Null",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "String" => Some(ValueType::String),
            "Long" | "Integer" => Some(ValueType::Integer),
            "Double" | "Float" => Some(ValueType::Float),
            "Null" => Some(ValueType::Null),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

pub type Properties = BTreeMap<String, PropertyValue>;

/// A labeled graph node keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub properties: Properties,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Property lookup. An explicit `Null` counts as absent.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name).filter(|v| !v.is_null())
    }

    pub fn page_rank(&self) -> Option<f64> {
        self.get(PAGE_RANK_PROPERTY).and_then(PropertyValue::as_f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeType {
    Related,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Related => "RELATED",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub edge_type: EdgeType,
}

// ---------------------------------------------------------------------------
// Input rows
// ---------------------------------------------------------------------------

/// One validated input row: `id, uploader, age, category, length, views, rate,
/// ratings, comments, relatedIds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRow {
    pub id: String,
    pub uploader: Option<String>,
    pub age: Option<i64>,
    pub category: Option<String>,
    pub length: Option<i64>,
    pub views: Option<i64>,
    pub rate: Option<f64>,
    pub ratings: Option<i64>,
    pub comments: Option<i64>,
    pub related_ids: String,
}

impl VideoRow {
    /// Build a row from raw string fields in the fixed column order.
    /// `row` is the record's position, used only for error reporting.
    pub fn from_record<S: AsRef<str>>(row: usize, fields: &[S]) -> Result<Self, VidGraphError> {
        if fields.len() != ROW_COLUMNS {
            return Err(VidGraphError::Validation {
                row,
                reason: format!("expected {ROW_COLUMNS} columns, got {}", fields.len()),
            });
        }
        let f = |i: usize| fields[i].as_ref().trim();

        let id = f(0);
        if id.is_empty() {
            return Err(VidGraphError::Validation {
                row,
                reason: "empty id".to_string(),
            });
        }

        Ok(Self {
            id: id.to_string(),
            uploader: non_empty(f(1)),
            age: parse_int(row, "age", f(2))?,
            category: non_empty(f(3)),
            length: parse_int(row, "length", f(4))?,
            views: parse_int(row, "views", f(5))?,
            rate: parse_float(row, "rate", f(6))?,
            ratings: parse_int(row, "ratings", f(7))?,
            comments: parse_int(row, "comments", f(8))?,
            related_ids: f(9).to_string(),
        })
    }

    /// Target keys listed in `related_ids`, in order. Empty tokens are skipped.
    pub fn related_keys(&self) -> Vec<String> {
        split_related_ids(&self.related_ids)
    }

    pub fn into_node(self) -> Node {
        Node::new(self.id.clone(), VIDEO_LABEL)
            .with_property(KEY_PROPERTY, self.id)
            .with_property("uploader", self.uploader)
            .with_property("age", self.age)
            .with_property("category", self.category)
            .with_property("length", self.length)
            .with_property("views", self.views)
            .with_property("rate", self.rate)
            .with_property("ratings", self.ratings)
            .with_property("comments", self.comments)
            .with_property(RELATED_IDS_PROPERTY, self.related_ids)
    }
}

/// Split a raw related-id field into target keys.
pub fn split_related_ids(raw: &str) -> Vec<String> {
    raw.split(RELATED_IDS_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn parse_int(row: usize, column: &str, s: &str) -> Result<Option<i64>, VidGraphError> {
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<i64>()
        .map(Some)
        .map_err(|e| VidGraphError::Validation {
            row,
            reason: format!("{column}: {e} ({s:?})"),
        })
}

fn parse_float(row: usize, column: &str, s: &str) -> Result<Option<f64>, VidGraphError> {
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<f64>()
        .map(Some)
        .map_err(|e| VidGraphError::Validation {
            row,
            reason: format!("{column}: {e} ({s:?})"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, rate: &str, related: &str) -> Vec<String> {
        vec![
            id, "alice", "421", "Comedy", "229", "1000", rate, "12", "3", related,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    #[test]
    fn parses_well_formed_record() {
        let row = VideoRow::from_record(0, &record("abc", "4.5", "x,y")).unwrap();
        assert_eq!(row.id, "abc");
        assert_eq!(row.age, Some(421));
        assert_eq!(row.rate, Some(4.5));
        assert_eq!(row.category.as_deref(), Some("Comedy"));
        assert_eq!(row.related_keys(), vec!["x", "y"]);
    }

    #[test]
    fn wrong_column_count_is_validation_error() {
        let err = VideoRow::from_record(7, &["a", "b"]).unwrap_err();
        assert!(matches!(err, VidGraphError::Validation { row: 7, .. }));
    }

    #[test]
    fn unparsable_numeric_is_validation_error() {
        let err = VideoRow::from_record(2, &record("abc", "four", "")).unwrap_err();
        match err {
            VidGraphError::Validation { row, reason } => {
                assert_eq!(row, 2);
                assert!(reason.starts_with("rate"), "got {reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_numeric_becomes_null_property() {
        let node = VideoRow::from_record(0, &record("abc", "", ""))
            .unwrap()
            .into_node();
        assert_eq!(node.properties.get("rate"), Some(&PropertyValue::Null));
        assert!(node.get("rate").is_none());
        assert_eq!(node.get(KEY_PROPERTY), Some(&PropertyValue::from("abc")));
    }

    #[test]
    fn related_ids_skip_blank_tokens() {
        assert_eq!(split_related_ids(" a, ,b,,c "), vec!["a", "b", "c"]);
        assert!(split_related_ids("").is_empty());
    }

    #[test]
    fn natural_order_puts_numbers_before_strings() {
        let mut values = vec![
            PropertyValue::from("b"),
            PropertyValue::Float(2.5),
            PropertyValue::from("a"),
            PropertyValue::Integer(3),
            PropertyValue::Integer(-1),
        ];
        values.sort_by(|a, b| a.natural_cmp(b));
        assert_eq!(
            values,
            vec![
                PropertyValue::Integer(-1),
                PropertyValue::Float(2.5),
                PropertyValue::Integer(3),
                PropertyValue::from("a"),
                PropertyValue::from("b"),
            ]
        );
    }

    #[test]
    fn node_serializes_with_plain_values() {
        let node = Node::new("a", VIDEO_LABEL)
            .with_property("views", 10i64)
            .with_property("category", "Comedy")
            .with_property("rate", PropertyValue::Null);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["properties"]["views"], 10);
        assert_eq!(json["properties"]["category"], "Comedy");
        assert!(json["properties"]["rate"].is_null());
    }
}
