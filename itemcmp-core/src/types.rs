//! Core data model: catalog items, comparison requests, and comparison results.
//!
//! All serialized maps are ordered (`BTreeMap`) so that rendering the same
//! result twice always produces byte-identical JSON.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Currency tag attached to every comparison.
pub const CURRENCY: &str = "USD";

/// Version tag of the comparison response format.
pub const RESPONSE_VERSION: &str = "1.0";

/// A single specification value attached to an item.
///
/// Closed set of shapes a specification can take in the catalog. `Nested`
/// covers `{ "value": .., "unit": .. }` style structures. `Null` only occurs
/// inside `Nested` and `List`; top-level nulls are dropped on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<SpecValue>),
    Nested(BTreeMap<String, SpecValue>),
}

impl SpecValue {
    /// Numeric view of the value. Only `Number` coerces; text, booleans,
    /// lists and nested structures never do.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SpecValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Boolean view of the value. Only `Bool` coerces.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SpecValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Build a numeric value from a float. Non-finite floats have no JSON
    /// representation and yield `None`.
    pub fn from_f64(value: f64) -> Option<Self> {
        serde_json::Number::from_f64(value).map(SpecValue::Number)
    }
}

impl From<bool> for SpecValue {
    fn from(value: bool) -> Self {
        SpecValue::Bool(value)
    }
}

impl From<i64> for SpecValue {
    fn from(value: i64) -> Self {
        SpecValue::Number(value.into())
    }
}

impl From<&str> for SpecValue {
    fn from(value: &str) -> Self {
        SpecValue::Text(value.to_string())
    }
}

impl From<String> for SpecValue {
    fn from(value: String) -> Self {
        SpecValue::Text(value)
    }
}

/// A catalog item (product).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub rating: f64,
    /// Specification entries; JSON `null` entries are dropped on load.
    #[serde(default, deserialize_with = "deserialize_specifications")]
    pub specifications: BTreeMap<String, SpecValue>,
}

impl Item {
    /// Create an item with only an id; other fields take their defaults.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            image_url: String::new(),
            description: String::new(),
            price: 0.0,
            rating: 0.0,
            specifications: BTreeMap::new(),
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_spec(mut self, key: impl Into<String>, value: impl Into<SpecValue>) -> Self {
        self.specifications.insert(key.into(), value.into());
        self
    }
}

fn deserialize_specifications<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, SpecValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<SpecValue>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect())
}

/// A comparison request as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompareRequest {
    /// Requested identifiers; may contain duplicates or empty strings.
    pub ids: Vec<String>,
    /// Optional field filter, in client order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl CompareRequest {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            fields: None,
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// The field filter when the client supplied a non-empty one.
    pub fn field_filter(&self) -> Option<&[String]> {
        self.fields.as_deref().filter(|f| !f.is_empty())
    }
}

/// How a field's winner is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    LowerIsBetter,
    HigherIsBetter,
    TrueIsBetter,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::LowerIsBetter => "lower_is_better",
            Metric::HigherIsBetter => "higher_is_better",
            Metric::TrueIsBetter => "true_is_better",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field comparison outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffField {
    /// Item id → extracted value (`None` when the item lacks the field).
    pub values: BTreeMap<String, Option<SpecValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
    /// Winning item ids, alphabetically sorted.
    pub best: Vec<String>,
}

/// The comparison payload returned to clients under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareResult {
    pub items: Vec<Item>,
    pub shared_fields: Vec<String>,
    pub diff: BTreeMap<String, DiffField>,
}

/// The policy that was applied to produce a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparePolicy {
    pub effective_mode: String,
    pub comparability_score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Metadata returned alongside a comparison result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Deduplicated request order.
    pub order: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_fields: Option<Vec<String>>,
    pub resolved_fields: Vec<String>,
    pub compare_policy: ComparePolicy,
    pub currency: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spec_value_numeric_coercion() {
        let int: SpecValue = serde_json::from_value(json!(500)).unwrap();
        let float: SpecValue = serde_json::from_value(json!(4.5)).unwrap();
        assert_eq!(int.as_f64(), Some(500.0));
        assert_eq!(float.as_f64(), Some(4.5));

        assert_eq!(SpecValue::from("12").as_f64(), None);
        assert_eq!(SpecValue::from(true).as_f64(), None);
        let nested: SpecValue = serde_json::from_value(json!({"value": 3})).unwrap();
        assert_eq!(nested.as_f64(), None);
    }

    #[test]
    fn test_spec_value_bool_coercion() {
        assert_eq!(SpecValue::from(true).as_bool(), Some(true));
        assert_eq!(SpecValue::from(1i64).as_bool(), None);
        assert_eq!(SpecValue::from("true").as_bool(), None);
    }

    #[test]
    fn test_spec_value_untagged_shapes() {
        let v: SpecValue = serde_json::from_value(json!({"value": 80, "unit": "g"})).unwrap();
        match v {
            SpecValue::Nested(map) => {
                assert_eq!(map.get("value"), Some(&SpecValue::from(80i64)));
                assert_eq!(map.get("unit"), Some(&SpecValue::from("g")));
            }
            other => panic!("Expected Nested, got {:?}", other),
        }
    }

    #[test]
    fn test_spec_value_nested_null_and_list() {
        let v: SpecValue = serde_json::from_value(json!({"value": 80, "unit": null})).unwrap();
        match &v {
            SpecValue::Nested(map) => {
                assert_eq!(map.get("value"), Some(&SpecValue::from(80i64)));
                assert_eq!(map.get("unit"), Some(&SpecValue::Null));
            }
            other => panic!("Expected Nested, got {:?}", other),
        }
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({"value": 80, "unit": null})
        );

        let list: SpecValue = serde_json::from_value(json!(["usb-c", 2, null])).unwrap();
        assert_eq!(
            list,
            SpecValue::List(vec![SpecValue::from("usb-c"), SpecValue::from(2i64), SpecValue::Null])
        );
        assert_eq!(list.as_f64(), None);
        assert_eq!(list.as_bool(), None);
    }

    #[test]
    fn test_integer_spec_keeps_integer_representation() {
        let v: SpecValue = serde_json::from_value(json!(500)).unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), "500");
    }

    #[test]
    fn test_item_drops_null_specifications() {
        let item: Item = serde_json::from_value(json!({
            "id": "p-1",
            "name": "Mouse",
            "price": 29.99,
            "rating": 4.1,
            "specifications": {"weight": 80, "color": null}
        }))
        .unwrap();
        assert_eq!(item.specifications.len(), 1);
        assert!(item.specifications.contains_key("weight"));
        assert!(!item.specifications.contains_key("color"));
    }

    #[test]
    fn test_item_missing_specifications() {
        let item: Item = serde_json::from_value(json!({"id": "p-2"})).unwrap();
        assert!(item.specifications.is_empty());
        assert_eq!(item.price, 0.0);
    }

    #[test]
    fn test_compare_request_field_filter() {
        let req = CompareRequest::new(["a", "b"]);
        assert!(req.field_filter().is_none());

        let req = CompareRequest::new(["a", "b"]).with_fields(Vec::<String>::new());
        assert!(req.field_filter().is_none());

        let req = CompareRequest::new(["a", "b"]).with_fields(["price"]);
        assert_eq!(req.field_filter(), Some(&["price".to_string()][..]));
    }

    #[test]
    fn test_metric_serialization() {
        assert_eq!(
            serde_json::to_string(&Metric::LowerIsBetter).unwrap(),
            "\"lower_is_better\""
        );
        assert_eq!(Metric::TrueIsBetter.to_string(), "true_is_better");
    }

    #[test]
    fn test_diff_field_omits_missing_metric() {
        let field = DiffField {
            values: BTreeMap::from([("a".to_string(), None)]),
            metric: None,
            best: Vec::new(),
        };
        let json = serde_json::to_value(&field).unwrap();
        assert!(json.get("metric").is_none());
        assert_eq!(json["values"]["a"], serde_json::Value::Null);
        assert_eq!(json["best"], json!([]));
    }
}
