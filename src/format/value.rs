//! Host value model
//!
//! Values arrive from the host tagged with their runtime type. Each variant
//! maps to exactly one rendering rule in [`super::ValueFormatter`].

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use lazy_regex::regex_is_match;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A host-supplied value
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    String(String),
    Int(i32),
    Double(f64),
    Decimal(DecimalText),
    Boolean(bool),
    Guid(Uuid),
    DateTime(DateTime<FixedOffset>),
    EntityReference(EntityReference),
    Entity(Option<Entity>),
    EntityCollection(Vec<Entity>),
    ColumnSet(ColumnSet),
    QueryExpression(QueryExpression),
    /// Query already expressed as FetchXML text
    FetchExpression(String),
    OptionSetValue(i32),
    Money(DecimalText),
    ConcurrencyBehavior(ConcurrencyBehavior),
    /// Anything the formatter has no rule for
    Unknown { type_name: String, display: String },
}

impl Value {
    /// Full runtime type name shown in parameter traces
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "",
            Value::String(_) => "System.String",
            Value::Int(_) => "System.Int32",
            Value::Double(_) => "System.Double",
            Value::Decimal(_) => "System.Decimal",
            Value::Boolean(_) => "System.Boolean",
            Value::Guid(_) => "System.Guid",
            Value::DateTime(_) => "System.DateTime",
            Value::EntityReference(_) => "Microsoft.Xrm.Sdk.EntityReference",
            Value::Entity(_) => "Microsoft.Xrm.Sdk.Entity",
            Value::EntityCollection(_) => "Microsoft.Xrm.Sdk.EntityCollection",
            Value::ColumnSet(_) => "Microsoft.Xrm.Sdk.Query.ColumnSet",
            Value::QueryExpression(_) => "Microsoft.Xrm.Sdk.Query.QueryExpression",
            Value::FetchExpression(_) => "Microsoft.Xrm.Sdk.Query.FetchExpression",
            Value::OptionSetValue(_) => "Microsoft.Xrm.Sdk.OptionSetValue",
            Value::Money(_) => "Microsoft.Xrm.Sdk.Money",
            Value::ConcurrencyBehavior(_) => "Microsoft.Xrm.Sdk.ConcurrencyBehavior",
            Value::Unknown { type_name, .. } => type_name,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Guid(id)
    }
}

impl From<EntityReference> for Value {
    fn from(r: EntityReference) -> Self {
        Value::EntityReference(r)
    }
}

impl From<Entity> for Value {
    fn from(e: Entity) -> Self {
        Value::Entity(Some(e))
    }
}

/// Decimal kept as the host wrote it, so scale and precision survive
///
/// Accepts `-?digits[.digits]`. Deserializes from a JSON string or number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DecimalText(String);

impl DecimalText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The text with `.` replaced by `separator`
    pub fn with_separator(&self, separator: char) -> String {
        if separator == '.' {
            self.0.clone()
        } else {
            self.0.replace('.', &separator.to_string())
        }
    }
}

impl FromStr for DecimalText {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if !regex_is_match!(r"^-?\d+(\.\d+)?$", text) {
            eyre::bail!("'{}' is not a decimal number", s);
        }
        Ok(Self(text.to_string()))
    }
}

impl fmt::Display for DecimalText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DecimalText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Pointer to a record by id and logical name
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub id: Uuid,
    pub logical_name: String,
}

impl EntityReference {
    pub fn new(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            id,
            logical_name: logical_name.into(),
        }
    }
}

/// A record with an ordered attribute map
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: Uuid,
    pub logical_name: String,
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
}

impl Entity {
    pub fn new(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            id,
            logical_name: logical_name.into(),
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Column projection of a query
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSet {
    #[serde(default)]
    pub columns: Vec<String>,
}

impl ColumnSet {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Structured query; its text form comes from the organization service
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExpression {
    pub entity_name: String,
    #[serde(default)]
    pub top_count: Option<i32>,
    #[serde(default)]
    pub column_set: ColumnSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConcurrencyBehavior {
    Default,
    IfRowVersionMatches,
    AlwaysOverwrite,
}

impl ConcurrencyBehavior {
    pub fn label(&self) -> &'static str {
        match self {
            ConcurrencyBehavior::Default => "Default",
            ConcurrencyBehavior::IfRowVersionMatches => "IfRowVersionMatches",
            ConcurrencyBehavior::AlwaysOverwrite => "AlwaysOverwrite",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::from("x").type_name(), "System.String");
        assert_eq!(Value::from(5).type_name(), "System.Int32");
        assert_eq!(Value::Entity(None).type_name(), "Microsoft.Xrm.Sdk.Entity");
        assert_eq!(
            Value::QueryExpression(QueryExpression {
                entity_name: "account".to_string(),
                top_count: None,
                column_set: ColumnSet::default(),
            })
            .type_name(),
            "Microsoft.Xrm.Sdk.Query.QueryExpression"
        );
        assert_eq!(Value::Null.type_name(), "");
        let unknown = Value::Unknown {
            type_name: "Custom.Type".to_string(),
            display: "v".to_string(),
        };
        assert_eq!(unknown.type_name(), "Custom.Type");
    }

    #[test]
    fn test_value_from_json() {
        let json = r#"{"type":"EntityReference","value":{"id":"11111111-1111-1111-1111-111111111111","logicalName":"account"}}"#;
        let value: Value = serde_json::from_str(json).expect("parse");
        match value {
            Value::EntityReference(r) => assert_eq!(r.logical_name, "account"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_null_entity_from_json() {
        let value: Value = serde_json::from_str(r#"{"type":"Entity","value":null}"#).expect("parse");
        assert_eq!(value, Value::Entity(None));
    }

    #[test]
    fn test_entity_attributes_keep_order() {
        let entity = Entity::new("contact", Uuid::nil())
            .with_attribute("lastname", "Smith")
            .with_attribute("firstname", "Jo");
        let keys: Vec<&String> = entity.attributes.keys().collect();
        assert_eq!(keys, vec!["lastname", "firstname"]);
    }

    #[test]
    fn test_decimal_text_keeps_scale() {
        let amount: DecimalText = "100.0000".parse().unwrap();
        assert_eq!(amount.as_str(), "100.0000");
        assert_eq!(amount.with_separator(','), "100,0000");

        let big: DecimalText = "12345678901234567.89".parse().unwrap();
        assert_eq!(big.to_string(), "12345678901234567.89");
    }

    #[test]
    fn test_decimal_text_rejects_garbage() {
        assert!("12.5.1".parse::<DecimalText>().is_err());
        assert!("abc".parse::<DecimalText>().is_err());
        assert!("".parse::<DecimalText>().is_err());
    }

    #[test]
    fn test_money_from_json_string_or_number() {
        let value: Value = serde_json::from_str(r#"{"type":"Money","value":"100.0000"}"#).expect("parse");
        assert_eq!(value, Value::Money("100.0000".parse().unwrap()));

        let value: Value = serde_json::from_str(r#"{"type":"Decimal","value":-3}"#).expect("parse");
        assert_eq!(value, Value::Decimal("-3".parse().unwrap()));

        assert!(serde_json::from_str::<Value>(r#"{"type":"Money","value":"ten"}"#).is_err());
    }
}
