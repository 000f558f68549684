//! Text rendering of host values
//!
//! Renders [`Value`] trees into the canonical text used inside parameter
//! traces. Rendering recurses through entities and collections; query
//! expressions are turned into FetchXML by the organization service.

pub mod value;
pub mod xml;

use eyre::{Context, Result};

use crate::host::OrganizationService;

pub use value::{ColumnSet, ConcurrencyBehavior, DecimalText, Entity, EntityReference, QueryExpression, Value};

/// Longest text field sent as-is; longer text is cut to one less than this
pub const MAX_TEXT_LENGTH: usize = 8192;

const ENTITY_INDENT: &str = "     ";

/// Cut text longer than [`MAX_TEXT_LENGTH`] characters down to `MAX_TEXT_LENGTH - 1`
pub fn truncate_text(text: String) -> String {
    if text.chars().count() > MAX_TEXT_LENGTH {
        text.chars().take(MAX_TEXT_LENGTH - 1).collect()
    } else {
        text
    }
}

/// Recursive value renderer
pub struct ValueFormatter<'a> {
    service: &'a dyn OrganizationService,
    decimal_separator: char,
}

impl<'a> ValueFormatter<'a> {
    pub fn new(service: &'a dyn OrganizationService) -> Self {
        Self {
            service,
            decimal_separator: '.',
        }
    }

    /// Separator used for currency amounts
    pub fn with_decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    /// Render a value to a new string
    pub fn format(&self, value: &Value) -> Result<String> {
        let mut out = String::new();
        self.append(&mut out, value)?;
        Ok(out)
    }

    /// Render a value onto `out`
    ///
    /// Only a failing query translation is an error; every variant has a
    /// rendering, including the unknown-type fallback.
    pub fn append(&self, out: &mut String, value: &Value) -> Result<()> {
        match value {
            Value::String(s) => push_quoted(out, s),
            Value::Int(n) | Value::OptionSetValue(n) => push_quoted(out, &n.to_string()),
            Value::Double(n) => push_quoted(out, &n.to_string()),
            Value::Decimal(d) => push_quoted(out, d.as_str()),
            Value::Boolean(b) => push_quoted(out, if *b { "True" } else { "False" }),
            Value::Guid(id) => push_quoted(out, &id.to_string()),
            Value::DateTime(dt) => push_quoted(out, &dt.format("%Y-%m-%d %H:%M:%S GMT%:z").to_string()),
            Value::EntityReference(r) => {
                out.push_str(&format!("Id: \"{}\", LogicalName: \"{}\"", r.id, r.logical_name));
            }
            Value::Entity(None) => out.push_str("NULL"),
            Value::Entity(Some(entity)) => self.append_entity(out, entity)?,
            Value::EntityCollection(entities) => {
                out.push('[');
                for entity in entities {
                    out.push('\n');
                    self.append_entity(out, entity)?;
                    out.push_str(", ");
                }
                if !entities.is_empty() {
                    out.truncate(out.len() - 2);
                }
                out.push(']');
            }
            Value::ColumnSet(columns) => append_columns(out, columns),
            Value::QueryExpression(query) => {
                let top = query.top_count.map(|t| t.to_string()).unwrap_or_default();
                out.push_str(&format!("EntityName: \"{}\", Top: \"{}\"", query.entity_name, top));
                out.push_str(", Columns:");
                append_columns(out, &query.column_set);
                out.push_str(", \n");
                let text = self
                    .service
                    .translate_query_to_text(query)
                    .context(format!("Failed to translate query on {}", query.entity_name))?;
                append_query_text(out, &text);
            }
            Value::FetchExpression(text) => append_query_text(out, text),
            Value::Money(amount) => push_quoted(out, &amount.with_separator(self.decimal_separator)),
            Value::ConcurrencyBehavior(behavior) => push_quoted(out, behavior.label()),
            Value::Null => append_undefined(out, "", ""),
            Value::Unknown { type_name, display } => append_undefined(out, type_name, display),
        }
        Ok(())
    }

    fn append_entity(&self, out: &mut String, entity: &Entity) -> Result<()> {
        out.push_str("\n{\n");
        out.push_str(&format!(
            "{tab}Id: {},\n{tab}LogicalName: {}",
            entity.id,
            entity.logical_name,
            tab = ENTITY_INDENT
        ));
        for (key, value) in &entity.attributes {
            out.push_str(&format!(",\n{}{}: ", ENTITY_INDENT, key));
            self.append(out, value)?;
        }
        out.push_str("\n}\n");
        Ok(())
    }
}

fn push_quoted(out: &mut String, text: &str) {
    out.push('"');
    out.push_str(&text.replace('"', "&quot;"));
    out.push('"');
}

fn append_columns(out: &mut String, columns: &ColumnSet) {
    out.push('[');
    if !columns.columns.is_empty() {
        let quoted: Vec<String> = columns.columns.iter().map(|c| format!("\"{}\"", c)).collect();
        out.push_str(&quoted.join(", "));
    }
    out.push_str(" ]");
}

fn append_query_text(out: &mut String, text: &str) {
    out.push_str("Query: \n");
    // malformed query text renders as nothing
    out.push_str(&xml::pretty_print(text).unwrap_or_default());
}

fn append_undefined(out: &mut String, type_name: &str, display: &str) {
    out.push_str(&format!("\"Undefined Type - {}, Value: {}\"", type_name, display));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalOrganizationService;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use uuid::Uuid;

    struct FailingService;

    impl OrganizationService for FailingService {
        fn translate_query_to_text(&self, _query: &QueryExpression) -> Result<String> {
            eyre::bail!("service unavailable")
        }

        fn platform_version(&self) -> Result<String> {
            eyre::bail!("service unavailable")
        }
    }

    struct GarbageService;

    impl OrganizationService for GarbageService {
        fn translate_query_to_text(&self, _query: &QueryExpression) -> Result<String> {
            Ok("<fetch><entity></fetch>".to_string())
        }

        fn platform_version(&self) -> Result<String> {
            Ok("9.2".to_string())
        }
    }

    fn render(value: &Value) -> String {
        let service = LocalOrganizationService::default();
        ValueFormatter::new(&service).format(value).unwrap()
    }

    fn decimal(text: &str) -> DecimalText {
        text.parse().unwrap()
    }

    fn account_id() -> Uuid {
        Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap()
    }

    #[test]
    fn test_scalars_are_quoted_and_escaped() {
        assert_eq!(render(&Value::from("say \"hi\"")), "\"say &quot;hi&quot;\"");
        assert_eq!(render(&Value::Int(42)), "\"42\"");
        assert_eq!(render(&Value::Double(56.0)), "\"56\"");
        assert_eq!(render(&Value::Decimal(decimal("1.250"))), "\"1.250\"");
        assert_eq!(render(&Value::Boolean(true)), "\"True\"");
        assert_eq!(render(&Value::Guid(account_id())), "\"11111111-1111-1111-1111-111111111111\"");
    }

    #[test]
    fn test_datetime() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let dt: DateTime<FixedOffset> = offset.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(render(&Value::DateTime(dt)), "\"2024-03-05 07:08:09 GMT+02:00\"");
    }

    #[test]
    fn test_entity_reference() {
        let value = Value::from(EntityReference::new("account", account_id()));
        assert_eq!(
            render(&value),
            "Id: \"11111111-1111-1111-1111-111111111111\", LogicalName: \"account\""
        );
    }

    #[test]
    fn test_entity_renders_nested_attributes() {
        let entity = Entity::new("account", account_id())
            .with_attribute("name", "Contoso")
            .with_attribute("primarycontactid", EntityReference::new("contact", Uuid::nil()));
        let expected = "\n{\n     Id: 11111111-1111-1111-1111-111111111111,\n     LogicalName: account,\n     name: \"Contoso\",\n     primarycontactid: Id: \"00000000-0000-0000-0000-000000000000\", LogicalName: \"contact\"\n}\n";
        assert_eq!(render(&Value::from(entity)), expected);
    }

    #[test]
    fn test_null_entity() {
        assert_eq!(render(&Value::Entity(None)), "NULL");
    }

    #[test]
    fn test_column_set() {
        assert_eq!(render(&Value::ColumnSet(ColumnSet::default())), "[ ]");
        assert_eq!(
            render(&Value::ColumnSet(ColumnSet::new(["name", "accountid"]))),
            "[\"name\", \"accountid\" ]"
        );
    }

    #[test]
    fn test_entity_collection() {
        assert_eq!(render(&Value::EntityCollection(vec![])), "[]");
        let collection = Value::EntityCollection(vec![
            Entity::new("account", account_id()),
            Entity::new("account", Uuid::nil()),
        ]);
        let rendered = render(&collection);
        assert!(rendered.starts_with("[\n\n{\n"));
        assert!(rendered.ends_with("\n}\n]"));
        assert_eq!(rendered.matches("LogicalName: account").count(), 2);
        assert_eq!(rendered.matches("}\n, \n").count(), 1);
    }

    #[test]
    fn test_query_expression() {
        let query = QueryExpression {
            entity_name: "account".to_string(),
            top_count: Some(5),
            column_set: ColumnSet::new(["name"]),
        };
        let expected = "EntityName: \"account\", Top: \"5\", Columns:[\"name\" ], \nQuery: \n<fetch top=\"5\">\n  <entity name=\"account\">\n    <attribute name=\"name\" />\n  </entity>\n</fetch>";
        assert_eq!(render(&Value::QueryExpression(query)), expected);
    }

    #[test]
    fn test_query_expression_without_top() {
        let query = QueryExpression {
            entity_name: "contact".to_string(),
            top_count: None,
            column_set: ColumnSet::default(),
        };
        assert!(render(&Value::QueryExpression(query)).starts_with("EntityName: \"contact\", Top: \"\", Columns:[ ], \n"));
    }

    #[test]
    fn test_malformed_query_text_renders_empty() {
        let query = QueryExpression {
            entity_name: "account".to_string(),
            top_count: None,
            column_set: ColumnSet::default(),
        };
        let rendered = ValueFormatter::new(&GarbageService).format(&Value::QueryExpression(query)).unwrap();
        assert!(rendered.ends_with("Query: \n"));
    }

    #[test]
    fn test_failing_translation_is_an_error() {
        let query = QueryExpression {
            entity_name: "account".to_string(),
            top_count: None,
            column_set: ColumnSet::default(),
        };
        assert!(ValueFormatter::new(&FailingService).format(&Value::QueryExpression(query)).is_err());
    }

    #[test]
    fn test_fetch_expression_skips_service() {
        let value = Value::FetchExpression("<fetch><entity name=\"account\" /></fetch>".to_string());
        let rendered = ValueFormatter::new(&FailingService).format(&value).unwrap();
        assert_eq!(rendered, "Query: \n<fetch>\n  <entity name=\"account\" />\n</fetch>");
    }

    #[test]
    fn test_option_money_concurrency() {
        assert_eq!(render(&Value::OptionSetValue(100000001)), "\"100000001\"");
        assert_eq!(render(&Value::Money(decimal("12.5"))), "\"12.5\"");
        assert_eq!(render(&Value::Money(decimal("100.0000"))), "\"100.0000\"");
        assert_eq!(
            render(&Value::Decimal(decimal("12345678901234567.89"))),
            "\"12345678901234567.89\""
        );
        assert_eq!(
            render(&Value::ConcurrencyBehavior(ConcurrencyBehavior::Default)),
            "\"Default\""
        );
        let service = LocalOrganizationService::default();
        let comma = ValueFormatter::new(&service).with_decimal_separator(',');
        assert_eq!(comma.format(&Value::Money(decimal("12.5"))).unwrap(), "\"12,5\"");
    }

    #[test]
    fn test_unknown_type_fallback() {
        let value = Value::Unknown {
            type_name: "Microsoft.Xrm.Sdk.AliasedValue".to_string(),
            display: "x".to_string(),
        };
        assert_eq!(render(&value), "\"Undefined Type - Microsoft.Xrm.Sdk.AliasedValue, Value: x\"");
        assert_eq!(render(&Value::Null), "\"Undefined Type - , Value: \"");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let entity = Entity::new("account", account_id())
            .with_attribute("revenue", Value::Money(decimal("10.00")))
            .with_attribute("parent", Entity::new("account", Uuid::nil()).with_attribute("name", "Parent"));
        let value = Value::EntityCollection(vec![entity.clone(), entity]);
        assert_eq!(render(&value), render(&value));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("a".repeat(9000)).chars().count(), 8191);
        assert_eq!(truncate_text("a".repeat(8192)).chars().count(), 8192);
        assert_eq!(truncate_text("short".to_string()), "short");
    }
}
