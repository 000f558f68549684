//! Category payloads carried as `baseData`

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::context::EventProperties;
use crate::format::truncate_text;

/// Schema version sent with every payload
pub const SCHEMA_VERSION: i32 = 2;

/// Longest metric name accepted by ingestion
pub const MAX_METRIC_NAME_LENGTH: usize = 512;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum SeverityLevel {
    Verbose,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
}

impl SeverityLevel {
    /// Parse a level name or number, falling back to `Information`
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "verbose" | "0" => SeverityLevel::Verbose,
            "information" | "info" | "1" => SeverityLevel::Information,
            "warning" | "warn" | "2" => SeverityLevel::Warning,
            "error" | "3" => SeverityLevel::Error,
            "critical" | "4" => SeverityLevel::Critical,
            _ => SeverityLevel::Information,
        }
    }
}

/// Custom event
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData<'a> {
    pub ver: i32,
    pub name: String,
    pub properties: &'a EventProperties,
    /// Always serialized as `null`; filled in textually afterwards
    pub measurements: Option<BTreeMap<String, f64>>,
}

impl<'a> EventData<'a> {
    pub fn new(properties: &'a EventProperties, name: &str) -> Self {
        Self {
            ver: SCHEMA_VERSION,
            name: truncate_text(name.to_string()),
            properties,
            measurements: None,
        }
    }
}

/// Trace message
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData<'a> {
    pub ver: i32,
    pub message: String,
    pub severity_level: SeverityLevel,
    pub properties: &'a EventProperties,
}

impl<'a> MessageData<'a> {
    pub fn new(properties: &'a EventProperties, message: &str, severity_level: SeverityLevel) -> Self {
        Self {
            ver: SCHEMA_VERSION,
            message: truncate_text(message.to_string()),
            severity_level,
            properties,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPointKind {
    Measurement = 0,
    Aggregation = 1,
}

impl Serialize for DataPointKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// One metric sample or aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub name: String,
    pub value: f64,
    pub count: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub kind: DataPointKind,
}

impl DataPoint {
    /// Missing count means a single measurement; min and max default to the value
    pub fn new(name: &str, value: f64, count: Option<f64>, min: Option<f64>, max: Option<f64>, std_dev: Option<f64>) -> Self {
        let name = if name.chars().count() > MAX_METRIC_NAME_LENGTH {
            name.chars().take(MAX_METRIC_NAME_LENGTH - 1).collect()
        } else {
            name.to_string()
        };
        let count = count.unwrap_or(1.0);
        let kind = if count == 1.0 {
            DataPointKind::Measurement
        } else {
            DataPointKind::Aggregation
        };
        Self {
            name,
            value,
            count,
            min: min.unwrap_or(value),
            max: max.unwrap_or(value),
            std_dev: std_dev.unwrap_or(0.0),
            kind,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricData<'a> {
    pub ver: i32,
    pub metrics: Vec<DataPoint>,
    pub properties: &'a EventProperties,
}

/// One parsed stack frame
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub level: u32,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub type_name: String,
    pub message: String,
    pub has_full_stack: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_stack: Option<Vec<StackFrame>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionData<'a> {
    pub ver: i32,
    pub exceptions: Vec<ExceptionDetails>,
    pub severity_level: SeverityLevel,
    pub properties: &'a EventProperties,
}

/// Outbound call made by the host
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub name: String,
    pub method: Option<String>,
    pub dependency_type: String,
    pub duration_ms: u64,
    pub result_code: Option<i32>,
    pub success: bool,
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDependencyData<'a> {
    pub ver: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub dependency_type: String,
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_code: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub properties: &'a EventProperties,
}

impl<'a> RemoteDependencyData<'a> {
    pub fn new(properties: &'a EventProperties, dependency: &Dependency) -> Self {
        // the method is only meaningful next to a URL
        let name = match &dependency.method {
            Some(method) if is_absolute_url(&dependency.name) => {
                format!("{} {}", method.to_uppercase(), dependency.name)
            }
            _ => dependency.name.clone(),
        };
        Self {
            ver: SCHEMA_VERSION,
            name: truncate_text(name),
            dependency_type: dependency.dependency_type.clone(),
            duration: format_duration(dependency.duration_ms),
            result_code: dependency.result_code.map(|c| c.to_string()),
            success: dependency.success,
            data: dependency.data.clone().map(truncate_text),
            properties,
        }
    }
}

fn is_absolute_url(name: &str) -> bool {
    name.starts_with("http://") || name.starts_with("https://")
}

/// `d.hh:mm:ss.fffffff`
pub fn format_duration(duration_ms: u64) -> String {
    let total_secs = duration_ms / 1000;
    let ticks = (duration_ms % 1000) * 10_000;
    format!(
        "{}.{:02}:{:02}:{:02}.{:07}",
        total_secs / 86_400,
        (total_secs / 3600) % 24,
        (total_secs / 60) % 60,
        total_secs % 60,
        ticks
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_kind_defaults_to_measurement() {
        let point = DataPoint::new("M", 10.0, None, None, None, None);
        assert_eq!(point.count, 1.0);
        assert_eq!(point.kind, DataPointKind::Measurement);
        assert_eq!(point.min, 10.0);
        assert_eq!(point.max, 10.0);
        assert_eq!(point.std_dev, 0.0);
    }

    #[test]
    fn test_metric_kind_aggregation() {
        let point = DataPoint::new("M", 10.0, Some(5.0), Some(1.0), Some(20.0), Some(2.5));
        assert_eq!(point.kind, DataPointKind::Aggregation);
        assert_eq!(point.min, 1.0);
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["kind"], 1);
        assert_eq!(json["stdDev"], 2.5);
    }

    #[test]
    fn test_metric_name_capped() {
        let point = DataPoint::new(&"n".repeat(600), 1.0, None, None, None, None);
        assert_eq!(point.name.len(), 511);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0.00:00:00.0000000");
        assert_eq!(format_duration(1500), "0.00:00:01.5000000");
        assert_eq!(format_duration(90_061_001), "1.01:01:01.0010000");
    }

    #[test]
    fn test_dependency_method_only_with_url() {
        let props = EventProperties::default();
        let mut dependency = Dependency {
            name: "https://api.example.com/orders".to_string(),
            method: Some("post".to_string()),
            dependency_type: "HTTP".to_string(),
            duration_ms: 120,
            result_code: Some(201),
            success: true,
            data: None,
        };
        let data = RemoteDependencyData::new(&props, &dependency);
        assert_eq!(data.name, "POST https://api.example.com/orders");
        assert_eq!(data.result_code.as_deref(), Some("201"));

        dependency.name = "sql-orders".to_string();
        assert_eq!(RemoteDependencyData::new(&props, &dependency).name, "sql-orders");
    }

    #[test]
    fn test_severity_parse_lenient() {
        assert_eq!(SeverityLevel::parse_lenient("Warning"), SeverityLevel::Warning);
        assert_eq!(SeverityLevel::parse_lenient("4"), SeverityLevel::Critical);
        assert_eq!(SeverityLevel::parse_lenient("nonsense"), SeverityLevel::Information);
    }

    #[test]
    fn test_trace_message_truncated() {
        let props = EventProperties::default();
        let data = MessageData::new(&props, &"m".repeat(10_000), SeverityLevel::Error);
        assert_eq!(data.message.chars().count(), 8191);
    }
}
