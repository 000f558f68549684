//! Ingestion envelopes
//!
//! Each `build_*` call produces the JSON text of one envelope:
//! `{name, time, iKey, tags, data: {baseType, baseData}}`.

pub mod data;
pub mod exception;

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;

use crate::context::EventProperties;
use crate::sampling::Category;

pub use data::{DataPoint, DataPointKind, Dependency, SeverityLevel};
pub use exception::ExceptionInfo;

use data::{EventData, ExceptionData, MessageData, MetricData, RemoteDependencyData, SCHEMA_VERSION};

/// Placeholder emitted for event measurements before injection
pub const MEASUREMENTS_PLACEHOLDER: &str = "\"measurements\":null";

/// Operation name attached to metric envelopes
pub const METRIC_OPERATION_NAME: &str = "xrmEvent";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T: Serialize> {
    pub name: String,
    pub time: String,
    pub i_key: String,
    pub tags: Tags,
    pub data: Data<T>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Tags {
    #[serde(rename = "ai.cloud.roleInstance", skip_serializing_if = "Option::is_none")]
    pub role_instance: Option<String>,
    #[serde(rename = "ai.operation.name", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(rename = "ai.operation.id", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(rename = "ai.user.authUserId", skip_serializing_if = "Option::is_none")]
    pub authenticated_user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Data<T: Serialize> {
    pub base_type: &'static str,
    pub base_data: T,
}

/// ISO-8601 UTC with seven fractional digits
pub fn format_time(time: DateTime<Utc>) -> String {
    format!(
        "{}.{:07}Z",
        time.format("%Y-%m-%dT%H:%M:%S"),
        time.timestamp_subsec_nanos() / 100
    )
}

/// Replace the measurements placeholder with a literal object
///
/// `None` leaves the placeholder in place.
pub fn inject_measurements(json: &str, measurements: Option<&IndexMap<String, f64>>) -> String {
    let Some(measurements) = measurements else {
        return json.to_string();
    };

    let pairs: Vec<String> = measurements
        .iter()
        .map(|(key, value)| {
            let key = serde_json::to_string(key).unwrap_or_else(|_| format!("\"{}\"", key));
            format!("{}: {}", key, value)
        })
        .collect();
    let replacement = format!("\"measurements\":{{{}}}", pairs.join(", "));

    json.replace(MEASUREMENTS_PLACEHOLDER, &replacement)
}

/// Builds envelopes for one logger
pub struct EnvelopeBuilder<'a> {
    instrumentation_key: &'a str,
    authenticated_user_id: Option<&'a str>,
    properties: &'a EventProperties,
}

impl<'a> EnvelopeBuilder<'a> {
    pub fn new(
        instrumentation_key: &'a str,
        authenticated_user_id: Option<&'a str>,
        properties: &'a EventProperties,
    ) -> Self {
        Self {
            instrumentation_key,
            authenticated_user_id,
            properties,
        }
    }

    fn envelope<T: Serialize>(&self, category: Category, time: DateTime<Utc>, tags: Tags, base_data: T) -> Envelope<T> {
        Envelope {
            name: format!(
                "Microsoft.ApplicationInsights.{}.{}",
                self.instrumentation_key,
                category.routing_name()
            ),
            time: format_time(time),
            i_key: self.instrumentation_key.to_string(),
            tags: Tags {
                authenticated_user_id: self.authenticated_user_id.map(str::to_string),
                ..tags
            },
            data: Data {
                base_type: category.base_type(),
                base_data,
            },
        }
    }

    fn serialize<T: Serialize>(category: Category, envelope: &Envelope<T>) -> Result<String> {
        serde_json::to_string(envelope).context(format!("Failed to serialize {} envelope", category))
    }

    pub fn event(
        &self,
        time: DateTime<Utc>,
        name: &str,
        measurements: Option<&IndexMap<String, f64>>,
        operation_name: Option<&str>,
        operation_id: Option<&str>,
    ) -> Result<String> {
        let tags = Tags {
            operation_name: operation_name.map(str::to_string),
            operation_id: operation_id.map(str::to_string),
            ..Default::default()
        };
        let envelope = self.envelope(Category::Event, time, tags, EventData::new(self.properties, name));
        let json = Self::serialize(Category::Event, &envelope)?;
        Ok(inject_measurements(&json, measurements))
    }

    pub fn metric(&self, time: DateTime<Utc>, point: DataPoint) -> Result<String> {
        let tags = Tags {
            operation_name: Some(METRIC_OPERATION_NAME.to_string()),
            operation_id: self.properties.operation_id.clone(),
            ..Default::default()
        };
        let base_data = MetricData {
            ver: SCHEMA_VERSION,
            metrics: vec![point],
            properties: self.properties,
        };
        let envelope = self.envelope(Category::Metric, time, tags, base_data);
        Self::serialize(Category::Metric, &envelope)
    }

    pub fn exception(&self, time: DateTime<Utc>, exception: &ExceptionInfo, severity_level: SeverityLevel) -> Result<String> {
        let base_data = ExceptionData {
            ver: SCHEMA_VERSION,
            exceptions: vec![exception.to_details()],
            severity_level,
            properties: self.properties,
        };
        let envelope = self.envelope(Category::Exception, time, Tags::default(), base_data);
        Self::serialize(Category::Exception, &envelope)
    }

    pub fn trace(&self, time: DateTime<Utc>, message: &str, severity_level: SeverityLevel) -> Result<String> {
        let base_data = MessageData::new(self.properties, message, severity_level);
        let envelope = self.envelope(Category::Trace, time, Tags::default(), base_data);
        Self::serialize(Category::Trace, &envelope)
    }

    pub fn dependency(&self, time: DateTime<Utc>, dependency: &Dependency) -> Result<String> {
        let base_data = RemoteDependencyData::new(self.properties, dependency);
        let tags = Tags {
            role_instance: Some(String::new()),
            ..Default::default()
        };
        let envelope = self.envelope(Category::Dependency, time, tags, base_data);
        Self::serialize(Category::Dependency, &envelope)
    }
}
