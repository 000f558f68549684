//! Host platform boundary
//!
//! Everything the logger consumes from the hosting plug-in or workflow:
//! the execution context, the organization service and the tracing service.

use chrono::{DateTime, Utc};
use eyre::Result;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

use crate::format::{QueryExpression, Value};

/// Ambient execution context of one plug-in or workflow step
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutionContext {
    pub user_id: Uuid,
    pub initiating_user_id: Uuid,
    pub correlation_id: Uuid,
    pub operation_id: Uuid,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub message_name: String,
    pub mode: i32,
    pub depth: i32,
    pub stage: i32,
    pub operation_created_on: DateTime<Utc>,
    pub primary_entity_name: String,
    pub primary_entity_id: Uuid,
    pub input_parameters: IndexMap<String, Value>,
    pub output_parameters: IndexMap<String, Value>,
    /// Context of the step that triggered this one
    pub parent: Option<Box<ExecutionContext>>,
    /// Started-at marker shared by every logger on this context
    #[serde(skip)]
    pub started_on: OnceCell<DateTime<Utc>>,
}

impl ExecutionContext {
    /// This context followed by each ancestor, innermost first
    pub fn ancestors(&self) -> impl Iterator<Item = &ExecutionContext> {
        std::iter::successors(Some(self), |ctx| ctx.parent.as_deref())
    }

    /// Record `now` as the started-at marker unless one already exists
    ///
    /// Returns the earlier marker when another writer got there first.
    pub fn mark_started(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut first = false;
        let marked = *self.started_on.get_or_init(|| {
            first = true;
            now
        });
        if first { None } else { Some(marked) }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_on.get().copied()
    }
}

/// Data services offered by the host
pub trait OrganizationService {
    /// Convert a structured query into FetchXML
    fn translate_query_to_text(&self, query: &QueryExpression) -> Result<String>;

    /// Version string of the platform
    fn platform_version(&self) -> Result<String>;
}

/// Organization service that answers locally without a server round trip
#[derive(Debug, Clone)]
pub struct LocalOrganizationService {
    pub version: String,
}

impl Default for LocalOrganizationService {
    fn default() -> Self {
        Self {
            version: "9.2.0.0".to_string(),
        }
    }
}

impl OrganizationService for LocalOrganizationService {
    fn translate_query_to_text(&self, query: &QueryExpression) -> Result<String> {
        let mut xml = match query.top_count {
            Some(top) => format!("<fetch top=\"{}\">", top),
            None => "<fetch>".to_string(),
        };
        xml.push_str(&format!("<entity name=\"{}\">", query.entity_name));
        if query.column_set.columns.is_empty() {
            xml.push_str("<all-attributes />");
        }
        for column in &query.column_set.columns {
            xml.push_str(&format!("<attribute name=\"{}\" />", column));
        }
        xml.push_str("</entity></fetch>");
        Ok(xml)
    }

    fn platform_version(&self) -> Result<String> {
        Ok(self.version.clone())
    }
}

/// Diagnostic sink; writes must never fail
pub trait TracingService: Send + Sync {
    fn trace(&self, message: &str);

    fn trace_error(&self, message: &str, error: &dyn fmt::Display) {
        self.trace(&format!("{}: {}", message, error));
    }
}

/// Tracing service that forwards into the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracingService;

impl TracingService for LogTracingService {
    fn trace(&self, message: &str) {
        log::info!("{}", message);
    }

    fn trace_error(&self, message: &str, error: &dyn fmt::Display) {
        log::error!("{}: {}", message, error);
    }
}

/// Tracing service that keeps every entry in memory
#[derive(Debug, Default)]
pub struct MemoryTracingService {
    entries: Mutex<Vec<String>>,
}

impl MemoryTracingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl TracingService for MemoryTracingService {
    fn trace(&self, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(message.to_string());
        }
    }
}
