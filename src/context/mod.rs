//! Context snapshot
//!
//! `EventProperties` is captured once per logger from the execution context
//! and attached as custom properties to every envelope the logger builds.

pub mod history;

use serde::Serialize;

use crate::format::{truncate_text, ValueFormatter};
use crate::host::{ExecutionContext, OrganizationService, TracingService};

pub use history::{ExecutionFrame, ExecutionHistory};

/// Timestamp layout for operation creation times
pub const OPERATION_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Which context-detail paths a logger follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    Plugin { stage: i32 },
    Workflow { category: i32 },
    /// Both markers given; plug-in details are added first, then workflow details
    Both { stage: i32, category: i32 },
}

impl ContextSource {
    /// Pick the paths from the markers passed at construction
    pub fn from_markers(plugin_stage: Option<i32>, workflow_category: Option<i32>) -> eyre::Result<Self> {
        match (plugin_stage, workflow_category) {
            (Some(stage), Some(category)) => Ok(ContextSource::Both { stage, category }),
            (Some(stage), None) => Ok(ContextSource::Plugin { stage }),
            (None, Some(category)) => Ok(ContextSource::Workflow { category }),
            (None, None) => eyre::bail!("Either Plug-in Stage or Workflow Category must be passed to the logger"),
        }
    }

    pub fn plugin_stage(&self) -> Option<i32> {
        match self {
            ContextSource::Plugin { stage } | ContextSource::Both { stage, .. } => Some(*stage),
            ContextSource::Workflow { .. } => None,
        }
    }

    pub fn workflow_category(&self) -> Option<i32> {
        match self {
            ContextSource::Workflow { category } | ContextSource::Both { category, .. } => Some(*category),
            ContextSource::Plugin { .. } => None,
        }
    }
}

/// Snapshot of the ambient execution context
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impersonating_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_parameters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_parameters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_created_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ExecutionFrame>>,
    /// Milliseconds since the root operation started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Inputs for [`EventProperties::collect`]
pub struct Collector<'a> {
    pub service: &'a dyn OrganizationService,
    pub tracer: &'a dyn TracingService,
    pub source: ContextSource,
    pub trace_parameters: bool,
    pub decimal_separator: char,
}

impl EventProperties {
    /// Capture the snapshot for one logger
    pub fn collect(collector: &Collector<'_>, context: &ExecutionContext) -> Self {
        let mut props = EventProperties {
            entity_name: Some(context.primary_entity_name.clone()),
            entity_id: Some(context.primary_entity_id.to_string()),
            org_name: Some(context.organization_name.clone()),
            ..Default::default()
        };

        match collector.service.platform_version() {
            Ok(version) => props.org_version = Some(version),
            Err(e) => collector.tracer.trace_error("ERROR: Retrieving platform version", &e),
        }

        if collector.trace_parameters {
            props.add_execution_details(collector, context);
        }

        props
    }

    fn add_execution_details(&mut self, collector: &Collector<'_>, context: &ExecutionContext) {
        self.impersonating_user_id = Some(context.user_id.to_string());
        self.correlation_id = Some(context.correlation_id.to_string());
        self.message = Some(context.message_name.clone());
        self.mode = Some(mode_name(context.mode).to_string());
        self.depth = Some(context.depth);
        self.input_parameters = trace_parameters(collector, context, Direction::Input);
        self.output_parameters = trace_parameters(collector, context, Direction::Output);
        self.operation_id = Some(context.operation_id.to_string());
        self.operation_created_on = Some(context.operation_created_on.format(OPERATION_TIME_FORMAT).to_string());
        self.organization_id = Some(context.organization_id.to_string());

        if let Some(stage) = collector.source.plugin_stage() {
            self.source = Some("Plug-in".to_string());
            self.stage = Some(stage_name(stage).to_string());
            let parent = context
                .parent
                .as_ref()
                .map(|p| p.correlation_id)
                .unwrap_or(context.correlation_id);
            self.parent_correlation_id = Some(parent.to_string());
        }
        if let Some(category) = collector.source.workflow_category() {
            self.source = Some("Workflow".to_string());
            self.workflow_category = Some(workflow_category_name(category).to_string());
        }
    }

    /// Attach a captured history and its duration
    pub fn set_history(&mut self, history: ExecutionHistory) {
        self.duration = Some(history.duration_ms.to_string());
        self.history = Some(history.frames);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(&self) -> &'static str {
        match self {
            Direction::Input => "Input",
            Direction::Output => "Output",
        }
    }
}

/// Render every parameter of one direction, one per line
///
/// `None` when there are no parameters or when rendering fails; failures are
/// reported to the tracing service.
pub fn trace_parameters(collector: &Collector<'_>, context: &ExecutionContext, direction: Direction) -> Option<String> {
    let parameters = match direction {
        Direction::Input => &context.input_parameters,
        Direction::Output => &context.output_parameters,
    };
    if parameters.is_empty() {
        return None;
    }

    let formatter = ValueFormatter::new(collector.service).with_decimal_separator(collector.decimal_separator);
    let mut lines = Vec::with_capacity(parameters.len());
    for (key, value) in parameters {
        let mut line = format!("{} Parameter({}): {}: ", direction.label(), value.type_name(), key);
        if let Err(e) = formatter.append(&mut line, value) {
            collector.tracer.trace(&format!("ERROR: Tracing parameters: {}", e));
            log::warn!("Parameter trace failed on {}: {:#}", key, e);
            return None;
        }
        lines.push(line);
    }

    Some(truncate_text(lines.join("\n")))
}

pub fn mode_name(mode: i32) -> &'static str {
    match mode {
        0 => "Synchronous",
        1 => "Asynchronous",
        _ => "Unknown",
    }
}

pub fn stage_name(stage: i32) -> &'static str {
    match stage {
        10 => "Pre-validation",
        20 => "Pre-operation",
        30 => "Main Operation",
        40 => "Post-operation",
        _ => "Unknown",
    }
}

pub fn workflow_category_name(category: i32) -> &'static str {
    match category {
        0 => "Workflow",
        1 => "Dialog",
        2 => "Business Rule",
        3 => "Action",
        4 => "Business Process Flow",
        _ => "Unknown",
    }
}
