//! Execution history capture
//!
//! Walks the parent-context chain of a nested step and measures how long the
//! outermost operation has been running. Opt-in through
//! `captureExecutionHistory`; only nested steps (depth > 1) yield a history.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{OPERATION_TIME_FORMAT, mode_name, stage_name};
use crate::host::ExecutionContext;

/// One step of the parent chain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFrame {
    pub operation_id: String,
    pub impersonating_user_id: String,
    pub correlation_id: String,
    pub message: String,
    pub mode: String,
    pub depth: i32,
    pub entity_id: String,
    pub entity_name: String,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_correlation_id: Option<String>,
    pub operation_created_on: String,
}

impl ExecutionFrame {
    fn from_context(ctx: &ExecutionContext) -> Self {
        Self {
            operation_id: ctx.operation_id.to_string(),
            impersonating_user_id: ctx.user_id.to_string(),
            correlation_id: ctx.correlation_id.to_string(),
            message: ctx.message_name.clone(),
            mode: mode_name(ctx.mode).to_string(),
            depth: ctx.depth,
            entity_id: ctx.primary_entity_id.to_string(),
            entity_name: ctx.primary_entity_name.clone(),
            stage: stage_name(ctx.stage).to_string(),
            parent_correlation_id: ctx.parent.as_ref().map(|p| p.correlation_id.to_string()),
            operation_created_on: ctx.operation_created_on.format(OPERATION_TIME_FORMAT).to_string(),
        }
    }
}

/// Captured chain, outermost ancestor first
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionHistory {
    pub frames: Vec<ExecutionFrame>,
    pub duration_ms: f64,
}

/// Capture the history of `context` as seen at `now`
///
/// The started-at marker on `context` is set on the first call; later calls
/// measure from that marker instead of the root operation's creation time.
pub fn capture(context: &ExecutionContext, now: DateTime<Utc>) -> Option<ExecutionHistory> {
    let earlier = context.mark_started(now);
    if context.depth <= 1 {
        return None;
    }

    let mut stack = Vec::new();
    let mut root_created = context.operation_created_on;
    for ctx in context.ancestors() {
        stack.push(ExecutionFrame::from_context(ctx));
        root_created = ctx.operation_created_on;
    }
    stack.reverse();

    let span = now - earlier.unwrap_or(root_created);
    let duration_ms = span
        .num_microseconds()
        .map(|us| us as f64 / 1000.0)
        .unwrap_or_else(|| span.num_milliseconds() as f64);

    Some(ExecutionHistory {
        frames: stack,
        duration_ms,
    })
}
