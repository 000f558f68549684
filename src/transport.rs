//! HTTP delivery of envelopes
//!
//! One agent (and its connection pool) is created per `Transport` and shared
//! by every logger that holds it.

use std::time::Duration;
use ureq::Agent;

use crate::host::TracingService;

/// Content type expected by the ingestion endpoint
pub const CONTENT_TYPE: &str = "application/x-json-stream";

/// Shared HTTP agent
pub struct Transport {
    agent: Agent,
}

impl Transport {
    /// Create a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: Agent::new_with_config(config),
        }
    }

    /// POST one envelope; `true` only for a 2xx response
    ///
    /// Failures are written to `tracer` and never returned as errors.
    pub fn deliver(&self, endpoint: &str, json: &str, tracer: &dyn TracingService) -> bool {
        match self.agent.post(endpoint).header("Content-Type", CONTENT_TYPE).send(json.as_bytes()) {
            Ok(response) if response.status().is_success() => {
                log::debug!("Delivered envelope to {} ({})", endpoint, response.status());
                true
            }
            Ok(response) => {
                let status = response.status();
                tracer.trace(&format!(
                    "ERROR: Unable to write to Application Insights with response: {}: {}: Message: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default(),
                    double_braces(json)
                ));
                log::warn!("Ingestion endpoint {} answered {}", endpoint, status);
                false
            }
            Err(e) => {
                tracer.trace_error(&double_braces(json), &e);
                log::warn!("HTTP request to {} failed: {}", endpoint, e);
                false
            }
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Escape braces so the payload survives format-string sinks
pub fn double_braces(json: &str) -> String {
    json.replace('{', "{{").replace('}', "}}")
}
