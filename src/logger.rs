//! Telemetry logger
//!
//! One `InsightsLogger` is built per unit of work. Every `write_*` call is
//! gated by the sampler, turned into an envelope and posted synchronously.
//! The calls return `true` when nothing went wrong, which includes events
//! skipped by configuration or sampling.

use chrono::{DateTime, Utc};
use eyre::Result;
use indexmap::IndexMap;
use std::sync::Arc;

use crate::config::LoggerConfig;
use crate::context::{history, Collector, ContextSource, EventProperties};
use crate::envelope::{DataPoint, Dependency, EnvelopeBuilder, ExceptionInfo, SeverityLevel};
use crate::host::{ExecutionContext, OrganizationService, TracingService};
use crate::sampling::{Category, Sampler};
use crate::transport::{double_braces, Transport};

/// Metric written when execution history is captured
pub const BACKEND_DURATION_METRIC: &str = "BackendDuration";

pub struct InsightsLogger {
    instrumentation_key: String,
    endpoint_url: String,
    enable_debug_trace: bool,
    authenticated_user_id: String,
    sampler: Sampler,
    transport: Arc<Transport>,
    tracer: Arc<dyn TracingService>,
    event_properties: EventProperties,
}

impl InsightsLogger {
    /// Build a logger for the current plug-in or workflow step
    ///
    /// Fails only when neither a plug-in stage nor a workflow category is given.
    pub fn new(
        config: &LoggerConfig,
        service: &dyn OrganizationService,
        tracer: Arc<dyn TracingService>,
        transport: Arc<Transport>,
        context: &ExecutionContext,
        plugin_stage: Option<i32>,
        workflow_category: Option<i32>,
    ) -> Result<Self> {
        let source = ContextSource::from_markers(plugin_stage, workflow_category)?;

        let collector = Collector {
            service,
            tracer: tracer.as_ref(),
            source,
            trace_parameters: !config.disable_context_parameter_tracking,
            decimal_separator: config.decimal_separator,
        };
        let mut event_properties = EventProperties::collect(&collector, context);

        let mut backend_duration = None;
        if config.capture_execution_history {
            if let Some(captured) = history::capture(context, Utc::now()) {
                backend_duration = Some(captured.duration_ms);
                event_properties.set_history(captured);
            }
        }

        let logger = Self {
            instrumentation_key: config.instrumentation_key.clone(),
            endpoint_url: config.endpoint_url.clone(),
            enable_debug_trace: config.enable_debug_trace,
            authenticated_user_id: context.initiating_user_id.to_string(),
            sampler: Sampler::new(config),
            transport,
            tracer,
            event_properties,
        };

        if let Some(duration_ms) = backend_duration {
            logger.write_metric(BACKEND_DURATION_METRIC, duration_ms, None);
        }

        log::debug!(
            "Logger ready for {} on {} ({:?})",
            context.message_name,
            context.primary_entity_name,
            source
        );
        Ok(logger)
    }

    /// Build a logger from the host's setup JSON
    pub fn from_setup_json(
        setup_json: &str,
        service: &dyn OrganizationService,
        tracer: Arc<dyn TracingService>,
        transport: Arc<Transport>,
        context: &ExecutionContext,
        plugin_stage: Option<i32>,
        workflow_category: Option<i32>,
    ) -> Result<Self> {
        let config = LoggerConfig::from_json(setup_json)?;
        Self::new(&config, service, tracer, transport, context, plugin_stage, workflow_category)
    }

    pub fn event_properties(&self) -> &EventProperties {
        &self.event_properties
    }

    pub fn write_event(
        &self,
        name: &str,
        measurements: Option<&IndexMap<String, f64>>,
        timestamp: Option<DateTime<Utc>>,
        operation_name: Option<&str>,
        operation_id: Option<&str>,
    ) -> bool {
        self.emit(Category::Event, |builder| {
            builder.event(
                timestamp.unwrap_or_else(Utc::now),
                name,
                measurements,
                operation_name,
                operation_id,
            )
        })
    }

    /// Single measurement or, with `count`, an aggregate
    pub fn write_metric(&self, name: &str, value: f64, count: Option<f64>) -> bool {
        self.write_metric_point(DataPoint::new(name, value, count, None, None, None), None)
    }

    pub fn write_metric_point(&self, point: DataPoint, timestamp: Option<DateTime<Utc>>) -> bool {
        self.emit(Category::Metric, |builder| {
            builder.metric(timestamp.unwrap_or_else(Utc::now), point)
        })
    }

    pub fn write_exception(
        &self,
        exception: &ExceptionInfo,
        severity_level: SeverityLevel,
        timestamp: Option<DateTime<Utc>>,
    ) -> bool {
        self.emit(Category::Exception, |builder| {
            builder.exception(timestamp.unwrap_or_else(Utc::now), exception, severity_level)
        })
    }

    pub fn write_trace(&self, message: &str, severity_level: SeverityLevel, timestamp: Option<DateTime<Utc>>) -> bool {
        self.emit(Category::Trace, |builder| {
            builder.trace(timestamp.unwrap_or_else(Utc::now), message, severity_level)
        })
    }

    pub fn write_dependency(&self, dependency: &Dependency, timestamp: Option<DateTime<Utc>>) -> bool {
        self.emit(Category::Dependency, |builder| {
            builder.dependency(timestamp.unwrap_or_else(Utc::now), dependency)
        })
    }

    fn emit<F>(&self, category: Category, build: F) -> bool
    where
        F: FnOnce(&EnvelopeBuilder<'_>) -> Result<String>,
    {
        if let Err(skip) = self.sampler.check(category) {
            log::debug!("{} not written: {}", category, skip);
            if self.enable_debug_trace {
                self.tracer
                    .trace(&format!("DEBUG: Application Insights {} not written: {}", category, skip));
            }
            return true;
        }

        let builder = EnvelopeBuilder::new(
            &self.instrumentation_key,
            Some(&self.authenticated_user_id),
            &self.event_properties,
        );
        let json = match build(&builder) {
            Ok(json) => json,
            Err(e) => {
                self.tracer.trace_error("ERROR: Building Application Insights envelope", &e);
                return false;
            }
        };

        if self.enable_debug_trace {
            self.tracer
                .trace(&format!("DEBUG: Application Insights JSON: {}", double_braces(&json)));
        }

        self.transport.deliver(&self.endpoint_url, &json, self.tracer.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryConfig;
    use crate::host::{LocalOrganizationService, MemoryTracingService};
    use std::time::Duration;

    fn unreachable_config() -> LoggerConfig {
        LoggerConfig {
            instrumentation_key: "ikey".to_string(),
            endpoint_url: "http://127.0.0.1:9/v2/track".to_string(),
            timeout_secs: 1,
            ..Default::default()
        }
    }

    fn build(config: &LoggerConfig, tracer: Arc<MemoryTracingService>, stage: Option<i32>, category: Option<i32>) -> Result<InsightsLogger> {
        let context = ExecutionContext {
            message_name: "update".to_string(),
            depth: 1,
            ..Default::default()
        };
        InsightsLogger::new(
            config,
            &LocalOrganizationService::default(),
            tracer,
            Arc::new(Transport::new(Duration::from_secs(1))),
            &context,
            stage,
            category,
        )
    }

    #[test]
    fn test_missing_markers_fail_construction() {
        let tracer = Arc::new(MemoryTracingService::new());
        assert!(build(&unreachable_config(), tracer, None, None).is_err());
    }

    #[test]
    fn test_disabled_category_returns_true() {
        let mut config = unreachable_config();
        config.enable_debug_trace = true;
        config.trace = CategoryConfig {
            disable_tracking: true,
            percent_logged: 100,
        };
        let tracer = Arc::new(MemoryTracingService::new());
        let logger = build(&config, tracer.clone(), Some(40), None).unwrap();

        assert!(logger.write_trace("hello", SeverityLevel::Information, None));
        assert_eq!(
            tracer.entries(),
            vec!["DEBUG: Application Insights Trace not written: Disabled".to_string()]
        );
    }

    #[test]
    fn test_sampled_out_returns_true() {
        let mut config = unreachable_config();
        config.metric.percent_logged = 0;
        let tracer = Arc::new(MemoryTracingService::new());
        let logger = build(&config, tracer.clone(), None, Some(0)).unwrap();
        assert!(logger.write_metric("M", 1.0, None));
        assert!(tracer.entries().is_empty());
    }

    #[test]
    fn test_failed_delivery_returns_false() {
        let mut config = unreachable_config();
        config.enable_debug_trace = true;
        let tracer = Arc::new(MemoryTracingService::new());
        let logger = build(&config, tracer.clone(), Some(40), None).unwrap();

        assert!(!logger.write_event("XRM Message", None, None, None, None));
        let entries = tracer.entries();
        assert!(entries[0].starts_with("DEBUG: Application Insights JSON: {{"));
        assert_eq!(entries.len(), 2);
    }
}
