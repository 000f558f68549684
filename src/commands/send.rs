//! Send one telemetry item through a freshly built logger

use colored::*;
use eyre::{Context, Result};
use indexmap::IndexMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use super::Markers;
use crate::cli::SendKind;
use xrm_insights::config::LoggerConfig;
use xrm_insights::envelope::DataPoint;
use xrm_insights::host::{LocalOrganizationService, LogTracingService};
use xrm_insights::{Dependency, ExceptionInfo, InsightsLogger, SeverityLevel, Transport};

/// Longest measurement name accepted for a custom event
pub const MAX_MEASUREMENT_NAME_LENGTH: usize = 150;

pub fn run(kind: SendKind, markers: &Markers, config: &LoggerConfig) -> Result<()> {
    // reject bad event input before the logger exists; construction may already post a metric
    let event_measurements = match &kind {
        SendKind::Event { name, measurements, .. } => {
            let measurements = parse_measurements(measurements)?;
            validate_event_args(name, &measurements)?;
            Some(measurements)
        }
        _ => None,
    };

    let context = markers.load_context()?;
    let transport = Arc::new(Transport::new(Duration::from_secs(config.timeout_secs)));
    let logger = InsightsLogger::new(
        config,
        &LocalOrganizationService::default(),
        Arc::new(LogTracingService),
        transport,
        &context,
        markers.plugin_stage,
        markers.workflow_category,
    )?;

    let (label, delivered) = match kind {
        SendKind::Event {
            name,
            operation_name,
            operation_id,
            ..
        } => {
            let measurements = event_measurements.as_ref().filter(|m| !m.is_empty());
            let ok = logger.write_event(
                &name,
                measurements,
                None,
                operation_name.as_deref(),
                operation_id.as_deref(),
            );
            ("Event", ok)
        }
        SendKind::Trace { message, severity } => (
            "Trace",
            logger.write_trace(&message, SeverityLevel::parse_lenient(&severity), None),
        ),
        SendKind::Metric {
            name,
            value,
            count,
            min,
            max,
            std_dev,
        } => {
            let point = DataPoint::new(&name, value, count, min, max, std_dev);
            ("Metric", logger.write_metric_point(point, None))
        }
        SendKind::Exception {
            message,
            type_name,
            stack_trace,
            severity,
        } => {
            let mut exception = ExceptionInfo::new(type_name, message);
            if let Some(path) = stack_trace {
                let path = LoggerConfig::expand_path(&path);
                let text = fs::read_to_string(&path)
                    .context(format!("Failed to read stack trace {}", path.display()))?;
                exception = exception.with_stack_trace(text);
            }
            (
                "Exception",
                logger.write_exception(&exception, SeverityLevel::parse_lenient(&severity), None),
            )
        }
        SendKind::Dependency {
            name,
            method,
            dependency_type,
            duration,
            result_code,
            success,
            data,
        } => {
            let dependency = Dependency {
                name,
                method,
                dependency_type,
                duration_ms: duration,
                result_code,
                success,
                data,
            };
            ("Dependency", logger.write_dependency(&dependency, None))
        }
    };

    if delivered {
        println!("{} {} handled", "✓".green(), label);
        Ok(())
    } else {
        println!("{} {} was not delivered", "✗".red(), label);
        eyre::bail!("{} delivery failed, see the log file for the endpoint response", label)
    }
}

/// Parse `name=value` pairs, keeping their order
pub fn parse_measurements(raw: &[String]) -> Result<IndexMap<String, f64>> {
    let mut measurements = IndexMap::new();
    for pair in raw {
        let Some((name, value)) = pair.split_once('=') else {
            eyre::bail!("Measurement '{}' must look like name=value", pair);
        };
        let value: f64 = value
            .trim()
            .parse()
            .context(format!("Measurement '{}' has a non-numeric value", name))?;
        measurements.insert(name.trim().to_string(), value);
    }
    Ok(measurements)
}

/// Caller-side checks applied before an event is written
pub fn validate_event_args(name: &str, measurements: &IndexMap<String, f64>) -> Result<()> {
    if name.trim().is_empty() {
        eyre::bail!("Name must be populated");
    }
    if measurements
        .keys()
        .any(|k| k.chars().count() > MAX_MEASUREMENT_NAME_LENGTH)
    {
        eyre::bail!("Measurement name cannot exceed {} characters", MAX_MEASUREMENT_NAME_LENGTH);
    }
    Ok(())
}
