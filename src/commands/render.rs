//! Show the properties a logger would attach to every item

use colored::*;
use eyre::Result;

use super::Markers;
use crate::cli::OutputFormat;
use xrm_insights::config::LoggerConfig;
use xrm_insights::context::{history, Collector, ContextSource, EventProperties};
use xrm_insights::host::{LocalOrganizationService, LogTracingService};

pub fn run(format: OutputFormat, markers: &Markers, config: &LoggerConfig) -> Result<()> {
    let context = markers.load_context()?;
    let source = ContextSource::from_markers(markers.plugin_stage, markers.workflow_category)?;
    let service = LocalOrganizationService::default();

    let collector = Collector {
        service: &service,
        tracer: &LogTracingService,
        source,
        trace_parameters: !config.disable_context_parameter_tracking,
        decimal_separator: config.decimal_separator,
    };
    let mut props = EventProperties::collect(&collector, &context);
    if config.capture_execution_history {
        if let Some(captured) = history::capture(&context, chrono::Utc::now()) {
            props.set_history(captured);
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&props)?),
        OutputFormat::Text => print_text(&props)?,
    }
    Ok(())
}

fn print_text(props: &EventProperties) -> Result<()> {
    println!("{}", "Event Properties".bold());
    println!();

    let value = serde_json::to_value(props)?;
    let Some(fields) = value.as_object() else {
        return Ok(());
    };
    for (key, field) in fields {
        if matches!(key.as_str(), "inputParameters" | "outputParameters" | "history") {
            continue;
        }
        let text = field.as_str().map(str::to_string).unwrap_or_else(|| field.to_string());
        println!("  {:24} {}", format!("{}:", key).dimmed(), text);
    }

    for (label, block) in [("Input", &props.input_parameters), ("Output", &props.output_parameters)] {
        println!();
        println!("{}:", format!("{} Parameters", label).cyan());
        match block {
            Some(text) => {
                for line in text.lines() {
                    println!("  {}", line);
                }
            }
            None => println!("  {}", "(none)".dimmed()),
        }
    }

    if let Some(frames) = &props.history {
        println!();
        println!("{} ({}):", "History".cyan(), format!("{} frames", frames.len()).dimmed());
        for frame in frames {
            println!("  {} {}", "●".yellow(), serde_json::to_string(frame)?);
        }
    }
    Ok(())
}
