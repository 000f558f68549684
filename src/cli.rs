use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "xrm-insights",
    about = "Send plug-in and workflow telemetry to Application Insights",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/xrm-insights/logs/xrm-insights.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to xrm-insights.yaml config file")]
    pub config: Option<PathBuf>,

    /// Execution context captured from the host, as JSON
    #[arg(long, global = true)]
    pub context: Option<PathBuf>,

    /// Plug-in pipeline stage (10, 20, 30, 40)
    #[arg(long, global = true)]
    pub stage: Option<i32>,

    /// Workflow category (0-4)
    #[arg(long, global = true)]
    pub workflow_category: Option<i32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one telemetry item
    Send {
        #[command(subcommand)]
        kind: SendKind,
    },

    /// Print the properties a logger would attach for the context
    Render {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum SendKind {
    /// Custom event
    Event {
        name: String,

        /// Measurement as name=value, repeatable
        #[arg(long = "measurement", short = 'm')]
        measurements: Vec<String>,

        /// Operation name tag
        #[arg(long)]
        operation_name: Option<String>,

        /// Operation id tag
        #[arg(long)]
        operation_id: Option<String>,
    },

    /// Trace message
    Trace {
        message: String,

        #[arg(long, default_value = "Information")]
        severity: String,
    },

    /// Metric sample or aggregate
    Metric {
        name: String,
        value: f64,

        #[arg(long)]
        count: Option<f64>,

        #[arg(long)]
        min: Option<f64>,

        #[arg(long)]
        max: Option<f64>,

        #[arg(long)]
        std_dev: Option<f64>,
    },

    /// Exception
    Exception {
        message: String,

        #[arg(long, default_value = "Error")]
        type_name: String,

        /// File holding the stack trace text
        #[arg(long)]
        stack_trace: Option<PathBuf>,

        #[arg(long, default_value = "Error")]
        severity: String,
    },

    /// Outbound dependency call
    Dependency {
        /// Target name or URL
        name: String,

        /// HTTP method, prefixed to URL targets
        #[arg(long)]
        method: Option<String>,

        #[arg(long = "type", default_value = "HTTP")]
        dependency_type: String,

        /// Duration in milliseconds
        #[arg(long, default_value_t = 0)]
        duration: u64,

        #[arg(long)]
        result_code: Option<i32>,

        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        success: bool,

        /// Command or request text
        #[arg(long)]
        data: Option<String>,
    },
}
