//! Application Insights telemetry for Dynamics-style plug-ins and workflows
//!
//! An [`InsightsLogger`] snapshots the execution context once, then turns
//! events, metrics, traces, exceptions and dependencies into ingestion
//! envelopes and posts them one at a time.

pub mod config;
pub mod context;
pub mod envelope;
pub mod format;
pub mod host;
pub mod logger;
pub mod sampling;
pub mod transport;

pub use config::LoggerConfig;
pub use envelope::{DataPoint, Dependency, ExceptionInfo, SeverityLevel};
pub use host::{ExecutionContext, OrganizationService, TracingService};
pub use logger::InsightsLogger;
pub use transport::Transport;
