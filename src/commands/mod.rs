pub mod completions;
pub mod render;
pub mod send;

use eyre::{Context, Result};
use std::fs;
use std::path::PathBuf;

use xrm_insights::config::LoggerConfig;
use xrm_insights::host::ExecutionContext;

/// Context file and source markers shared by every command
pub struct Markers {
    pub context: Option<PathBuf>,
    pub plugin_stage: Option<i32>,
    pub workflow_category: Option<i32>,
}

impl Markers {
    /// Read the execution context, or an empty one when no file was given
    pub fn load_context(&self) -> Result<ExecutionContext> {
        let Some(path) = &self.context else {
            log::debug!("No context file given, using an empty execution context");
            return Ok(ExecutionContext::default());
        };
        let path = LoggerConfig::expand_path(path);
        let content = fs::read_to_string(&path).context(format!("Failed to read context file {}", path.display()))?;
        let context: ExecutionContext =
            serde_json::from_str(&content).context(format!("Failed to parse context file {}", path.display()))?;
        log::info!("Loaded execution context from: {}", path.display());
        Ok(context)
    }
}
