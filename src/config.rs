use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default ingestion endpoint
pub const DEFAULT_ENDPOINT: &str = "https://dc.services.visualstudio.com/v2/track";

/// Logger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerConfig {
    pub instrumentation_key: String,
    pub endpoint_url: String,
    /// Write payloads and skip reasons to the tracing service
    pub enable_debug_trace: bool,
    /// Skip execution-context details and parameter traces
    pub disable_context_parameter_tracking: bool,
    /// Record the parent-context chain and backend duration
    pub capture_execution_history: bool,
    /// Upper bound for one delivery, in seconds
    pub timeout_secs: u64,
    /// Separator used when rendering currency amounts
    pub decimal_separator: char,
    pub log_level: LogLevel,
    pub trace: CategoryConfig,
    pub metric: CategoryConfig,
    pub event: CategoryConfig,
    pub exception: CategoryConfig,
    pub dependency: CategoryConfig,
}

/// Enable flag and sampling percentage for one category
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryConfig {
    pub disable_tracking: bool,
    pub percent_logged: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            instrumentation_key: String::new(),
            endpoint_url: DEFAULT_ENDPOINT.to_string(),
            enable_debug_trace: false,
            disable_context_parameter_tracking: false,
            capture_execution_history: false,
            timeout_secs: 10,
            decimal_separator: '.',
            log_level: LogLevel::default(),
            trace: CategoryConfig::default(),
            metric: CategoryConfig::default(),
            event: CategoryConfig::default(),
            exception: CategoryConfig::default(),
            dependency: CategoryConfig::default(),
        }
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            disable_tracking: false,
            percent_logged: 100,
        }
    }
}

impl LoggerConfig {
    /// Parse the setup JSON handed over by the host
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse logger setup JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            let path = Self::expand_path(path);
            return Self::load_from_file(&path).context(format!("Failed to load config from {}", path.display()));
        }

        // Check XRM_INSIGHTS_CONFIG env var
        if let Ok(env_path) = std::env::var("XRM_INSIGHTS_CONFIG") {
            let path = Self::expand_path(Path::new(&env_path));
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from XRM_INSIGHTS_CONFIG: {}", e);
                    }
                }
            }
        }

        // Try ~/.config/xrm-insights/xrm-insights.yaml
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("xrm-insights").join("xrm-insights.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        // Try ./xrm-insights.yaml (for development)
        let local_config = PathBuf::from("xrm-insights.yaml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load local config: {}", e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject sampling percentages outside 0..=100
    pub fn validate(&self) -> Result<()> {
        let categories = [
            ("trace", &self.trace),
            ("metric", &self.metric),
            ("event", &self.event),
            ("exception", &self.exception),
            ("dependency", &self.dependency),
        ];
        for (name, category) in categories {
            if category.percent_logged > 100 {
                eyre::bail!(
                    "{}.percentLogged must be between 0 and 100, got {}",
                    name,
                    category.percent_logged
                );
            }
        }
        Ok(())
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}
