//! Per-category enable flags and percentage sampling

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{CategoryConfig, LoggerConfig};

/// Telemetry category; decides payload shape and routing name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Category {
    Trace,
    Metric,
    Event,
    Exception,
    Dependency,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Trace,
        Category::Metric,
        Category::Event,
        Category::Exception,
        Category::Dependency,
    ];

    /// Routing suffix in the envelope name
    pub fn routing_name(&self) -> &'static str {
        match self {
            Category::Trace => "Message",
            Category::Metric => "Metric",
            Category::Event => "Event",
            Category::Exception => "Exception",
            Category::Dependency => "RemoteDependency",
        }
    }

    /// `baseType` discriminator of the envelope data
    pub fn base_type(&self) -> &'static str {
        match self {
            Category::Trace => "MessageData",
            Category::Metric => "MetricData",
            Category::Event => "EventData",
            Category::Exception => "ExceptionData",
            Category::Dependency => "RemoteDependencyData",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Trace => "Trace",
            Category::Metric => "Metric",
            Category::Event => "Event",
            Category::Exception => "Exception",
            Category::Dependency => "Dependency",
        };
        write!(f, "{}", name)
    }
}

/// Why an event was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Disabled,
    Threshold(u8),
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::Disabled => write!(f, "Disabled"),
            Skip::Threshold(percent) => write!(f, "Threshold%: {}", percent),
        }
    }
}

/// Sampling decisions for every category
#[derive(Debug, Clone)]
pub struct Sampler {
    trace: CategoryConfig,
    metric: CategoryConfig,
    event: CategoryConfig,
    exception: CategoryConfig,
    dependency: CategoryConfig,
}

impl Sampler {
    pub fn new(config: &LoggerConfig) -> Self {
        Self {
            trace: config.trace.clone(),
            metric: config.metric.clone(),
            event: config.event.clone(),
            exception: config.exception.clone(),
            dependency: config.dependency.clone(),
        }
    }

    pub fn category(&self, category: Category) -> &CategoryConfig {
        match category {
            Category::Trace => &self.trace,
            Category::Metric => &self.metric,
            Category::Event => &self.event,
            Category::Exception => &self.exception,
            Category::Dependency => &self.dependency,
        }
    }

    pub fn should_log(&self, category: Category) -> bool {
        self.check(category).is_ok()
    }

    /// Decide one event; each call is an independent trial
    pub fn check(&self, category: Category) -> Result<(), Skip> {
        let config = self.category(category);
        if config.disable_tracking {
            return Err(Skip::Disabled);
        }
        if in_threshold(config.percent_logged) {
            Ok(())
        } else {
            Err(Skip::Threshold(config.percent_logged))
        }
    }
}

/// Draw from 1..=100 and keep the event when the draw is within `threshold`
pub fn in_threshold(threshold: u8) -> bool {
    match threshold {
        100.. => true,
        0 => false,
        _ => rand::thread_rng().gen_range(1..=100u8) <= threshold,
    }
}
