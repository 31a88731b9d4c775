//! Probe configuration
//!
//! Probe settings can be described as data and parsed from JSON, TOML or
//! YAML text. Missing keys fall back to the probe defaults: no flag,
//! synchronous delays and no logging.

use crate::error::Result;
use crate::logger::Logger;
use crate::options::{Delay, Flag};
use serde::{Deserialize, Serialize};

/// Where probe progress messages go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerTarget {
    #[default]
    Off,
    Tracing,
}

impl LoggerTarget {
    pub fn logger(&self) -> Logger {
        match self {
            LoggerTarget::Off => Logger::noop(),
            LoggerTarget::Tracing => Logger::tracing(),
        }
    }
}

/// Serializable probe settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// View-model field to write readiness into
    pub flag: Option<String>,

    /// Milliseconds before asserting the flag; absent or negative is synchronous
    pub assert_delay_ms: Option<f64>,

    /// Milliseconds before negating the flag; absent or negative is synchronous
    pub negate_delay_ms: Option<f64>,

    pub logger: LoggerTarget,
}

impl ProbeConfig {
    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn flag(&self) -> Flag {
        Flag::from(self.flag.clone())
    }

    pub fn assert_delay(&self) -> Delay {
        self.assert_delay_ms.map_or(Delay::Synchronous, Delay::from_millis)
    }

    pub fn negate_delay(&self) -> Delay {
        self.negate_delay_ms.map_or(Delay::Synchronous, Delay::from_millis)
    }
}
