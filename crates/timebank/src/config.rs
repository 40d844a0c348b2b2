//! Configuration for a time bank slot.

use serde::{Deserialize, Serialize};

use crate::DEFAULT_LABEL;
use crate::error::{Error, Result};

/// Configuration for a [`TimeBank`](crate::TimeBank).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBankConfig {
    /// Name attached to every log event emitted by the slot.
    pub label: String,
}

impl Default for TimeBankConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl TimeBankConfig {
    /// Parse a configuration from TOML. Missing keys fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigParseFailed` if the input is not valid TOML or
    /// holds values of the wrong type.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| Error::config_parse_failed(e.to_string()))
    }

    /// Set the log label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}
