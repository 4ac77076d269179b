//! Policy settings.
//!
//! Settings arrive as JSON, either embedded in each validation request or
//! loaded once from a file at startup:
//!
//! ```json
//! {
//!   "denied_labels": ["cost-center"],
//!   "constrained_labels": { "owner": "^team-[a-z]+$" }
//! }
//! ```
//!
//! [`PolicySettings`] is the wire form. [`PolicySettings::compile`] turns it
//! into a [`PolicyConfiguration`] with every pattern compiled.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading policy settings
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Settings are not valid JSON for [`PolicySettings`]
    #[error("cannot decode settings: {0}")]
    Decode(#[from] serde_json::Error),

    /// A constrained label pattern does not compile
    #[error("invalid pattern for constrained label {label}: {source}")]
    InvalidPattern {
        label: String,
        #[source]
        source: regex::Error,
    },

    /// Labels appear in both the deny list and the constrained labels
    #[error("these labels cannot be constrained and denied at the same time: {}", .0.join(", "))]
    ConstrainedAndDenied(Vec<String>),
}

/// Policy settings as provided by the user
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySettings {
    /// Labels that must never be set
    #[serde(default)]
    pub denied_labels: BTreeSet<String>,
    /// Labels that must be set, with the pattern their value must match
    #[serde(default)]
    pub constrained_labels: BTreeMap<String, String>,
}

impl PolicySettings {
    /// Decode settings from a JSON value. `null` is the empty policy.
    pub fn from_value(value: serde_json::Value) -> Result<Self, SettingsError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Compile every constrained label pattern
    pub fn compile(&self) -> Result<PolicyConfiguration, SettingsError> {
        let constrained_labels = self
            .constrained_labels
            .iter()
            .map(|(label, pattern)| {
                Regex::new(pattern)
                    .map(|re| (label.clone(), re))
                    .map_err(|source| SettingsError::InvalidPattern {
                        label: label.clone(),
                        source,
                    })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(PolicyConfiguration {
            denied_labels: self.denied_labels.clone(),
            constrained_labels,
        })
    }

    /// Check that the settings compile and are internally consistent
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.compile()?;

        let overlap: Vec<String> = self
            .constrained_labels
            .keys()
            .filter(|label| self.denied_labels.contains(*label))
            .cloned()
            .collect();
        if !overlap.is_empty() {
            return Err(SettingsError::ConstrainedAndDenied(overlap));
        }

        Ok(())
    }
}

/// Compiled, read-only policy used by the label validator
#[derive(Debug, Clone, Default)]
pub struct PolicyConfiguration {
    denied_labels: BTreeSet<String>,
    constrained_labels: BTreeMap<String, Regex>,
}

impl PolicyConfiguration {
    pub fn constrained_labels(&self) -> &BTreeMap<String, Regex> {
        &self.constrained_labels
    }

    pub fn is_denied(&self, label: &str) -> bool {
        self.denied_labels.contains(label)
    }

    /// Pattern a label's value must match, if the label is constrained
    pub fn constraint(&self, label: &str) -> Option<&Regex> {
        self.constrained_labels.get(label)
    }
}

/// Result of the settings validation endpoint
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SettingsValidationResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SettingsValidationResponse {
    pub fn accept() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

/// Validate raw settings JSON
pub fn validate_settings(value: serde_json::Value) -> SettingsValidationResponse {
    match PolicySettings::from_value(value).and_then(|settings| settings.validate()) {
        Ok(()) => SettingsValidationResponse::accept(),
        Err(e) => {
            SettingsValidationResponse::reject(format!("Provided settings are not valid: {}", e))
        }
    }
}
