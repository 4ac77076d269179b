//! pod-label-policy library crate
//!
//! A validating admission policy for Pods. The label validator in [`policy`]
//! decides; [`webhooks`] and [`health`] expose it over HTTP.

pub mod config;
pub mod health;
pub mod policy;
pub mod webhooks;

pub use config::{Config, ConfigError};
pub use health::HealthState;
pub use policy::{LabelSet, PolicyConfiguration, PolicySettings, Verdict, validate};
pub use webhooks::{WebhookError, run_webhook_server};
