//! Label policy for Pod admission.
//!
//! - `settings`: user settings, pattern compilation and consistency checks
//! - `labels`: the label validator producing a [`Verdict`]

pub mod labels;
pub mod settings;

pub use labels::{
    LabelSet, ValidationEvent, ValidationObserver, Verdict, Violation, validate, validate_observed,
};
pub use settings::{
    PolicyConfiguration, PolicySettings, SettingsError, SettingsValidationResponse,
    validate_settings,
};
