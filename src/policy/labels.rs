//! Pod label validation.
//!
//! Evaluates a label set against a compiled [`PolicyConfiguration`]:
//! - Denied labels must never appear
//! - Constrained labels must match their pattern when present
//! - Constrained labels must all be present
//!
//! Evaluation stops at the first violation. Rejections are never aggregated,
//! so callers only learn about the first problem found.

use std::collections::BTreeMap;

use thiserror::Error;

use super::settings::PolicyConfiguration;

/// Labels taken from an object's metadata.
pub type LabelSet = BTreeMap<String, String>;

/// Cause of a rejected label set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A label on the deny list is present
    #[error("label {label} is on the deny list")]
    DeniedLabel { label: String, value: String },

    /// A constrained label does not match its pattern
    #[error("the value of {label} doesn't pass user-defined constraint")]
    ConstraintViolation { label: String, value: String },

    /// A constrained label is absent
    #[error("constrained label {label} not found")]
    RequiredLabelMissing { label: String },
}

impl Violation {
    /// The label key the violation refers to
    pub fn label(&self) -> &str {
        match self {
            Violation::DeniedLabel { label, .. }
            | Violation::ConstraintViolation { label, .. }
            | Violation::RequiredLabelMissing { label } => label,
        }
    }

    /// Short machine-readable kind, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Violation::DeniedLabel { .. } => "denied_label",
            Violation::ConstraintViolation { .. } => "constraint_violation",
            Violation::RequiredLabelMissing { .. } => "required_label_missing",
        }
    }
}

/// Outcome of a validation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { reason: String, code: Option<u16> },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Rejection reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected { reason, .. } => Some(reason),
        }
    }

    /// Status code, if any. Label violations never carry one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected { code, .. } => *code,
        }
    }
}

impl From<&Violation> for Verdict {
    fn from(violation: &Violation) -> Self {
        Verdict::Rejected {
            reason: violation.to_string(),
            code: None,
        }
    }
}

/// Instrumentation hook notified while a label set is evaluated.
///
/// All methods default to no-ops. Implementations must not assume that every
/// label is reported: evaluation stops at the first violation.
pub trait ValidationObserver {
    /// A label is about to be checked
    fn label_checked(&mut self, _label: &str, _value: &str) {}

    /// Evaluation found a violation and is about to reject
    fn violation(&mut self, _violation: &Violation) {}

    /// Evaluation finished
    fn verdict(&mut self, _verdict: &Verdict) {}
}

impl ValidationObserver for () {}

/// A recorded observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationEvent {
    LabelChecked { label: String, value: String },
    Violation(Violation),
    Verdict(Verdict),
}

impl ValidationObserver for Vec<ValidationEvent> {
    fn label_checked(&mut self, label: &str, value: &str) {
        self.push(ValidationEvent::LabelChecked {
            label: label.to_string(),
            value: value.to_string(),
        });
    }

    fn violation(&mut self, violation: &Violation) {
        self.push(ValidationEvent::Violation(violation.clone()));
    }

    fn verdict(&mut self, verdict: &Verdict) {
        self.push(ValidationEvent::Verdict(verdict.clone()));
    }
}

/// Validate a label set against the policy
pub fn validate(labels: &LabelSet, config: &PolicyConfiguration) -> Verdict {
    validate_observed(labels, config, &mut ())
}

/// Validate a label set, reporting progress to `observer`
pub fn validate_observed<O>(
    labels: &LabelSet,
    config: &PolicyConfiguration,
    observer: &mut O,
) -> Verdict
where
    O: ValidationObserver + ?Sized,
{
    let verdict = match find_violation(labels, config, observer) {
        Some(violation) => {
            observer.violation(&violation);
            Verdict::from(&violation)
        }
        None => Verdict::Accepted,
    };
    observer.verdict(&verdict);
    verdict
}

fn find_violation<O>(
    labels: &LabelSet,
    config: &PolicyConfiguration,
    observer: &mut O,
) -> Option<Violation>
where
    O: ValidationObserver + ?Sized,
{
    for (label, value) in labels {
        observer.label_checked(label, value);
        if let Some(violation) = check_label(label, value, config) {
            return Some(violation);
        }
    }

    // Constrained labels double as required labels
    config
        .constrained_labels()
        .keys()
        .find(|required| !labels.contains_key(*required))
        .map(|required| Violation::RequiredLabelMissing {
            label: required.clone(),
        })
}

/// Check a single label. The deny list takes precedence over constraints.
fn check_label(label: &str, value: &str, config: &PolicyConfiguration) -> Option<Violation> {
    if config.is_denied(label) {
        return Some(Violation::DeniedLabel {
            label: label.to_string(),
            value: value.to_string(),
        });
    }

    match config.constraint(label) {
        Some(pattern) if !pattern.is_match(value) => Some(Violation::ConstraintViolation {
            label: label.to_string(),
            value: value.to_string(),
        }),
        _ => None,
    }
}
