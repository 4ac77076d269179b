//! Test fixtures and builder patterns for policies and admission envelopes.

use pod_label_policy::policy::{LabelSet, PolicyConfiguration, PolicySettings};
use serde_json::{Value, json};

/// Builder for policy settings.
///
/// # Example
/// ```
/// let policy = PolicyBuilder::new()
///     .deny("cost-center")
///     .constrain("owner", "^team-")
///     .build();
/// ```
#[derive(Clone, Debug, Default)]
pub struct PolicyBuilder {
    settings: PolicySettings,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label to the deny list.
    pub fn deny(mut self, label: impl Into<String>) -> Self {
        self.settings.denied_labels.insert(label.into());
        self
    }

    /// Constrain a label to a pattern.
    pub fn constrain(mut self, label: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.settings
            .constrained_labels
            .insert(label.into(), pattern.into());
        self
    }

    /// The settings, before compilation.
    pub fn settings(&self) -> PolicySettings {
        self.settings.clone()
    }

    /// The settings as they appear on the wire.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.settings).expect("settings serialize")
    }

    /// Compile the settings.
    pub fn build(&self) -> PolicyConfiguration {
        self.settings.compile().expect("policy patterns compile")
    }
}

/// Build a label set from pairs.
pub fn labels(pairs: &[(&str, &str)]) -> LabelSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Builder for policy validation envelopes.
#[derive(Clone, Debug)]
pub struct EnvelopeBuilder {
    uid: String,
    operation: String,
    labels: Option<Value>,
    settings: Value,
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self {
            uid: "test-uid".to_string(),
            operation: "CREATE".to_string(),
            labels: None,
            settings: json!({}),
        }
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Set the Pod labels. Without this the Pod has no `labels` field.
    pub fn labels(mut self, pairs: &[(&str, &str)]) -> Self {
        self.labels = Some(serde_json::to_value(labels(pairs)).expect("labels serialize"));
        self
    }

    /// Set raw labels, e.g. with non-string values.
    pub fn raw_labels(mut self, labels: Value) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    pub fn policy(self, policy: &PolicyBuilder) -> Self {
        let settings = policy.to_json();
        self.settings(settings)
    }

    pub fn to_json(&self) -> Value {
        let mut metadata = json!({ "name": "nginx", "namespace": "default" });
        if let Some(labels) = &self.labels {
            metadata["labels"] = labels.clone();
        }
        json!({
            "request": {
                "uid": self.uid,
                "kind": { "group": "", "version": "v1", "kind": "Pod" },
                "resource": { "group": "", "version": "v1", "resource": "pods" },
                "operation": self.operation,
                "namespace": "default",
                "name": "nginx",
                "object": {
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "metadata": metadata,
                    "spec": { "containers": [{ "name": "nginx", "image": "nginx:1.27" }] }
                }
            },
            "settings": self.settings
        })
    }

    pub fn build(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }
}
