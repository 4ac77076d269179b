//! Policy wire protocol.
//!
//! A policy host sends a [`ValidationRequest`] wrapping the Kubernetes
//! admission request together with the settings of the policy instance, and
//! expects a [`ValidationResponse`] back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::{LabelSet, Verdict};

/// Status code used when the request envelope or settings are malformed
pub const HTTP_BAD_REQUEST: u16 = 400;

/// Errors raised while decoding a validation request
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The envelope is not a valid validation request
    #[error("invalid validation request: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The target object metadata cannot be decoded
    #[error("invalid object metadata: {0}")]
    Metadata(#[source] serde_json::Error),
}

/// Group/version/kind of the admitted object
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

/// The subset of a Kubernetes AdmissionRequest the policy reads
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesAdmissionRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub kind: GroupVersionKind,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub object: serde_json::Value,
    #[serde(default)]
    pub old_object: serde_json::Value,
    #[serde(default)]
    pub dry_run: bool,
}

impl KubernetesAdmissionRequest {
    pub fn is_delete(&self) -> bool {
        self.operation.eq_ignore_ascii_case("DELETE")
    }

    /// Labels of the admitted object. A missing object or metadata yields an
    /// empty set.
    pub fn object_labels(&self) -> Result<LabelSet, ProtocolError> {
        labels_from_object(&self.object)
    }
}

/// Envelope received on the `/validate` endpoint
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ValidationRequest {
    pub request: KubernetesAdmissionRequest,
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl ValidationRequest {
    pub fn from_slice(payload: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(payload).map_err(ProtocolError::Envelope)
    }
}

/// Response returned on the `/validate` endpoint
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidationResponse {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl ValidationResponse {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            message: None,
            code: None,
        }
    }

    pub fn reject(message: impl Into<String>, code: Option<u16>) -> Self {
        Self {
            accepted: false,
            message: Some(message.into()),
            code,
        }
    }
}

impl From<Verdict> for ValidationResponse {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Accepted => Self::accept(),
            Verdict::Rejected { reason, code } => Self::reject(reason, code),
        }
    }
}

#[derive(Deserialize)]
struct ObjectWithMetadata {
    #[serde(default)]
    metadata: LabelsOnly,
}

/// Only `metadata.labels` is decoded; other metadata fields are ignored.
#[derive(Deserialize, Default)]
struct LabelsOnly {
    #[serde(default)]
    labels: Option<LabelSet>,
}

/// Extract `metadata.labels` from a raw Kubernetes object
pub fn labels_from_object(object: &serde_json::Value) -> Result<LabelSet, ProtocolError> {
    if object.is_null() {
        return Ok(LabelSet::new());
    }
    let parsed: ObjectWithMetadata =
        ObjectWithMetadata::deserialize(object).map_err(ProtocolError::Metadata)?;
    Ok(parsed.metadata.labels.unwrap_or_default())
}
