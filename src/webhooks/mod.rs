//! Webhook module for validating admission requests.
//!
//! - `protocol`: policy envelope types and label extraction
//! - `server`: HTTP(S) endpoints wiring envelopes to the label policy

pub mod protocol;
mod server;

pub use protocol::{
    HTTP_BAD_REQUEST, KubernetesAdmissionRequest, ProtocolError, ValidationRequest,
    ValidationResponse, labels_from_object,
};
pub use server::{
    WebhookError, WebhookState, create_webhook_router, evaluate_envelope, run_webhook_server,
};
