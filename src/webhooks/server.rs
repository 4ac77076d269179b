//! Admission webhook server.
//!
//! Endpoints:
//! - `POST /validate` - policy envelope carrying the admission request and the
//!   settings of the policy instance
//! - `POST /validate_settings` - settings validation
//! - `POST /validate-pods` - Kubernetes `AdmissionReview` for Pods, evaluated
//!   against the settings loaded at startup
//!
//! TLS is used when both the certificate and the key are present. Otherwise
//! the server listens in plain HTTP, for use behind a TLS-terminating proxy.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use k8s_openapi::api::core::v1::Pod;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::health::{HealthState, Outcome};
use crate::policy::{
    PolicyConfiguration, PolicySettings, SettingsValidationResponse, ValidationObserver, Verdict,
    Violation, validate_observed, validate_settings,
};
use crate::webhooks::protocol::{HTTP_BAD_REQUEST, ValidationRequest, ValidationResponse};

const ENDPOINT_VALIDATE: &str = "validate";
const ENDPOINT_VALIDATE_SETTINGS: &str = "validate_settings";
const ENDPOINT_VALIDATE_PODS: &str = "validate-pods";

/// Shared state for webhook handlers
pub struct WebhookState {
    /// Policy for the native AdmissionReview endpoint
    pub policy: PolicyConfiguration,
    pub health: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(policy: PolicyConfiguration, health: Option<Arc<HealthState>>) -> Self {
        Self { policy, health }
    }

    fn record(&self, endpoint: &str, outcome: Outcome, started: Instant) {
        if let Some(health) = &self.health {
            health
                .metrics
                .record_admission(endpoint, outcome, started.elapsed().as_secs_f64());
        }
    }
}

/// Logs every step of a label evaluation
struct TracingObserver<'a> {
    uid: &'a str,
    health: Option<&'a HealthState>,
}

impl ValidationObserver for TracingObserver<'_> {
    fn label_checked(&mut self, label: &str, value: &str) {
        info!(uid = %self.uid, label = %label, value = %value, "Checking label");
    }

    fn violation(&mut self, violation: &Violation) {
        match violation {
            Violation::RequiredLabelMissing { .. } => {
                warn!(
                    uid = %self.uid,
                    required_label = %violation.label(),
                    "Required label is missing"
                );
            }
            Violation::DeniedLabel { value, .. } | Violation::ConstraintViolation { value, .. } => {
                warn!(
                    uid = %self.uid,
                    label = %violation.label(),
                    value = %value,
                    error = %violation,
                    "Label validation failed"
                );
            }
        }
        if let Some(health) = self.health {
            health.metrics.record_violation(violation.kind());
        }
    }

    fn verdict(&mut self, verdict: &Verdict) {
        if verdict.is_accepted() {
            info!(uid = %self.uid, "Pod labels validation passed");
        }
    }
}

fn outcome_of(response: &ValidationResponse) -> Outcome {
    match (response.accepted, response.code) {
        (true, _) => Outcome::Accepted,
        (false, Some(HTTP_BAD_REQUEST)) => Outcome::Invalid,
        (false, _) => Outcome::Rejected,
    }
}

/// Evaluate a raw policy envelope
pub fn evaluate_envelope(payload: &[u8], health: Option<&HealthState>) -> ValidationResponse {
    let validation_request = match ValidationRequest::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to parse validation request");
            return ValidationResponse::reject(e.to_string(), Some(HTTP_BAD_REQUEST));
        }
    };

    let policy = match PolicySettings::from_value(validation_request.settings)
        .and_then(|settings| settings.compile())
    {
        Ok(policy) => policy,
        Err(e) => {
            error!(error = %e, "Failed to parse policy settings");
            return ValidationResponse::reject(e.to_string(), Some(HTTP_BAD_REQUEST));
        }
    };

    let request = &validation_request.request;
    debug!(
        uid = %request.uid,
        operation = %request.operation,
        kind = %request.kind.kind,
        "Validating Pod labels"
    );

    if request.is_delete() {
        info!(uid = %request.uid, "Admission request allowed (DELETE)");
        return ValidationResponse::accept();
    }

    let labels = match request.object_labels() {
        Ok(labels) => labels,
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Failed to read object labels");
            return ValidationResponse::reject(e.to_string(), Some(HTTP_BAD_REQUEST));
        }
    };

    let mut observer = TracingObserver {
        uid: &request.uid,
        health,
    };
    validate_observed(&labels, &policy, &mut observer).into()
}

/// Policy envelope handler
async fn validate(State(state): State<Arc<WebhookState>>, body: Bytes) -> impl IntoResponse {
    let started = Instant::now();
    let response = evaluate_envelope(&body, state.health.as_deref());
    state.record(ENDPOINT_VALIDATE, outcome_of(&response), started);
    (StatusCode::OK, Json(response))
}

/// Settings validation handler
async fn validate_settings_handler(
    State(state): State<Arc<WebhookState>>,
    body: Bytes,
) -> impl IntoResponse {
    let started = Instant::now();
    let response = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) => validate_settings(value),
        Err(e) => SettingsValidationResponse::reject(format!(
            "Provided settings are not valid: {}",
            e
        )),
    };

    let outcome = if response.valid {
        Outcome::Accepted
    } else {
        warn!(message = ?response.message, "Settings validation failed");
        Outcome::Rejected
    };
    state.record(ENDPOINT_VALIDATE_SETTINGS, outcome, started);
    (StatusCode::OK, Json(response))
}

/// Kubernetes AdmissionReview handler for Pods
async fn validate_pods(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<Pod>>,
) -> impl IntoResponse {
    let started = Instant::now();
    let request: AdmissionRequest<Pod> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            state.record(ENDPOINT_VALIDATE_PODS, Outcome::Invalid, started);
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let uid = &request.uid;
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );

    // DELETE operations are always allowed
    if request.operation == Operation::Delete {
        info!(uid = %uid, "Admission request allowed (DELETE)");
        state.record(ENDPOINT_VALIDATE_PODS, Outcome::Accepted, started);
        return (
            StatusCode::OK,
            Json(AdmissionResponse::from(&request).into_review()),
        );
    }

    let labels = match &request.object {
        Some(pod) => pod.metadata.labels.clone().unwrap_or_default(),
        None => {
            error!(uid = %uid, "Missing object in request");
            state.record(ENDPOINT_VALIDATE_PODS, Outcome::Invalid, started);
            return (
                StatusCode::OK,
                Json(
                    AdmissionResponse::from(&request)
                        .deny("Missing object in request")
                        .into_review(),
                ),
            );
        }
    };

    let mut observer = TracingObserver {
        uid,
        health: state.health.as_deref(),
    };
    let verdict = validate_observed(&labels, &state.policy, &mut observer);

    match verdict {
        Verdict::Accepted => {
            state.record(ENDPOINT_VALIDATE_PODS, Outcome::Accepted, started);
            (
                StatusCode::OK,
                Json(AdmissionResponse::from(&request).into_review()),
            )
        }
        Verdict::Rejected { reason, .. } => {
            warn!(uid = %uid, message = %reason, "Admission request denied");
            state.record(ENDPOINT_VALIDATE_PODS, Outcome::Rejected, started);
            (
                StatusCode::OK,
                Json(AdmissionResponse::from(&request).deny(reason).into_review()),
            )
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate", post(validate))
        .route("/validate_settings", post(validate_settings_handler))
        .route("/validate-pods", post(validate_pods))
        .with_state(state)
}

/// Errors that can occur when running the webhook server
#[derive(Debug)]
pub enum WebhookError {
    /// TLS configuration error
    TlsConfig(String),
    /// Policy settings error
    Settings(String),
    /// Server error
    Server(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::TlsConfig(msg) => write!(f, "TLS configuration error: {}", msg),
            WebhookError::Settings(msg) => write!(f, "Policy settings error: {}", msg),
            WebhookError::Server(msg) => write!(f, "Webhook server error: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Run the webhook server
///
/// Binds to 0.0.0.0 on the configured port. Readiness is reported through
/// `health` once the listener is set up.
pub async fn run_webhook_server(
    config: &Config,
    health: Option<Arc<HealthState>>,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;

    let policy = config
        .policy()
        .map_err(|e| WebhookError::Settings(e.to_string()))?;
    let state = Arc::new(WebhookState::new(policy, health.clone()));
    let app = create_webhook_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));

    if config.tls_available() {
        let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
            .await
            .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

        info!(port = config.webhook_port, "Webhook server listening with TLS");
        mark_ready(health.as_deref()).await;

        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await
            .map_err(|e| WebhookError::Server(e.to_string()))?;
    } else {
        warn!(
            cert_path = %config.cert_path.display(),
            key_path = %config.key_path.display(),
            "Webhook certificates not found, serving plain HTTP"
        );
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| WebhookError::Server(e.to_string()))?;

        info!(port = config.webhook_port, "Webhook server listening");
        mark_ready(health.as_deref()).await;

        axum::serve(listener, app)
            .await
            .map_err(|e| WebhookError::Server(e.to_string()))?;
    }

    Ok(())
}

async fn mark_ready(health: Option<&HealthState>) {
    if let Some(health) = health {
        health.set_ready(true).await;
    }
}
