//! `/validate` endpoint: settings travel with every request.

use axum::http::StatusCode;
use pod_label_policy::policy::PolicyConfiguration;
use serde_json::json;

use crate::client::TestServer;
use crate::common::fixtures::{EnvelopeBuilder, PolicyBuilder};

fn server() -> TestServer {
    TestServer::new(PolicyConfiguration::default())
}

#[tokio::test]
async fn test_accepts_pod_without_policy() {
    let server = server();
    let payload = EnvelopeBuilder::new().labels(&[("env", "prod")]).build();

    let (status, body) = server.post("/validate", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "accepted": true }));
}

#[tokio::test]
async fn test_rejects_denied_label() {
    let server = server();
    let payload = EnvelopeBuilder::new()
        .labels(&[("team", "x")])
        .policy(&PolicyBuilder::new().deny("team"))
        .build();

    let (status, body) = server.post("/validate", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "accepted": false, "message": "label team is on the deny list" })
    );
    assert!(server.metrics().contains("kind=\"denied_label\""));
}

#[tokio::test]
async fn test_rejects_constraint_violation() {
    let server = server();
    let payload = EnvelopeBuilder::new()
        .labels(&[("tier", "abc")])
        .policy(&PolicyBuilder::new().constrain("tier", "^[0-9]+$"))
        .build();

    let (_, body) = server.post("/validate", payload).await;
    assert_eq!(body["accepted"], false);
    assert_eq!(
        body["message"],
        "the value of tier doesn't pass user-defined constraint"
    );
    assert!(body.get("code").is_none());
}

#[tokio::test]
async fn test_rejects_missing_required_label() {
    let server = server();
    let payload = EnvelopeBuilder::new()
        .policy(&PolicyBuilder::new().constrain("owner", ".*"))
        .build();

    let (_, body) = server.post("/validate", payload).await;
    assert_eq!(body["message"], "constrained label owner not found");
}

#[tokio::test]
async fn test_violation_wins_over_missing_label() {
    let server = server();
    let payload = EnvelopeBuilder::new()
        .labels(&[("secret", "1")])
        .policy(&PolicyBuilder::new().deny("secret").constrain("owner", ".*"))
        .build();

    let (_, body) = server.post("/validate", payload).await;
    assert_eq!(body["message"], "label secret is on the deny list");
}

#[tokio::test]
async fn test_malformed_envelope_is_bad_request() {
    let server = server();

    let (status, body) = server.post("/validate", "{ not json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], false);
    assert_eq!(body["code"], 400);
    assert!(server.metrics().contains("outcome=\"invalid\""));
}

#[tokio::test]
async fn test_invalid_settings_is_bad_request() {
    let server = server();
    let payload = EnvelopeBuilder::new()
        .labels(&[("owner", "a")])
        .settings(json!({ "constrained_labels": { "owner": "(unclosed" } }))
        .build();

    let (_, body) = server.post("/validate", payload).await;
    assert_eq!(body["accepted"], false);
    assert_eq!(body["code"], 400);
    assert!(body["message"].as_str().unwrap().contains("owner"));
}

#[tokio::test]
async fn test_non_string_label_is_bad_request() {
    let server = server();
    let payload = EnvelopeBuilder::new()
        .raw_labels(json!({ "replicas": 3 }))
        .build();

    let (_, body) = server.post("/validate", payload).await;
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_delete_is_accepted() {
    let server = server();
    let payload = EnvelopeBuilder::new()
        .operation("DELETE")
        .policy(&PolicyBuilder::new().constrain("owner", ".*"))
        .build();

    let (_, body) = server.post("/validate", payload).await;
    assert_eq!(body["accepted"], true);
}

#[tokio::test]
async fn test_same_request_same_response() {
    let server = server();
    let payload = EnvelopeBuilder::new()
        .labels(&[("a", "1"), ("b", "2")])
        .policy(&PolicyBuilder::new().deny("a").deny("b"))
        .build();

    let (_, first) = server.post("/validate", payload.clone()).await;
    let (_, second) = server.post("/validate", payload).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unrelated_metadata_is_not_validated() {
    let server = server();
    let mut envelope = EnvelopeBuilder::new()
        .labels(&[("owner", "team-a")])
        .policy(&PolicyBuilder::new().constrain("owner", "^team-"))
        .to_json();
    envelope["request"]["object"]["metadata"]["annotations"] = json!({ "x": 5 });

    let (_, body) = server.post("/validate", envelope.to_string()).await;
    assert_eq!(body, json!({ "accepted": true }));
}
