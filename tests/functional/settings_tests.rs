//! `/validate_settings` endpoint.

use pod_label_policy::policy::PolicyConfiguration;
use serde_json::json;

use crate::client::TestServer;
use crate::common::fixtures::PolicyBuilder;

#[tokio::test]
async fn test_valid_settings() {
    let server = TestServer::new(PolicyConfiguration::default());
    let settings = PolicyBuilder::new()
        .deny("secret")
        .constrain("owner", "^team-")
        .to_json();

    let (_, body) = server
        .post("/validate_settings", settings.to_string())
        .await;
    assert_eq!(body, json!({ "valid": true }));
}

#[tokio::test]
async fn test_empty_settings_are_valid() {
    let server = TestServer::new(PolicyConfiguration::default());
    let (_, body) = server.post("/validate_settings", "{}").await;
    assert_eq!(body["valid"], true);
}

#[tokio::test]
async fn test_invalid_pattern() {
    let server = TestServer::new(PolicyConfiguration::default());
    let settings = PolicyBuilder::new().constrain("owner", "*").to_json();

    let (_, body) = server
        .post("/validate_settings", settings.to_string())
        .await;
    assert_eq!(body["valid"], false);
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Provided settings are not valid:"));
    assert!(message.contains("owner"));
}

#[tokio::test]
async fn test_overlapping_labels() {
    let server = TestServer::new(PolicyConfiguration::default());
    let settings = PolicyBuilder::new()
        .deny("owner")
        .constrain("owner", ".*")
        .to_json();

    let (_, body) = server
        .post("/validate_settings", settings.to_string())
        .await;
    assert_eq!(body["valid"], false);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("cannot be constrained and denied")
    );
}

#[tokio::test]
async fn test_not_json() {
    let server = TestServer::new(PolicyConfiguration::default());
    let (_, body) = server.post("/validate_settings", "denied_labels: []").await;
    assert_eq!(body["valid"], false);
}
