use std::time::Duration;

use base64::{Engine, prelude::BASE64_STANDARD};
use mockito::Matcher;
use pixbatch_core::{ClientError, EditRequest, EditingClient, ModelKind, RetouchKind};
use pixbatch_network::{ApiConfig, BananaClient, ConfigError, DoubaoClient, clients_from_config};
use serde_json::json;

const TIMEOUT: Duration = Duration::from_secs(5);

fn retouch_request() -> EditRequest {
    EditRequest::Retouch {
        edit_type: RetouchKind::Enhance,
        smooth: 0.5,
        whiten: 0.25,
    }
}

#[tokio::test]
async fn doubao_sends_parameters_and_decodes_image() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/edit")
        .match_header("authorization", "Bearer doubao-key")
        .match_body(Matcher::PartialJson(json!({
            "image": BASE64_STANDARD.encode(b"source-png"),
            "edit_type": "enhance",
            "smooth": 0.5,
            "whiten": 0.25,
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "image": BASE64_STANDARD.encode(b"edited") }).to_string())
        .create_async()
        .await;

    let client = DoubaoClient::new(format!("{}/edit", server.url()), "doubao-key");
    let edited = client
        .edit(b"source-png", &retouch_request(), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(edited, b"edited");
    mock.assert_async().await;
}

#[tokio::test]
async fn banana_sends_prompt_and_model_key() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/style")
        .match_header("authorization", "Bearer banana-key")
        .match_body(Matcher::PartialJson(json!({
            "model_key": "anime-v2",
            "prompt": "watercolor",
        })))
        .with_status(200)
        .with_body(json!({ "image": BASE64_STANDARD.encode(b"styled") }).to_string())
        .create_async()
        .await;

    let client = BananaClient::new(format!("{}/style", server.url()), "banana-key", "anime-v2");
    let request = EditRequest::Style {
        prompt: "watercolor".into(),
    };
    let edited = client.edit(b"png", &request, TIMEOUT).await.unwrap();

    assert_eq!(edited, b"styled");
    mock.assert_async().await;
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/edit")
        .with_status(401)
        .with_body("bad key")
        .create_async()
        .await;

    let client = DoubaoClient::new(format!("{}/edit", server.url()), "wrong");
    let err = client
        .edit(b"png", &retouch_request(), TIMEOUT)
        .await
        .unwrap_err();

    match err {
        ClientError::Status { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn response_without_image_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/edit")
        .with_status(200)
        .with_body(r#"{"status":"queued"}"#)
        .create_async()
        .await;

    let client = DoubaoClient::new(format!("{}/edit", server.url()), "key");
    let err = client
        .edit(b"png", &retouch_request(), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::MalformedResponse(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    // Port 9 (discard) on localhost is practically never listening.
    let client = DoubaoClient::new("http://127.0.0.1:9/edit", "key");
    let err = client
        .edit(b"png", &retouch_request(), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Transport(_) | ClientError::Timeout(_)
    ));
}

#[tokio::test]
async fn provider_rejects_requests_for_other_models() {
    let client = DoubaoClient::new("http://127.0.0.1:9/edit", "key");
    let request = EditRequest::Style {
        prompt: "x".into(),
    };
    assert!(client.edit(b"png", &request, TIMEOUT).await.is_err());
}

#[test]
fn registry_includes_only_configured_providers() {
    let config = ApiConfig {
        doubao_api_url: "http://doubao".into(),
        doubao_api_key: "k".into(),
        ..Default::default()
    };

    let clients = clients_from_config(&config, None).unwrap();
    assert!(clients.get(ModelKind::Retouch).is_some());
    assert!(clients.get(ModelKind::Style).is_none());

    let err = clients_from_config(&config, Some(ModelKind::Style)).unwrap_err();
    assert!(matches!(err, ConfigError::Missing { var: "BANANA_API_URL" }));

    let only = clients_from_config(&config, Some(ModelKind::Retouch)).unwrap();
    assert_eq!(only.get(ModelKind::Retouch).unwrap().name(), "doubao");
}
