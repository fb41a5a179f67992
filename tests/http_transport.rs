//! HTTP transport against a local mock server.

use ai_lib_orchestrator::provider::ProviderConfig;
use ai_lib_orchestrator::resilience::RetryConfig;
use ai_lib_orchestrator::transport::{Endpoint, HttpTransport, ProviderTransport, StreamChunk};
use ai_lib_orchestrator::{ChatRequest, ErrorKind, ProviderRegistry};
use futures::StreamExt;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const CHAT_PATH: &str = "/chat/completions";

fn endpoint(server: &ServerGuard) -> Endpoint {
    Endpoint {
        provider: "openai".to_string(),
        model: "gpt-4o-mini".to_string(),
        base_url: server.url(),
        path: "chat/completions".to_string(),
        credential: Some("sk-test".to_string()),
    }
}

fn transport() -> HttpTransport {
    HttpTransport::with_client(reqwest::Client::new())
}

#[tokio::test]
async fn test_send_posts_json_with_bearer_auth() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", CHAT_PATH)
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({ "model": "gpt-4o-mini" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"chatcmpl-1","choices":[{"message":{"content":"hello"}}]}"#)
        .create_async()
        .await;

    let value = transport()
        .send(&endpoint(&server), &json!({ "model": "gpt-4o-mini", "messages": [] }))
        .await
        .unwrap();
    assert_eq!(value["choices"][0]["message"]["content"], "hello");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", CHAT_PATH)
        .with_status(429)
        .with_header("retry-after", "7")
        .with_body(r#"{"error":{"message":"slow down"}}"#)
        .create_async()
        .await;

    let err = transport()
        .send(&endpoint(&server), &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(err.status_code(), Some(429));
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    assert!(err.to_string().contains("slow down"));
}

#[tokio::test]
async fn test_absurd_retry_after_is_ignored() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", CHAT_PATH)
        .with_status(429)
        .with_header("retry-after", "1e300")
        .with_body("throttled")
        .create_async()
        .await;

    let err = transport()
        .send(&endpoint(&server), &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(err.retry_after(), None);
}

#[tokio::test]
async fn test_status_codes_map_to_kinds() {
    let cases = [
        (400, ErrorKind::Validation),
        (401, ErrorKind::Authentication),
        (503, ErrorKind::ServerError),
        (504, ErrorKind::Timeout),
    ];
    for (status, kind) in cases {
        let mut server = Server::new_async().await;
        server
            .mock("POST", CHAT_PATH)
            .with_status(status)
            .with_body("upstream says no")
            .create_async()
            .await;
        let err = transport()
            .send(&endpoint(&server), &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "status {}", status);
    }
}

#[tokio::test]
async fn test_stream_decodes_events_until_done() {
    let mut server = Server::new_async().await;
    let body = concat!(
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    server
        .mock("POST", CHAT_PATH)
        .match_header("accept", "text/event-stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let chunks: Vec<StreamChunk> = transport()
        .send_stream(&endpoint(&server), &json!({ "stream": true }))
        .await
        .unwrap()
        .map(|c| c.unwrap())
        .collect()
        .await;
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0], StreamChunk::Data(json!({"choices":[{"delta":{"content":"Hel"}}]})));
    assert_eq!(chunks[2], StreamChunk::End);
}

#[tokio::test]
async fn test_registry_instance_round_trip_over_http() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", CHAT_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id":"c1","choices":[{"message":{"content":"pong"},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":4,"completion_tokens":1}}"#,
        )
        .create_async()
        .await;

    let registry = ProviderRegistry::with_builtin(Arc::new(transport()));
    let config = ProviderConfig::new("openai")
        .with_model("gpt-4o-mini")
        .with_credential("sk-test")
        .with_base_url(server.url())
        .with_retry(RetryConfig::disabled());
    let instance = registry.get_provider(&config).await.unwrap();

    let response = instance.chat_completion(&ChatRequest::user("ping")).await.unwrap();
    assert_eq!(response.content, "pong");
    assert_eq!(response.provider, "openai");
    assert_eq!(response.usage.total_tokens(), 5);
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
}
