use crate::transport::{Endpoint, ProviderTransport, StreamChunk};
use crate::{BoxStream, Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Proxy;
use serde_json::Value;
use std::env;
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::debug;

/// `reqwest`-backed transport. Sends JSON with bearer auth and reads streamed responses
/// as `data:` lines terminated by `[DONE]`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let timeout_secs = env::var("AI_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(
                env::var("AI_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("AI_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )))
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Ok(proxy_url) = env::var("AI_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder.build().map_err(|e| Error::Configuration {
            message: format!("failed to build HTTP client: {}", e),
            context: ErrorContext::new().with_source("http_transport"),
        })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn request(&self, endpoint: &Endpoint, body: &Value, stream: bool) -> reqwest::RequestBuilder {
        let mut req = self.client.post(endpoint.url()).json(body);
        if let Some(key) = &endpoint.credential {
            req = req.bearer_auth(key);
        }
        if stream {
            req = req.header("accept", "text/event-stream");
        }
        req
    }

    async fn dispatch(&self, endpoint: &Endpoint, body: &Value, stream: bool) -> Result<reqwest::Response> {
        let resp = self
            .request(endpoint, body, stream)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let retry_after = parse_retry_after(resp.headers());
        let text = resp.text().await.unwrap_or_default();
        debug!(
            provider = %endpoint.provider,
            http_status = status.as_u16(),
            "provider returned non-success status"
        );
        Err(Error::from_status(status.as_u16(), error_message(&text), retry_after))
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn send(&self, endpoint: &Endpoint, body: &Value) -> Result<Value> {
        let resp = self.dispatch(endpoint, body, false).await?;
        let bytes: Bytes = resp.bytes().await.map_err(map_reqwest_error)?;
        if bytes.is_empty() {
            return Err(Error::Serialization {
                message: "empty response body".to_string(),
                context: ErrorContext::new()
                    .with_provider(&endpoint.provider)
                    .with_model(&endpoint.model),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_stream(
        &self,
        endpoint: &Endpoint,
        body: &Value,
    ) -> Result<BoxStream<'static, StreamChunk>> {
        let resp = self.dispatch(endpoint, body, true).await?;
        let bytes = resp
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let lines = FramedRead::new(StreamReader::new(bytes), LinesCodec::new());

        let chunks = lines.filter_map(|line| async move {
            match line {
                Ok(line) => parse_sse_line(&line),
                Err(e) => Some(Err(Error::network(format!("stream read failed: {}", e)))),
            }
        });
        Ok(Box::pin(chunks))
    }
}

/// Decodes one line of an event stream. Comments, blank lines and non-data fields yield
/// nothing.
pub(crate) fn parse_sse_line(line: &str) -> Option<Result<StreamChunk>> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(StreamChunk::End));
    }
    Some(
        serde_json::from_str::<Value>(data)
            .map(StreamChunk::Data)
            .map_err(Error::from),
    )
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let secs = raw.parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// Pulls a readable message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn map_reqwest_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            after: Duration::ZERO,
            context: ErrorContext::new()
                .with_source("http_transport")
                .with_details(e.to_string()),
        }
    } else if e.is_decode() {
        Error::Serialization {
            message: e.to_string(),
            context: ErrorContext::new().with_source("http_transport"),
        }
    } else {
        Error::Network {
            message: e.to_string(),
            context: ErrorContext::new().with_source("http_transport"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_sse_line() {
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line("event: message").is_none());
        assert!(matches!(parse_sse_line("data: [DONE]"), Some(Ok(StreamChunk::End))));
        match parse_sse_line(r#"data: {"a":1}"#) {
            Some(Ok(StreamChunk::Data(v))) => assert_eq!(v["a"], 1),
            other => panic!("unexpected {:?}", other.map(|r| r.is_ok())),
        }
        assert!(matches!(parse_sse_line("data: {broken"), Some(Err(_))));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(3)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_parse_retry_after_rejects_unrepresentable_values() {
        let mut headers = HeaderMap::new();
        for raw in ["1e300", "-1", "NaN", "inf"] {
            headers.insert(RETRY_AFTER, HeaderValue::from_static(raw));
            assert_eq!(parse_retry_after(&headers), None, "value {}", raw);
        }
        headers.insert(RETRY_AFTER, HeaderValue::from_static("0.5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":{"message":"bad key","type":"auth"}}"#),
            "bad key"
        );
        assert_eq!(error_message(r#"{"message":"slow down"}"#), "slow down");
        assert_eq!(error_message("  upstream exploded "), "upstream exploded");
    }
}
