//! 传输层模块：定义与提供商通信的抽象接口及 HTTP 参考实现。
//!
//! # Transport Module
//!
//! The orchestrator never speaks a provider's wire format itself. Provider instances build
//! a normalized JSON body and hand it to a [`ProviderTransport`], which is responsible for
//! delivery and for mapping failures onto typed errors (status code, retry hint).
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ProviderTransport`] | Async seam every provider call goes through |
//! | [`Endpoint`] | Where a call goes and with which credential |
//! | [`StreamChunk`] | One decoded streaming chunk, or the end marker |
//! | [`HttpTransport`] | `reqwest` reference implementation with SSE-style streaming |

pub mod http;

pub use http::HttpTransport;

use crate::{BoxStream, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Target of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub path: String,
    pub credential: Option<String>,
}

impl Endpoint {
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }
}

/// A decoded chunk of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Data(Value),
    /// Explicit end-of-stream marker sent by the provider.
    End,
}

#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Sends one request and returns the decoded response body.
    ///
    /// Non-success responses must surface as typed errors carrying the status code
    /// (see [`crate::Error::from_status`]).
    async fn send(&self, endpoint: &Endpoint, body: &Value) -> Result<Value>;

    /// Opens a streamed response. The returned stream is `'static` so it can be driven by a
    /// spawned producer task.
    async fn send_stream(
        &self,
        endpoint: &Endpoint,
        body: &Value,
    ) -> Result<BoxStream<'static, StreamChunk>>;
}
