//! Cancellable streaming responses.
//!
//! A spawned producer pumps the transport stream into a bounded channel; the consumer reads
//! [`ChatStream`]. Dropping the stream or firing its [`CancelHandle`] stops the producer,
//! which drops the transport stream and releases the connection.

use crate::provider::payload;
use crate::transport::StreamChunk;
use crate::types::StreamEvent;
use crate::{BoxStream, Error, Result};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) const DEFAULT_STREAM_BUFFER: usize = 64;

/// Handle that aborts an in-flight stream from anywhere.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Lazy, finite, non-restartable sequence of [`StreamEvent`]s.
///
/// Ends after `Done`, after the first error, or once cancelled.
pub struct ChatStream {
    rx: mpsc::Receiver<Result<StreamEvent>>,
    token: CancellationToken,
    producer: JoinHandle<()>,
}

impl ChatStream {
    pub(crate) fn spawn(
        upstream: BoxStream<'static, StreamChunk>,
        provider: String,
        model: String,
        buffer: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let token = CancellationToken::new();
        let child = token.clone();

        let producer = tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {
                    debug!(provider = %provider, model = %model, "stream cancelled by consumer");
                }
                _ = pump(upstream, tx, &provider, &model) => {}
            }
        });

        Self {
            rx,
            token,
            producer,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.token.clone(),
        }
    }

    /// Drains the stream and concatenates every text delta.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(event) = self.next().await {
            if let StreamEvent::Delta { content } = event? {
                out.push_str(&content);
            }
        }
        Ok(out)
    }
}

async fn pump(
    mut upstream: BoxStream<'static, StreamChunk>,
    tx: mpsc::Sender<Result<StreamEvent>>,
    provider: &str,
    model: &str,
) {
    let mut finish_reason = None;
    while let Some(item) = upstream.next().await {
        match item {
            Ok(StreamChunk::Data(value)) => {
                let (events, reason) = payload::parse_stream_chunk(value);
                if reason.is_some() {
                    finish_reason = reason;
                }
                for event in events {
                    if tx.send(Ok(event)).await.is_err() {
                        return;
                    }
                }
            }
            Ok(StreamChunk::End) => {
                let _ = tx.send(Ok(StreamEvent::Done { finish_reason })).await;
                return;
            }
            Err(e) => {
                let _ = tx.send(Err(e.with_provider(provider, model))).await;
                return;
            }
        }
    }
    let _ = tx
        .send(Err(Error::network("stream ended without an end marker").with_provider(provider, model)))
        .await;
}

impl Stream for ChatStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.token.cancel();
        self.producer.abort();
    }
}
