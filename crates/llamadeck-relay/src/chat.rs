//! Chat relay
//!
//! Opens one streaming `/api/chat` call per request and re-emits the text of
//! every NDJSON record as soon as it is framed. Cancellation is observed while
//! waiting on the daemon, so a stalled upstream never pins the relay.

use std::sync::Arc;

use futures::{stream::BoxStream, StreamExt};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    framer::{decode_json, frame_stream, FrameMode},
    models::{ChatDelta, ChatRequest, RelayOutcome},
    upstream::{ChatUpstream, SamplingOptions, UpstreamChatRequest},
    Result,
};

/// Sampling constants applied to every chat
pub const SAMPLING: SamplingOptions = SamplingOptions {
    temperature: 0.7,
    top_k: 40,
    top_p: 0.9,
};

/// Lazily produced text deltas of one assistant reply
///
/// Ends with at most one `Err` item when the upstream fails mid-flight.
pub type ChatStream = BoxStream<'static, Result<ChatDelta>>;

#[derive(Debug, Deserialize)]
struct UpstreamChatChunk {
    #[serde(default)]
    message: Option<UpstreamChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl UpstreamChatChunk {
    fn into_delta(self) -> Option<ChatDelta> {
        self.message
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
    }
}

/// Relays chat requests to the daemon
#[derive(Clone)]
pub struct ChatRelay {
    upstream: Arc<dyn ChatUpstream>,
}

impl ChatRelay {
    pub fn new(upstream: Arc<dyn ChatUpstream>) -> Self {
        Self { upstream }
    }

    /// Start relaying `request`.
    ///
    /// Fails before producing anything when the request is invalid or the
    /// upstream call cannot be established. Cancelling `cancel` aborts the
    /// upstream call and ends the stream quietly.
    pub async fn relay_chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatStream> {
        request.validate()?;

        let model = request.model.clone();
        let upstream_request = UpstreamChatRequest {
            model: request.model,
            messages: request.messages,
            stream: true,
            options: SAMPLING,
        };

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(model = %model, "Chat cancelled before the daemon responded");
                return Ok(futures::stream::empty().boxed());
            }
            opened = self.upstream.open_chat(&upstream_request) => opened?,
        };

        info!(model = %model, "Chat stream opened");

        let mut records = frame_stream(body, FrameMode::Lines);
        let deltas = async_stream::stream! {
            let mut delivered = 0usize;
            let outcome = loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break RelayOutcome::Cancelled,
                    next = records.next() => next,
                };

                match next {
                    None => break RelayOutcome::Completed,
                    Some(Ok(record)) => {
                        let Some(chunk) = decode_json::<UpstreamChatChunk>(&record) else {
                            continue;
                        };
                        if let Some(message) = &chunk.error {
                            warn!(model = %model, error = %message, "Daemon reported an error record");
                        }
                        let done = chunk.done;
                        if let Some(delta) = chunk.into_delta() {
                            if cancel.is_cancelled() {
                                break RelayOutcome::Cancelled;
                            }
                            delivered += 1;
                            yield Ok(delta);
                        }
                        if done {
                            debug!(model = %model, "Daemon marked the reply done");
                        }
                    }
                    Some(Err(e)) => {
                        if cancel.is_cancelled() {
                            break RelayOutcome::Cancelled;
                        }
                        error!(model = %model, error = %e, "Chat stream failed mid-flight");
                        let message = e.to_string();
                        yield Err(e);
                        break RelayOutcome::Failed(message);
                    }
                }
            };

            info!(model = %model, delivered, outcome = ?outcome, "Chat relay finished");
        };

        Ok(deltas.boxed())
    }
}

impl std::fmt::Debug for ChatRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRelay").finish_non_exhaustive()
    }
}
