//! Download relay
//!
//! Runs the daemon's pull command as a child process and turns its output
//! into [`PullEvent`]s: stdout lines become progress, stderr lines become
//! errors, and the exit status decides the terminal event. A background task
//! drives the child and owns the registry lease; the caller receives a
//! [`PullStream`] fed through a bounded channel.
//!
//! The model is free again by the time the consumer sees the terminal event
//! or the end of a cancelled stream.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt};
use llamadeck_process::{ManagedChild, ProcessConfig, ProcessManager};
use tokio::{io::AsyncRead, sync::mpsc};
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing::{debug, error, info, warn};

use crate::{
    commands::DaemonCommands,
    framer::{frame_stream, FrameMode},
    models::{PullEvent, RelayOutcome},
    progress::{parse_progress, strip_control_sequences},
    registry::{DownloadHandle, DownloadRegistry},
    Result,
};

/// Events buffered between the driver task and the consumer
const EVENT_BUFFER: usize = 64;

pub const PULL_COMPLETE_MESSAGE: &str = "Model pulled successfully";
pub const PULL_FAILED_MESSAGE: &str = "Failed to pull model";

type LineStream = Pin<Box<dyn Stream<Item = std::io::Result<String>> + Send>>;

/// Relays model downloads, at most one per model
#[derive(Debug, Clone)]
pub struct DownloadRelay {
    registry: DownloadRegistry,
    commands: DaemonCommands,
}

impl DownloadRelay {
    pub fn new(registry: DownloadRegistry, commands: DaemonCommands) -> Self {
        Self { registry, commands }
    }

    pub fn registry(&self) -> &DownloadRegistry {
        &self.registry
    }

    /// Start pulling `model`.
    ///
    /// Fails with `AlreadyInProgress` when a pull of the same model is active,
    /// before any process is started. The returned stream ends after the
    /// terminal event, or as soon as `cancel` fires. Dropping the stream
    /// cancels the pull.
    pub fn relay_pull(&self, model: &str, cancel: CancellationToken) -> Result<PullStream> {
        let config = self.commands.pull_config(model)?;
        let handle = self.registry.try_register_with(model, &cancel)?;
        let token = handle.token().clone();
        let generation = handle.generation();
        let (events, receiver) = mpsc::channel(EVENT_BUFFER);

        info!(model = %model, command = %config.display(), "Starting model pull");
        tokio::spawn(drive_pull(
            *self.commands.processes(),
            config,
            handle,
            events,
        ));

        Ok(PullStream {
            model_id: model.to_string(),
            events: receiver,
            token,
            registry: self.registry.clone(),
            generation,
            last: None,
            outcome: None,
        })
    }

    /// Cancel an in-flight pull. Returns false when none was active.
    pub fn cancel(&self, model: &str) -> bool {
        self.registry.cancel(model)
    }

    /// Models currently being pulled
    pub fn active(&self) -> Vec<String> {
        self.registry.active()
    }
}

/// Pull events of one download, in arrival order
///
/// Dropping the stream cancels the download.
pub struct PullStream {
    model_id: String,
    events: mpsc::Receiver<PullEvent>,
    token: CancellationToken,
    registry: DownloadRegistry,
    generation: u64,
    last: Option<RelayOutcome>,
    outcome: Option<RelayOutcome>,
}

impl PullStream {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Cancel the download and free the model; the stream yields nothing further
    pub fn cancel(&self) {
        self.token.cancel();
        self.release();
    }

    /// How the download ended, once the stream has finished
    pub fn outcome(&self) -> Option<&RelayOutcome> {
        self.outcome.as_ref()
    }

    // The driver may still be killing the child; its own release is then a no-op.
    fn release(&self) {
        self.registry.release_generation(&self.model_id, self.generation);
    }
}

impl Stream for PullStream {
    type Item = PullEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.outcome.is_some() {
            return Poll::Ready(None);
        }
        if this.token.is_cancelled() {
            this.release();
            this.outcome = Some(RelayOutcome::Cancelled);
            return Poll::Ready(None);
        }

        match this.events.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                this.last = match &event {
                    PullEvent::Progress { .. } => None,
                    PullEvent::Error { text } => Some(RelayOutcome::Failed(text.clone())),
                    PullEvent::Complete { .. } => Some(RelayOutcome::Completed),
                };
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                // Without a terminal event the driver only stops on cancellation.
                this.outcome = Some(this.last.take().unwrap_or(RelayOutcome::Cancelled));
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PullStream {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            self.token.cancel();
            self.release();
        }
    }
}

impl std::fmt::Debug for PullStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullStream")
            .field("model_id", &self.model_id)
            .field("cancelled", &self.token.is_cancelled())
            .field("outcome", &self.outcome)
            .finish()
    }
}

async fn drive_pull(
    processes: ProcessManager,
    config: ProcessConfig,
    handle: DownloadHandle,
    events: mpsc::Sender<PullEvent>,
) {
    let model = handle.model_id().to_string();
    let token = handle.token().clone();

    let (outcome, terminal) = run_pull(&processes, config, &model, &token, &events).await;
    match &outcome {
        RelayOutcome::Completed => info!(model = %model, "Model pull completed"),
        RelayOutcome::Failed(reason) => warn!(model = %model, reason = %reason, "Model pull failed"),
        RelayOutcome::Cancelled => info!(model = %model, "Model pull cancelled"),
    }

    // Free the model before the consumer can see the terminal event.
    handle.release();
    if let Some(event) = terminal {
        emit(&events, &token, event).await;
    }
}

/// Drive the child to exit. Returns the outcome and the terminal event still
/// to be delivered; cancelled pulls have none.
async fn run_pull(
    processes: &ProcessManager,
    config: ProcessConfig,
    model: &str,
    token: &CancellationToken,
    events: &mpsc::Sender<PullEvent>,
) -> (RelayOutcome, Option<PullEvent>) {
    let mut child = match processes.spawn(config).await {
        Ok(child) => child,
        Err(e) => {
            error!(model = %model, error = %e, "Failed to start pull command");
            let event = PullEvent::Error {
                text: format!("Failed to start pull command: {}", e),
            };
            return (RelayOutcome::Failed(e.to_string()), Some(event));
        }
    };

    let mut progress = line_stream(child.stdout());
    let mut diagnostics = line_stream(child.stderr());
    let mut progress_open = true;
    let mut diagnostics_open = true;

    while progress_open || diagnostics_open {
        tokio::select! {
            biased;
            _ = token.cancelled() => return (stop_child(&mut child, model).await, None),
            line = progress.next(), if progress_open => match line {
                Some(Ok(line)) => {
                    let Some(update) = parse_progress(&line) else {
                        continue;
                    };
                    let event = PullEvent::Progress {
                        text: update.text,
                        percent: update.percent,
                    };
                    if !emit(events, token, event).await {
                        return (stop_child(&mut child, model).await, None);
                    }
                }
                Some(Err(e)) => {
                    warn!(model = %model, error = %e, "Failed to read pull progress");
                    progress_open = false;
                }
                None => progress_open = false,
            },
            line = diagnostics.next(), if diagnostics_open => match line {
                Some(Ok(line)) => {
                    let text = strip_control_sequences(&line).trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    debug!(model = %model, stderr = %text, "Pull diagnostic");
                    if !emit(events, token, PullEvent::Error { text }).await {
                        return (stop_child(&mut child, model).await, None);
                    }
                }
                Some(Err(e)) => {
                    warn!(model = %model, error = %e, "Failed to read pull diagnostics");
                    diagnostics_open = false;
                }
                None => diagnostics_open = false,
            },
        }
    }

    let status = tokio::select! {
        biased;
        _ = token.cancelled() => return (stop_child(&mut child, model).await, None),
        status = child.wait() => status,
    };

    let failed = || PullEvent::Error {
        text: PULL_FAILED_MESSAGE.to_string(),
    };
    match status {
        Ok(status) if status.success() => (
            RelayOutcome::Completed,
            Some(PullEvent::Complete {
                text: PULL_COMPLETE_MESSAGE.to_string(),
            }),
        ),
        Ok(status) => (
            RelayOutcome::Failed(format!("pull command exited with {}", status)),
            Some(failed()),
        ),
        Err(e) => (RelayOutcome::Failed(e.to_string()), Some(failed())),
    }
}

/// Send one event; false once the download is cancelled or nobody listens
async fn emit(events: &mpsc::Sender<PullEvent>, token: &CancellationToken, event: PullEvent) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

async fn stop_child(child: &mut ManagedChild, model: &str) -> RelayOutcome {
    debug!(model = %model, pid = child.pid(), "Killing pull command");
    if let Err(e) = child.kill_tree().await {
        warn!(model = %model, error = %e, "Failed to kill pull command");
    }
    RelayOutcome::Cancelled
}

fn line_stream<R>(reader: Option<R>) -> LineStream
where
    R: AsyncRead + Send + 'static,
{
    match reader {
        Some(reader) => frame_stream(ReaderStream::new(reader), FrameMode::Lines),
        None => Box::pin(futures::stream::empty()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{config::CommandConfig, error::RelayError};

    fn relay_with(program: &str, script: &str) -> DownloadRelay {
        let commands = DaemonCommands::new(CommandConfig {
            program: program.to_string(),
            pull_args: vec!["-c".to_string(), script.to_string(), "fake-ollama".to_string()],
            ..Default::default()
        })
        .unwrap();
        DownloadRelay::new(DownloadRegistry::new(), commands)
    }

    #[tokio::test]
    async fn test_progress_then_complete() {
        let relay = relay_with("sh", "echo 'pulling manifest'; echo '512 MB / 1 GB'; exit 0");
        let events: Vec<PullEvent> = relay
            .relay_pull("llama3", CancellationToken::new())
            .unwrap()
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                PullEvent::Progress {
                    text: "Pulling manifest...".to_string(),
                    percent: None,
                },
                PullEvent::Progress {
                    text: "512 MB / 1 GB".to_string(),
                    percent: Some(50.0),
                },
                PullEvent::Complete {
                    text: PULL_COMPLETE_MESSAGE.to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_reports_error_and_releases() {
        let relay = relay_with("/nonexistent/llamadeck-fake-ollama", "");
        let events: Vec<PullEvent> = relay
            .relay_pull("llama3", CancellationToken::new())
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "error");
        assert!(relay.registry().try_register("llama3").is_ok());
    }

    #[tokio::test]
    async fn test_invalid_model_name_registers_nothing() {
        let relay = relay_with("sh", "exit 0");
        let result = relay.relay_pull("-rf", CancellationToken::new());
        assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
        assert!(relay.active().is_empty());
    }
}
