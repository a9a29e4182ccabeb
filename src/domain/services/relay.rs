#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use futures::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::SessionManager;
use crate::domain::models::ClientMessage;
use crate::domain::models::RelayError;
use crate::domain::models::StreamEvent;
use crate::domain::models::TextStream;
use crate::domain::models::STREAM_CHANNEL;

/// A generate request together with the permit that allows it to run.
struct Request {
    message: ClientMessage,
    permit: OwnedSemaphorePermit,
}

enum Flow {
    Continue,
    Cancelled,
}

/// Client end of a relay channel.
pub struct Channel {
    requests: mpsc::Sender<Request>,
    events: mpsc::Receiver<StreamEvent>,
    generation: Arc<Semaphore>,
    cancel: CancellationToken,
    in_flight: bool,
}

impl Channel {
    /// Sends a prompt to the session owner. Fails with `ChannelBusy` if this
    /// or any other channel has a generation running.
    pub async fn generate(&mut self, prompt: &str) -> Result<(), RelayError> {
        if self.cancel.is_cancelled() {
            return Err(RelayError::Closed);
        }
        if self.in_flight {
            return Err(RelayError::ChannelBusy);
        }

        let permit = self
            .generation
            .clone()
            .try_acquire_owned()
            .map_err(|_| return RelayError::ChannelBusy)?;

        let request = Request {
            message: ClientMessage::Generate {
                prompt: prompt.to_string(),
            },
            permit,
        };
        if self.requests.send(request).await.is_err() {
            return Err(RelayError::Closed);
        }

        self.in_flight = true;
        return Ok(());
    }

    /// Waits for the next event of the running request. Returns `None` once
    /// the channel is closed.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let event = self.events.recv().await?;
        if event.is_terminal() {
            self.in_flight = false;
        }

        return Some(event);
    }

    /// Stops any running generation and shuts down the channel.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Streams model output from the shared session to channel clients. Only one
/// generation runs at a time across all channels.
pub struct Relay {
    sessions: Arc<SessionManager>,
    role: String,
    idle_timeout: Option<Duration>,
    generation: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl Relay {
    /// A zero `idle_timeout` disables the timeout.
    pub fn new(sessions: Arc<SessionManager>, role: &str, idle_timeout: Option<Duration>) -> Relay {
        return Relay {
            sessions,
            role: role.to_string(),
            idle_timeout: idle_timeout.filter(|e| return !e.is_zero()),
            generation: Arc::new(Semaphore::new(1)),
            cancel: CancellationToken::new(),
        };
    }

    pub fn is_busy(&self) -> bool {
        return self.generation.available_permits() == 0;
    }

    /// Creates the session ahead of the first request.
    pub async fn prepare(&self) -> Result<(), RelayError> {
        self.sessions.ensure_session(&self.role).await?;
        tracing::debug!(state = %self.sessions.state().await, "Relay prepared");
        return Ok(());
    }

    pub fn connect(&self, name: &str) -> Result<Channel, RelayError> {
        if name != STREAM_CHANNEL {
            return Err(RelayError::UnknownChannel(name.to_string()));
        }
        if self.cancel.is_cancelled() {
            return Err(RelayError::Closed);
        }

        let (requests_tx, requests_rx) = mpsc::channel(1);
        let (events_tx, events_rx) = mpsc::channel(32);
        let cancel = self.cancel.child_token();

        let server = ChannelServer {
            sessions: self.sessions.clone(),
            role: self.role.clone(),
            idle_timeout: self.idle_timeout,
            requests: requests_rx,
            events: events_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(server.serve(name.to_string()));

        return Ok(Channel {
            requests: requests_tx,
            events: events_rx,
            generation: self.generation.clone(),
            cancel,
            in_flight: false,
        });
    }

    /// Opens a channel, sends `prompt` and yields events up to and including
    /// the terminal one. The channel closes when the stream is dropped.
    pub async fn open_stream(
        &self,
        prompt: &str,
    ) -> Result<BoxStream<'static, StreamEvent>, RelayError> {
        let mut channel = self.connect(STREAM_CHANNEL)?;
        channel.generate(prompt).await?;

        let events = stream::unfold(Some(channel), |state| async move {
            let mut channel = state?;
            let event = channel.next_event().await?;
            if event.is_terminal() {
                return Some((event, None));
            }
            return Some((event, Some(channel)));
        });

        return Ok(events.boxed());
    }

    /// Cancels every channel and their running generations.
    pub fn close_all(&self) {
        tracing::debug!(busy = self.is_busy(), "Closing relay");
        self.cancel.cancel();
    }
}

struct ChannelServer {
    sessions: Arc<SessionManager>,
    role: String,
    idle_timeout: Option<Duration>,
    requests: mpsc::Receiver<Request>,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl ChannelServer {
    async fn serve(mut self, name: String) {
        tracing::debug!(channel = %name, "Channel opened");

        loop {
            let request = tokio::select! {
                _ = self.cancel.cancelled() => break,
                request = self.requests.recv() => request,
            };
            let Some(request) = request else {
                break;
            };

            match self.handle(request).await {
                Flow::Continue => {}
                Flow::Cancelled => {
                    tracing::debug!(channel = %name, "Generation cancelled");
                    break;
                }
            }
        }

        tracing::debug!(channel = %name, "Channel closed");
    }

    async fn handle(&mut self, request: Request) -> Flow {
        let Request { message, permit } = request;
        let ClientMessage::Generate { prompt } = message;

        let terminal = match self.generate(&prompt).await {
            Ok(Some(content)) => StreamEvent::Complete(content),
            Ok(None) => return Flow::Cancelled,
            Err(err) => {
                tracing::error!(error = %err, "Generation failed");
                StreamEvent::Error(err)
            }
        };

        // Free the relay before the client sees the end of the request.
        drop(permit);

        if !self.send(terminal).await {
            return Flow::Cancelled;
        }

        return Flow::Continue;
    }

    /// Delivers `event` unless the channel is cancelled first. A client that
    /// stops reading must not keep the generation alive after closing.
    async fn send(&self, event: StreamEvent) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => return false,
            res = self.events.send(event) => return res.is_ok(),
        }
    }

    /// Forwards chunks as they arrive. Returns the full text, or `None` if
    /// the generation was cancelled.
    async fn generate(&mut self, prompt: &str) -> Result<Option<String>, String> {
        let session = self
            .sessions
            .ensure_session(&self.role)
            .await
            .map_err(|err| return err.to_string())?;

        let mut chunks = session
            .prompt_streaming(prompt)
            .await
            .map_err(|err| return err.to_string())?;

        let mut content = String::new();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(None),
                _ = self.events.closed() => return Ok(None),
                next = next_chunk(&mut chunks, self.idle_timeout) => next,
            };

            match next? {
                Some(chunk) => {
                    content.push_str(&chunk);
                    if !self.send(StreamEvent::Chunk(chunk)).await {
                        return Ok(None);
                    }
                }
                None => return Ok(Some(content)),
            }
        }
    }
}

async fn next_chunk(
    chunks: &mut TextStream,
    idle_timeout: Option<Duration>,
) -> Result<Option<String>, String> {
    let next = match idle_timeout {
        Some(idle) => match tokio::time::timeout(idle, chunks.next()).await {
            Ok(next) => next,
            Err(_) => {
                return Err(format!(
                    "Generation timed out after {}ms without output",
                    idle.as_millis()
                ));
            }
        },
        None => chunks.next().await,
    };

    match next {
        Some(Ok(chunk)) => return Ok(Some(chunk)),
        Some(Err(err)) => return Err(err.to_string()),
        None => return Ok(None),
    }
}
