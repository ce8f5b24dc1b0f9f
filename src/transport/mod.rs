//! Transport seam between the bridge and the backend channel.
//!
//! The bridge only ever sees the [`ChannelTransport`] trait: a reconnecting,
//! topic-scoped pub/sub connection that delivers named events and accepts
//! named pushes with asynchronous acknowledgements. The production
//! implementation is [`PhoenixTransport`]; tests substitute fakes.

mod phoenix;

pub use phoenix::{PhoenixConfig, PhoenixTransport};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur submitting work to a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection task has shut down.
    #[error("transport channel closed")]
    ChannelClosed,
}

/// Lifecycle and message events emitted by a transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Socket connection established.
    Opened,
    /// Socket connection closed.
    Closed,
    /// Socket-level error.
    Errored,
    /// Channel join acknowledged by the backend.
    JoinOk,
    /// Channel join rejected by the backend.
    JoinError(Value),
    /// Named event delivered on the joined topic.
    Message { event: String, payload: Value },
}

/// Acknowledgement for an outbound push.
#[derive(Debug, Clone)]
pub enum PushAck {
    Ok(Value),
    Error(Value),
}

/// Pending acknowledgement for an outbound push.
///
/// The backend may never reply; a dropped sender is silence, not failure.
#[derive(Debug)]
pub struct PushHandle {
    ack: oneshot::Receiver<PushAck>,
}

impl PushHandle {
    pub fn new(ack: oneshot::Receiver<PushAck>) -> Self {
        Self { ack }
    }

    /// Wait for the acknowledgement, if one ever arrives.
    pub async fn ack(self) -> Option<PushAck> {
        self.ack.await.ok()
    }
}

/// A reconnecting, topic-scoped pub/sub connection.
///
/// Reconnection and backoff live entirely behind this trait; consumers react
/// to the event stream and never retry on their own.
#[async_trait]
pub trait ChannelTransport: Send + Sync + 'static {
    /// Subscribe to the transport's event stream.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    /// Request the channel join. The outcome arrives on the event stream as
    /// [`TransportEvent::JoinOk`] or [`TransportEvent::JoinError`], and the
    /// transport rejoins on its own after every reconnect.
    async fn join(&self) -> TransportResult<()>;

    /// Push a named event with a JSON payload.
    async fn push(&self, event: &str, payload: Value) -> TransportResult<PushHandle>;
}
