//! Phoenix channel client over WebSocket.
//!
//! Speaks the v1 Phoenix frame format: every frame is a JSON object
//! `{topic, event, payload, ref}`. Joining a topic is a `phx_join` push, and
//! the backend answers pushes with `phx_reply` frames carrying
//! `{status, response}` and the originating ref. Heartbeats ride the
//! reserved `phoenix` topic.
//!
//! Reconnection uses a flat interval rather than exponential backoff: the
//! controller expects a handful of simultaneous connections at most, so
//! hammering retry every half second is safe and keeps the UI snappy.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{
    ChannelTransport, PushAck, PushHandle, TransportError, TransportEvent, TransportResult,
};

/// Size of the broadcast channel for transport events.
const EVENT_BUFFER_SIZE: usize = 256;

/// Size of the command channel feeding the connection task.
const COMMAND_BUFFER_SIZE: usize = 64;

const JOIN_EVENT: &str = "phx_join";
const REPLY_EVENT: &str = "phx_reply";
const ERROR_EVENT: &str = "phx_error";
const CLOSE_EVENT: &str = "phx_close";
const HEARTBEAT_TOPIC: &str = "phoenix";
const HEARTBEAT_EVENT: &str = "heartbeat";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for a [`PhoenixTransport`].
#[derive(Debug, Clone)]
pub struct PhoenixConfig {
    /// WebSocket endpoint, e.g. `ws://host:port/controller/websocket`.
    pub url: String,
    /// Topic to join, e.g. `controllers:browser`.
    pub topic: String,
    /// Flat delay between reconnect attempts.
    pub reconnect_after: Duration,
    /// Heartbeat push interval.
    pub heartbeat_interval: Duration,
}

/// One wire frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    payload: Value,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

fn join_frame(topic: &str, reference: &str) -> Frame {
    Frame {
        topic: topic.to_string(),
        event: JOIN_EVENT.to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Split a `phx_reply` payload into its ok flag and response body.
fn reply_parts(payload: &Value) -> (bool, Value) {
    let ok = payload.get("status").and_then(Value::as_str) == Some("ok");
    let response = payload.get("response").cloned().unwrap_or(Value::Null);
    (ok, response)
}

enum Command {
    Join,
    Push {
        event: String,
        payload: Value,
        ack_tx: oneshot::Sender<PushAck>,
    },
}

/// Reconnecting Phoenix channel client.
///
/// The socket, joins, heartbeats, and retries all live inside one spawned
/// connection task; callers interact through the [`ChannelTransport`] trait.
pub struct PhoenixTransport {
    event_tx: broadcast::Sender<TransportEvent>,
    command_tx: mpsc::Sender<Command>,
    _handle: tokio::task::JoinHandle<()>,
}

impl PhoenixTransport {
    /// Spawn the connection task. Returns immediately; the task dials once
    /// the first command arrives, reconnects on a flat interval, and rejoins
    /// the topic after every reconnect once a join has been requested.
    /// Subscribing before the first [`ChannelTransport::join`] therefore
    /// sees every lifecycle event.
    pub fn connect(config: PhoenixConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let handle = tokio::spawn(connection_task(config, event_tx.clone(), command_rx));
        Self {
            event_tx,
            command_tx,
            _handle: handle,
        }
    }
}

#[async_trait]
impl ChannelTransport for PhoenixTransport {
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.event_tx.subscribe()
    }

    async fn join(&self) -> TransportResult<()> {
        self.command_tx
            .send(Command::Join)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    async fn push(&self, event: &str, payload: Value) -> TransportResult<PushHandle> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Push {
                event: event.to_string(),
                payload,
                ack_tx,
            })
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        Ok(PushHandle::new(ack_rx))
    }
}

/// Why a live session ended.
enum SessionEnd {
    SocketClosed,
    SocketError,
    CommandsClosed,
}

async fn connection_task(
    config: PhoenixConfig,
    event_tx: broadcast::Sender<TransportEvent>,
    mut command_rx: mpsc::Receiver<Command>,
) {
    // The first connection attempt waits for the first command. Callers
    // subscribe to the event stream before issuing their join, so no
    // lifecycle event can fire while nobody is listening yet.
    let mut join_requested = false;
    let mut first_command = match command_rx.recv().await {
        None => return,
        Some(Command::Join) => {
            join_requested = true;
            None
        }
        Some(command) => Some(command),
    };
    loop {
        match connect_async(config.url.as_str()).await {
            Ok((stream, _)) => {
                info!("socket connected to {}", config.url);
                let _ = event_tx.send(TransportEvent::Opened);
                let end = run_session(
                    &config,
                    &event_tx,
                    &mut command_rx,
                    &mut join_requested,
                    first_command.take(),
                    stream,
                )
                .await;
                match end {
                    SessionEnd::SocketClosed => {
                        warn!("socket closed");
                        let _ = event_tx.send(TransportEvent::Closed);
                    }
                    SessionEnd::SocketError => {
                        warn!("socket errored");
                        let _ = event_tx.send(TransportEvent::Errored);
                    }
                    SessionEnd::CommandsClosed => {
                        debug!("transport handle dropped, stopping connection task");
                        return;
                    }
                }
            }
            Err(err) => {
                warn!("failed to connect to {}: {}", config.url, err);
                let _ = event_tx.send(TransportEvent::Errored);
            }
        }
        tokio::time::sleep(config.reconnect_after).await;
    }
}

async fn run_session(
    config: &PhoenixConfig,
    event_tx: &broadcast::Sender<TransportEvent>,
    command_rx: &mut mpsc::Receiver<Command>,
    join_requested: &mut bool,
    first_command: Option<Command>,
    stream: WsStream,
) -> SessionEnd {
    let (mut sink, mut source) = stream.split();
    let mut pending: HashMap<String, oneshot::Sender<PushAck>> = HashMap::new();
    let mut next_ref: u64 = 0;
    let mut join_ref: Option<String> = None;
    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);

    // Rejoin straight away on reconnect.
    if *join_requested {
        next_ref += 1;
        let reference = next_ref.to_string();
        if send_frame(&mut sink, &join_frame(&config.topic, &reference))
            .await
            .is_err()
        {
            return SessionEnd::SocketError;
        }
        join_ref = Some(reference);
    }

    // A command received before the socket was up is replayed here.
    if let Some(command) = first_command {
        if handle_command(
            config,
            &mut sink,
            &mut pending,
            &mut next_ref,
            &mut join_ref,
            join_requested,
            command,
        )
        .await
        .is_err()
        {
            return SessionEnd::SocketError;
        }
    }

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                next_ref += 1;
                let frame = Frame {
                    topic: HEARTBEAT_TOPIC.to_string(),
                    event: HEARTBEAT_EVENT.to_string(),
                    payload: json!({}),
                    reference: Some(next_ref.to_string()),
                };
                if send_frame(&mut sink, &frame).await.is_err() {
                    return SessionEnd::SocketError;
                }
            }
            command = command_rx.recv() => {
                match command {
                    None => return SessionEnd::CommandsClosed,
                    Some(command) => {
                        if handle_command(
                            config,
                            &mut sink,
                            &mut pending,
                            &mut next_ref,
                            &mut join_ref,
                            join_requested,
                            command,
                        )
                        .await
                        .is_err()
                        {
                            return SessionEnd::SocketError;
                        }
                    }
                }
            }
            message = source.next() => {
                match message {
                    None => return SessionEnd::SocketClosed,
                    Some(Err(err)) => {
                        warn!("socket read error: {}", err);
                        return SessionEnd::SocketError;
                    }
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(config, event_tx, &mut pending, &join_ref, text.as_str());
                    }
                    Some(Ok(Message::Close(_))) => return SessionEnd::SocketClosed,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn handle_command<S>(
    config: &PhoenixConfig,
    sink: &mut S,
    pending: &mut HashMap<String, oneshot::Sender<PushAck>>,
    next_ref: &mut u64,
    join_ref: &mut Option<String>,
    join_requested: &mut bool,
    command: Command,
) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    match command {
        Command::Join => {
            *join_requested = true;
            *next_ref += 1;
            let reference = next_ref.to_string();
            send_frame(sink, &join_frame(&config.topic, &reference)).await?;
            *join_ref = Some(reference);
        }
        Command::Push {
            event,
            payload,
            ack_tx,
        } => {
            *next_ref += 1;
            let reference = next_ref.to_string();
            let frame = Frame {
                topic: config.topic.clone(),
                event,
                payload,
                reference: Some(reference.clone()),
            };
            pending.insert(reference, ack_tx);
            // Pending acks die with the session; silence is not failure,
            // so nothing to notify.
            send_frame(sink, &frame).await?;
        }
    }
    Ok(())
}

fn handle_frame(
    config: &PhoenixConfig,
    event_tx: &broadcast::Sender<TransportEvent>,
    pending: &mut HashMap<String, oneshot::Sender<PushAck>>,
    join_ref: &Option<String>,
    text: &str,
) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            warn!("unparseable frame: {} ({})", text, err);
            return;
        }
    };

    match frame.event.as_str() {
        REPLY_EVENT => {
            let (ok, response) = reply_parts(&frame.payload);
            if frame.reference.is_some() && frame.reference == *join_ref {
                let _ = event_tx.send(if ok {
                    TransportEvent::JoinOk
                } else {
                    TransportEvent::JoinError(response)
                });
                return;
            }
            if let Some(reference) = frame.reference {
                if let Some(ack_tx) = pending.remove(&reference) {
                    let ack = if ok {
                        PushAck::Ok(response)
                    } else {
                        PushAck::Error(response)
                    };
                    let _ = ack_tx.send(ack);
                } else if frame.topic != HEARTBEAT_TOPIC {
                    debug!("reply for unknown ref {}", reference);
                }
            }
        }
        ERROR_EVENT | CLOSE_EVENT => {
            warn!("channel {} on {}", frame.event, frame.topic);
            let _ = event_tx.send(TransportEvent::Errored);
        }
        _ if frame.topic == config.topic => {
            let _ = event_tx.send(TransportEvent::Message {
                event: frame.event,
                payload: frame.payload,
            });
        }
        _ => debug!("ignoring frame for topic {}", frame.topic),
    }
}

async fn send_frame<S>(sink: &mut S, frame: &Frame) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(err) => {
            error!("failed to serialize frame: {}", err);
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    fn test_config() -> PhoenixConfig {
        PhoenixConfig {
            url: "ws://localhost:8080/controller/websocket".to_string(),
            topic: "controllers:browser".to_string(),
            reconnect_after: Duration::from_millis(500),
            heartbeat_interval: Duration::from_millis(1000),
        }
    }

    #[test]
    fn test_frame_serializes_ref_key() {
        let frame = join_frame("controllers:browser", "1");
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"ref\":\"1\""));
        assert!(json.contains("phx_join"));

        let parsed: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_frame_with_null_ref_parses() {
        let frame: Frame = serde_json::from_str(
            r#"{"topic":"controllers:browser","event":"volume-change","payload":{"id":"r1"},"ref":null}"#,
        )
        .unwrap();
        assert_eq!(frame.event, "volume-change");
        assert!(frame.reference.is_none());
    }

    #[test]
    fn test_reply_parts() {
        let (ok, response) = reply_parts(&json!({"status": "ok", "response": {"x": 1}}));
        assert!(ok);
        assert_eq!(response, json!({"x": 1}));

        let (ok, response) = reply_parts(&json!({"status": "error", "response": "nope"}));
        assert!(!ok);
        assert_eq!(response, json!("nope"));
    }

    #[test]
    fn test_topic_event_becomes_message() {
        let config = test_config();
        let (event_tx, mut event_rx) = broadcast::channel(8);
        let mut pending = HashMap::new();

        handle_frame(
            &config,
            &event_tx,
            &mut pending,
            &None,
            r#"{"topic":"controllers:browser","event":"volume-change","payload":{"id":"r1","volume":0.5},"ref":null}"#,
        );

        match event_rx.try_recv().unwrap() {
            TransportEvent::Message { event, payload } => {
                assert_eq!(event, "volume-change");
                assert_eq!(payload, json!({"id": "r1", "volume": 0.5}));
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_foreign_topic_is_ignored() {
        let config = test_config();
        let (event_tx, mut event_rx) = broadcast::channel(8);
        let mut pending = HashMap::new();

        handle_frame(
            &config,
            &event_tx,
            &mut pending,
            &None,
            r#"{"topic":"controllers:other","event":"volume-change","payload":{},"ref":null}"#,
        );

        assert!(event_rx.try_recv().is_err());
    }

    #[test]
    fn test_join_reply_routing() {
        let config = test_config();
        let (event_tx, mut event_rx) = broadcast::channel(8);
        let mut pending = HashMap::new();
        let join_ref = Some("1".to_string());

        handle_frame(
            &config,
            &event_tx,
            &mut pending,
            &join_ref,
            r#"{"topic":"controllers:browser","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#,
        );

        assert!(matches!(
            event_rx.try_recv().unwrap(),
            TransportEvent::JoinOk
        ));
    }

    #[test]
    fn test_push_reply_resolves_pending_ack() {
        let config = test_config();
        let (event_tx, _event_rx) = broadcast::channel(8);
        let mut pending = HashMap::new();
        let (ack_tx, mut ack_rx) = oneshot::channel();
        pending.insert("7".to_string(), ack_tx);

        handle_frame(
            &config,
            &event_tx,
            &mut pending,
            &None,
            r#"{"topic":"controllers:browser","event":"phx_reply","payload":{"status":"error","response":{"message":"denied"}},"ref":"7"}"#,
        );

        match ack_rx.try_recv().unwrap() {
            PushAck::Error(response) => assert_eq!(response, json!({"message": "denied"})),
            other => panic!("expected error ack, got {:?}", other),
        }
        assert!(pending.is_empty());
    }

    /// Accept one socket, answer its `phx_join` with an ok reply, then hang
    /// up by dropping the connection.
    async fn serve_join_once(listener: &TcpListener) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        loop {
            let message = ws.next().await.unwrap().unwrap();
            let Message::Text(text) = message else {
                continue;
            };
            let frame: Frame = serde_json::from_str(text.as_str()).unwrap();
            if frame.event != JOIN_EVENT {
                continue;
            }
            let reply = Frame {
                topic: frame.topic,
                event: REPLY_EVENT.to_string(),
                payload: json!({"status": "ok", "response": {}}),
                reference: frame.reference,
            };
            ws.send(Message::Text(serde_json::to_string(&reply).unwrap().into()))
                .await
                .unwrap();
            return;
        }
    }

    async fn next_join_ok(events: &mut broadcast::Receiver<TransportEvent>) {
        loop {
            match tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
                Ok(Ok(TransportEvent::JoinOk)) => return,
                Ok(Ok(_)) => continue,
                Ok(Err(err)) => panic!("event stream ended: {err}"),
                Err(_) => panic!("timed out waiting for join reply"),
            }
        }
    }

    #[tokio::test]
    async fn test_quiet_until_join_requested() {
        let transport = PhoenixTransport::connect(PhoenixConfig {
            // Nothing listens on the discard port.
            url: "ws://127.0.0.1:9".to_string(),
            topic: "controllers:browser".to_string(),
            reconnect_after: Duration::from_millis(20),
            heartbeat_interval: Duration::from_secs(5),
        });
        let mut events = transport.subscribe();

        // Before a join is requested the transport does not even dial, so a
        // subscriber arriving after construction misses nothing.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(events.try_recv().is_err());

        transport.join().await.unwrap();
        match tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
            Ok(Ok(TransportEvent::Errored)) => {}
            other => panic!("expected errored, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejoins_after_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            serve_join_once(&listener).await;
            serve_join_once(&listener).await;
        });

        let transport = PhoenixTransport::connect(PhoenixConfig {
            url: format!("ws://{addr}"),
            topic: "controllers:browser".to_string(),
            reconnect_after: Duration::from_millis(20),
            heartbeat_interval: Duration::from_secs(5),
        });
        let mut events = transport.subscribe();
        transport.join().await.unwrap();

        next_join_ok(&mut events).await;
        // The server hangs up; the transport reconnects and rejoins on its
        // own, with no second join() call, and a fresh ok reply comes back.
        next_join_ok(&mut events).await;
        server.await.unwrap();
    }
}
