//! The bridge proper: generic dispatch over the binding tables.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::ports::PortRegistry;
use crate::transport::{ChannelTransport, PushAck, TransportEvent};

use super::bindings::{BindingTable, InboundBinding, OutboundBinding};
use super::error::{BridgeError, BridgeResult};
use super::types::ConnectionStatus;

/// Default name of the dedicated connection-status port.
pub const STATUS_PORT: &str = "connectionStatus";

/// Bidirectional event bridge between a channel transport and UI ports.
///
/// Constructed once at startup with its collaborators injected; bindings are
/// immutable after construction and stay wired for the life of the session.
/// There is deliberately no stop path: the bridge lives exactly as long as
/// the hosting session does.
pub struct Bridge<T: ChannelTransport> {
    transport: Arc<T>,
    ports: Arc<PortRegistry>,
    table: BindingTable,
    status_port: String,
    status_tx: watch::Sender<ConnectionStatus>,
    status_rx: watch::Receiver<ConnectionStatus>,
    started: AtomicBool,
}

impl<T: ChannelTransport> Bridge<T> {
    /// Build a bridge over an already-validated binding table.
    pub fn new(table: BindingTable, transport: Arc<T>, ports: Arc<PortRegistry>) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            transport,
            ports,
            table,
            status_port: STATUS_PORT.to_string(),
            status_tx,
            status_rx,
            started: AtomicBool::new(false),
        }
    }

    /// Override the connection-status port name.
    pub fn with_status_port(mut self, name: impl Into<String>) -> Self {
        self.status_port = name.into();
        self
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Wire every binding and issue the channel join. Non-blocking.
    ///
    /// A bridge starts at most once; a second call returns
    /// [`BridgeError::AlreadyStarted`] rather than silently rewiring, since a
    /// double start would duplicate every outbound forwarder.
    pub async fn start(&self) -> BridgeResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::AlreadyStarted);
        }

        // One forwarder task per outbound port, so per-port emission order
        // is preserved.
        for binding in self.table.outbound() {
            let values = self.ports.subscribe_outbound(&binding.port);
            tokio::spawn(outbound_task(
                binding.clone(),
                values,
                Arc::clone(&self.transport),
            ));
        }

        // One task consumes the whole inbound stream, so UI delivery order
        // equals transport delivery order.
        let bindings: HashMap<String, InboundBinding> = self
            .table
            .inbound()
            .iter()
            .map(|binding| (binding.event.clone(), binding.clone()))
            .collect();
        tokio::spawn(inbound_task(
            bindings,
            self.transport.subscribe(),
            Arc::clone(&self.ports),
            self.status_port.clone(),
            self.status_tx.clone(),
        ));

        self.transport.join().await?;
        Ok(())
    }
}

fn set_status(status_tx: &watch::Sender<ConnectionStatus>, status: ConnectionStatus) {
    debug!("connection status -> {}", status);
    let _ = status_tx.send(status);
}

async fn inbound_task(
    bindings: HashMap<String, InboundBinding>,
    mut events: broadcast::Receiver<TransportEvent>,
    ports: Arc<PortRegistry>,
    status_port: String,
    status_tx: watch::Sender<ConnectionStatus>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("transport event stream lagged, {} events missed", missed);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            TransportEvent::Message { event, payload } => {
                let Some(binding) = bindings.get(&event) else {
                    debug!("ignoring unbound event '{}'", event);
                    continue;
                };
                match binding.transform.apply(&binding.canonical, payload) {
                    Ok(value) => ports.send(&binding.port, value).await,
                    // One bad payload must not stop the bridge.
                    Err(err) => warn!("dropping event: {}", err),
                }
            }
            TransportEvent::Opened => {
                // Liveness is only signalled once the join succeeds.
                set_status(&status_tx, ConnectionStatus::Connecting);
            }
            TransportEvent::Closed => {
                set_status(&status_tx, ConnectionStatus::Disconnected);
                ports.send(&status_port, Value::Bool(false)).await;
            }
            TransportEvent::Errored => {
                set_status(&status_tx, ConnectionStatus::Errored);
                ports.send(&status_port, Value::Bool(false)).await;
            }
            TransportEvent::JoinOk => {
                info!("channel joined");
                set_status(&status_tx, ConnectionStatus::Joined);
                ports.send(&status_port, Value::Bool(true)).await;
            }
            TransportEvent::JoinError(response) => {
                // No status-port signal here: the UI already renders a
                // disconnected state until the first successful join.
                error!("unable to join channel: {}", response);
                set_status(&status_tx, ConnectionStatus::Errored);
            }
        }
    }
    debug!("inbound dispatch task ended");
}

async fn outbound_task<T: ChannelTransport>(
    binding: OutboundBinding,
    mut values: broadcast::Receiver<Value>,
    transport: Arc<T>,
) {
    loop {
        let value = match values.recv().await {
            Ok(value) => value,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("port '{}' lagged, {} values missed", binding.port, missed);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let payload = match binding.transform.apply(&binding.event, value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("dropping '{}' emission: {}", binding.port, err);
                continue;
            }
        };

        match transport.push(&binding.event, payload).await {
            Ok(handle) => {
                // Log explicit rejections; no retry, and silence is fine.
                let event = binding.event.clone();
                tokio::spawn(async move {
                    if let Some(PushAck::Error(response)) = handle.ack().await {
                        warn!("'{}' push rejected: {}", event, response);
                    }
                });
            }
            Err(err) => warn!("failed to push '{}': {}", binding.event, err),
        }
    }
    debug!("outbound forwarder for '{}' ended", binding.port);
}
