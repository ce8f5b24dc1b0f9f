//! Named port registry connecting the bridge to the UI runtime.
//!
//! Ports are the UI's only surface: inbound ports carry values from the
//! bridge into the UI, outbound ports carry values the UI emits back out.
//! The registry is owned by the bridge for the lifetime of the session; no
//! other component mutates it.

use dashmap::DashMap;
use log::{debug, warn};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

/// Size of each inbound port buffer (bridge -> UI).
const INBOUND_BUFFER_SIZE: usize = 64;

/// Size of each outbound port buffer (UI -> bridge).
const OUTBOUND_BUFFER_SIZE: usize = 64;

/// Registry of named UI ports.
pub struct PortRegistry {
    inbound: DashMap<String, mpsc::Sender<Value>>,
    outbound: DashMap<String, broadcast::Sender<Value>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self {
            inbound: DashMap::new(),
            outbound: DashMap::new(),
        }
    }

    /// Open an inbound port, returning the receiving end for the UI.
    ///
    /// Re-opening a port replaces the previous receiver.
    pub fn open_inbound(&self, name: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER_SIZE);
        self.inbound.insert(name.to_string(), tx);
        debug!("opened inbound port '{}'", name);
        rx
    }

    /// Send a value into an inbound port.
    ///
    /// Values for ports nobody opened are dropped; the binding tables may
    /// name more ports than a given UI cares about.
    pub async fn send(&self, name: &str, value: Value) {
        let tx = match self.inbound.get(name) {
            Some(entry) => entry.value().clone(),
            None => {
                debug!("no inbound port '{}', dropping value", name);
                return;
            }
        };
        if tx.send(value).await.is_err() {
            warn!("inbound port '{}' receiver dropped", name);
        }
    }

    /// Handle for the UI to emit values on an outbound port.
    pub fn outbound_sender(&self, name: &str) -> broadcast::Sender<Value> {
        self.outbound
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(OUTBOUND_BUFFER_SIZE).0)
            .clone()
    }

    /// Subscribe to values the UI emits on an outbound port.
    pub fn subscribe_outbound(&self, name: &str) -> broadcast::Receiver<Value> {
        self.outbound_sender(name).subscribe()
    }
}

impl Default for PortRegistry {
    fn default() -> Self {
        Self::new()
    }
}
