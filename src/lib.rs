//! Event bridge between the multi-room audio controller backend and the
//! UI's named-port system.
//!
//! The backend exposes a Phoenix-style channel socket; the UI runtime speaks
//! only named ports. This crate sits between the two: inbound events are
//! looked up in a static binding table, transformed, and sent to the bound
//! port; values the UI emits on outbound ports are pushed back out under
//! their bound event names. Payload shapes are normalized into a tagged
//! envelope so backend renames never leak into the UI vocabulary.
//!
//! See [`bridge`] for the dispatch core, [`transport`] for the reconnecting
//! channel client, and [`ports`] for the UI-facing registry.

pub mod bridge;
pub mod config;
pub mod ports;
pub mod transport;

pub use bridge::{BindingTable, Bridge, BridgeError, ConnectionStatus, Envelope};
pub use config::BridgeConfig;
pub use ports::PortRegistry;
pub use transport::{ChannelTransport, TransportEvent};
