//! Bidirectional event bridge between the channel transport and UI ports.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  events    ┌──────────────────┐  send()     ┌──────────────────┐
//! │ ChannelTransport │ ─────────▶ │      Bridge      │ ──────────▶ │   PortRegistry   │
//! │ (Phoenix socket) │ ◀───────── │ (binding tables) │ ◀────────── │    (UI ports)    │
//! └──────────────────┘  push()    └──────────────────┘  subscribe  └──────────────────┘
//! ```
//!
//! The bridge holds a static table of inbound `{event -> port + transform}`
//! and outbound `{port -> event + transform}` rules, wires both directions
//! when started, and normalizes ad-hoc payload shapes into a tagged
//! envelope. It carries no retry logic of its own; reconnection belongs to
//! the transport.

mod bindings;
mod dispatch;
mod error;
mod types;

pub use bindings::{BindingTable, InboundBinding, OutboundBinding, STARTUP_TAG, Transform};
pub use dispatch::{Bridge, STATUS_PORT};
pub use error::{BridgeError, BridgeResult, PayloadShapeError};
pub use types::{ConnectionStatus, Envelope};
