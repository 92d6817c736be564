//! WebSocket Hub
//!
//! Real-time delivery over WebSocket connections.

pub mod handler;
pub mod hub;
pub mod messages;
pub mod session;

pub use handler::ws_handler;
pub use hub::{Connection, ConnectionId, Hub};
pub use messages::{GatewayReceive, GatewaySend, OpCode};
pub use session::SessionState;
