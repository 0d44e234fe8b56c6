//! # Push Connection Service
//!
//! Explicit connection object owning its transport, reconnect policy and room
//! membership. Constructed with injected configuration and passed by handle.

pub mod push_connection;
pub mod rooms;
pub mod transport;

pub use push_connection::{ConnectionState, PushConnection, PushConnectionHandle};
pub use rooms::Room;
pub use transport::{PushTransport, TransportError};
