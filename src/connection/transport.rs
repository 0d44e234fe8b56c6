//! Transport abstraction for the push channel
//!
//! The crate does not frame bytes itself. Any reliable message transport
//! (a WebSocket client, an in-process channel in tests) implements
//! [`PushTransport`] and hands over already-decoded [`PushFrame`]s.

use crate::error::PalletError;
use crate::reconciliation::PushFrame;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Push channel disconnected: {0}")]
    Disconnected(String),

    #[error("Push channel operation timed out")]
    Timeout,

    #[error("Push channel protocol error: {0}")]
    Protocol(String),

    #[error("Push channel reconnect gave up after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Push connection is closed")]
    Closed,
}

impl From<TransportError> for PalletError {
    fn from(err: TransportError) -> Self {
        PalletError::Transport(err.to_string())
    }
}

/// Reliable, already-framed message transport
#[async_trait]
pub trait PushTransport: Send {
    /// Establish (or re-establish) the underlying connection
    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn send(&mut self, frame: PushFrame) -> Result<(), TransportError>;

    /// Next inbound frame; `Ok(None)` means the peer closed the connection.
    /// Must be cancel-safe: it is raced against control commands.
    async fn next_frame(&mut self) -> Result<Option<PushFrame>, TransportError>;

    async fn close(&mut self);
}
