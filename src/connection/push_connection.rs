//! # Push Connection
//!
//! Owns one [`PushTransport`], the reconnect policy and the set of joined
//! rooms. Callers interact through a cloneable [`PushConnectionHandle`]; the
//! connection itself runs as a single task that forwards decoded events to the
//! reconciler's inbound channel.
//!
//! On disconnect the task reconnects with exponential backoff and re-joins
//! every room recorded in the membership set. Room membership is recorded by
//! the handle before the join frame is sent, so a room joined while the
//! channel is down is still joined once it comes back.

use super::rooms::Room;
use super::transport::{PushTransport, TransportError};
use crate::config::ReconnectConfig;
use crate::reconciliation::{PushEvent, PushFrame};
use crate::resilience::ExponentialBackoff;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Closed,
    Failed,
}

#[derive(Debug)]
enum ControlCommand {
    Join(Room),
    Leave(Room),
    Shutdown,
}

enum Step {
    Control(Option<ControlCommand>),
    Frame(Result<Option<PushFrame>, TransportError>),
}

/// Cloneable control surface for a running [`PushConnection`]
#[derive(Debug, Clone)]
pub struct PushConnectionHandle {
    control: mpsc::Sender<ControlCommand>,
    rooms: Arc<RwLock<BTreeSet<Room>>>,
    state: watch::Receiver<ConnectionState>,
}

impl PushConnectionHandle {
    /// Record membership and ask the connection to join `room`
    pub async fn join(&self, room: Room) -> Result<(), TransportError> {
        self.rooms.write().insert(room.clone());
        self.control
            .send(ControlCommand::Join(room))
            .await
            .map_err(|_| TransportError::Closed)
    }

    pub async fn leave(&self, room: Room) -> Result<(), TransportError> {
        self.rooms.write().remove(&room);
        self.control
            .send(ControlCommand::Leave(room))
            .await
            .map_err(|_| TransportError::Closed)
    }

    pub async fn shutdown(&self) -> Result<(), TransportError> {
        self.control
            .send(ControlCommand::Shutdown)
            .await
            .map_err(|_| TransportError::Closed)
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.rooms.read().iter().cloned().collect()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the connection reaches `target`, or return `false` if the
    /// connection task ended first
    pub async fn wait_for(&self, target: ConnectionState) -> bool {
        let mut state = self.state.clone();
        let reached = state.wait_for(|current| *current == target).await.is_ok();
        reached
    }
}

pub struct PushConnection<T: PushTransport> {
    transport: T,
    backoff: ExponentialBackoff,
    rooms: Arc<RwLock<BTreeSet<Room>>>,
    events: mpsc::Sender<PushEvent>,
    control: mpsc::Receiver<ControlCommand>,
    state: watch::Sender<ConnectionState>,
}

impl<T: PushTransport + 'static> PushConnection<T> {
    pub fn new(
        transport: T,
        config: &ReconnectConfig,
        events: mpsc::Sender<PushEvent>,
    ) -> (Self, PushConnectionHandle) {
        let (control_tx, control_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let rooms = Arc::new(RwLock::new(BTreeSet::new()));

        let connection = Self {
            transport,
            backoff: ExponentialBackoff::from(config),
            rooms: Arc::clone(&rooms),
            events,
            control: control_rx,
            state: state_tx,
        };
        let handle = PushConnectionHandle {
            control: control_tx,
            rooms,
            state: state_rx,
        };
        (connection, handle)
    }

    pub fn spawn(self) -> JoinHandle<Result<(), TransportError>> {
        tokio::spawn(self.run())
    }

    /// Drive the connection until shutdown, or until reconnection is exhausted
    pub async fn run(mut self) -> Result<(), TransportError> {
        let initial = match self.transport.connect().await {
            Ok(()) => self.rejoin_rooms().await,
            Err(e) => Err(e),
        };
        match initial {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                info!("Push connection established");
            }
            Err(e) => {
                warn!(error = %e, "Initial push connection failed");
                self.reconnect().await?;
            }
        }

        loop {
            let step = tokio::select! {
                command = self.control.recv() => Step::Control(command),
                frame = self.transport.next_frame() => Step::Frame(frame),
            };

            match step {
                Step::Control(Some(ControlCommand::Join(room))) => {
                    debug!(room = %room, "Joining push room");
                    if let Err(e) = self.transport.send(room.join_frame()).await {
                        warn!(room = %room, error = %e, "Join failed, reconnecting");
                        self.reconnect().await?;
                    }
                }
                Step::Control(Some(ControlCommand::Leave(room))) => {
                    debug!(room = %room, "Leaving push room");
                    if let Err(e) = self.transport.send(room.leave_frame()).await {
                        warn!(room = %room, error = %e, "Leave failed, reconnecting");
                        self.reconnect().await?;
                    }
                }
                Step::Control(Some(ControlCommand::Shutdown)) | Step::Control(None) => {
                    self.transport.close().await;
                    self.set_state(ConnectionState::Closed);
                    info!("Push connection closed");
                    return Ok(());
                }
                Step::Frame(Ok(Some(frame))) => {
                    if !self.forward(frame).await {
                        self.transport.close().await;
                        self.set_state(ConnectionState::Closed);
                        info!("Event consumer gone, closing push connection");
                        return Ok(());
                    }
                }
                Step::Frame(Ok(None)) => {
                    warn!("Push channel closed by peer, reconnecting");
                    self.reconnect().await?;
                }
                Step::Frame(Err(e)) => {
                    warn!(error = %e, "Push channel error, reconnecting");
                    self.reconnect().await?;
                }
            }
        }
    }

    /// Decode and forward one frame. Returns `false` once the consumer is gone.
    async fn forward(&mut self, frame: PushFrame) -> bool {
        match PushEvent::from_frame(&frame) {
            Ok(Some(event)) => self.events.send(event).await.is_ok(),
            Ok(None) => {
                debug!(topic = %frame.event, "Ignoring unknown push topic");
                true
            }
            Err(e) => {
                warn!(topic = %frame.event, error = %e, "Undecodable push frame");
                true
            }
        }
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        let mut attempt = 0;
        while let Some(delay) = self.backoff.delay_for(attempt) {
            self.set_state(ConnectionState::Reconnecting { attempt });
            info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting push channel");
            tokio::time::sleep(delay).await;
            attempt += 1;

            if let Err(e) = self.transport.connect().await {
                warn!(attempt, error = %e, "Reconnect attempt failed");
                continue;
            }
            match self.rejoin_rooms().await {
                Ok(()) => {
                    self.set_state(ConnectionState::Connected);
                    info!(attempt, rooms = self.rooms.read().len(), "Push channel reconnected");
                    return Ok(());
                }
                Err(e) => warn!(attempt, error = %e, "Re-joining rooms failed"),
            }
        }

        let attempts = self.backoff.max_attempts();
        self.set_state(ConnectionState::Failed);
        error!(attempts, "Push channel reconnect exhausted");
        Err(TransportError::ReconnectExhausted { attempts })
    }

    async fn rejoin_rooms(&mut self) -> Result<(), TransportError> {
        let rooms: Vec<Room> = self.rooms.read().iter().cloned().collect();
        for room in rooms {
            self.transport.send(room.join_frame()).await?;
        }
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}
