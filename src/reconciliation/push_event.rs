//! Typed push events and their decoding from raw channel frames

use crate::constants::topics;
use crate::events::CatalogChange;
use crate::models::{BufferCell, MachineId, MachineStatus, Operation, PalletId};
use crate::remote::PalletSnapshot;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw frame on the push channel: `{ "event": <topic>, "data": <payload> }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PushFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Externally delivered state change
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    PalletSnapshot(PalletSnapshot),
    PalletDeleted {
        pallet_id: PalletId,
        version: Option<u64>,
    },
    /// Something about the pallet changed; the payload is not a full snapshot
    PalletChanged {
        pallet_id: PalletId,
    },
    OperationSnapshot(Operation),
    BufferCellUpdated(BufferCell),
    MachineStatus {
        machine_id: MachineId,
        status: MachineStatus,
    },
    Material {
        change: CatalogChange,
        payload: Value,
    },
    RoomJoined {
        room: String,
    },
    RoomError {
        room: Option<String>,
        message: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PalletRef {
    pallet_id: PalletId,
    #[serde(default)]
    version: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MachineEvent {
    machine_id: MachineId,
    status: MachineStatus,
}

#[derive(Deserialize)]
struct RoomAck {
    room: String,
}

#[derive(Deserialize)]
struct RoomFailure {
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Payloads arrive either bare or wrapped as `{ "<key>": {...} }`
fn unwrap_payload<T: DeserializeOwned>(data: &Value, key: &str) -> serde_json::Result<T> {
    match data.get(key) {
        Some(inner) if inner.is_object() => serde_json::from_value(inner.clone()),
        _ => serde_json::from_value(data.clone()),
    }
}

impl PushEvent {
    /// Decode a frame. Unknown topics yield `Ok(None)`.
    pub fn from_frame(frame: &PushFrame) -> serde_json::Result<Option<Self>> {
        let data = &frame.data;
        let event = match frame.event.as_str() {
            topics::PALLET_UPDATED => Self::PalletSnapshot(unwrap_payload(data, "pallet")?),
            topics::PALLET_DELETED => {
                let PalletRef { pallet_id, version } = serde_json::from_value(data.clone())?;
                Self::PalletDeleted { pallet_id, version }
            }
            topics::PALLET_CHANGED => {
                let PalletRef { pallet_id, .. } = serde_json::from_value(data.clone())?;
                Self::PalletChanged { pallet_id }
            }
            topics::OPERATION_UPDATED => Self::OperationSnapshot(unwrap_payload(data, "operation")?),
            topics::BUFFER_UPDATED => Self::BufferCellUpdated(unwrap_payload(data, "cell")?),
            topics::MACHINE_EVENT => {
                let MachineEvent { machine_id, status } = serde_json::from_value(data.clone())?;
                Self::MachineStatus { machine_id, status }
            }
            topics::MATERIAL_CREATED => Self::Material {
                change: CatalogChange::Created,
                payload: data.clone(),
            },
            topics::MATERIAL_UPDATED => Self::Material {
                change: CatalogChange::Updated,
                payload: data.clone(),
            },
            topics::MATERIAL_DELETED => Self::Material {
                change: CatalogChange::Deleted,
                payload: data.clone(),
            },
            topics::ROOM_JOINED => {
                let RoomAck { room } = serde_json::from_value(data.clone())?;
                Self::RoomJoined { room }
            }
            topics::ROOM_ERROR => {
                let RoomFailure { room, message } = serde_json::from_value(data.clone())?;
                Self::RoomError {
                    room,
                    message: message.unwrap_or_else(|| "room error".to_string()),
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Pallet this event concerns, if it concerns exactly one
    pub fn pallet_id(&self) -> Option<PalletId> {
        match self {
            Self::PalletSnapshot(pallet) => Some(pallet.pallet_id),
            Self::PalletDeleted { pallet_id, .. } | Self::PalletChanged { pallet_id } => Some(*pallet_id),
            Self::OperationSnapshot(op) => Some(op.pallet_id),
            _ => None,
        }
    }
}
