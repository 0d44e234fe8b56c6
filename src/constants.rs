//! # System Constants
//!
//! Defaults and wire names shared by the configuration, reconciliation and
//! push-connection layers.

/// Trailing window for collapsing reconciliation triggers about one pallet
pub const DEFAULT_DEBOUNCE_WINDOW_MS: u64 = 300;

/// Capacity of the reconciler's inbound channel and the lifecycle event bus
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RECONNECT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// Push channel topics consumed from the remote service
pub mod topics {
    pub const JOIN_ROOM: &str = "joinRoom";
    pub const LEAVE_ROOM: &str = "leaveRoom";
    pub const ROOM_JOINED: &str = "roomJoined";
    pub const ROOM_ERROR: &str = "roomError";

    pub const PALLET_UPDATED: &str = "pallet:updated";
    pub const PALLET_DELETED: &str = "pallet:deleted";
    pub const PALLET_CHANGED: &str = "pallet:changed";
    pub const OPERATION_UPDATED: &str = "operation:updated";
    pub const BUFFER_UPDATED: &str = "buffer:updated";
    pub const MACHINE_EVENT: &str = "machine:event";

    pub const MATERIAL_CREATED: &str = "materialCreated";
    pub const MATERIAL_UPDATED: &str = "materialUpdated";
    pub const MATERIAL_DELETED: &str = "materialDeleted";
}

/// Known remote rejection texts, matched case-insensitively
pub mod remote_messages {
    pub const PREVIOUS_STAGE_NOT_COMPLETED: &[&str] = &[
        "previous stage not completed",
        "предыдущий этап не завершен",
        "предыдущий этап не завершён",
    ];
    pub const CELL_OCCUPIED: &[&str] = &["cell is occupied", "ячейка занята"];
    pub const INSUFFICIENT_QUANTITY: &[&str] =
        &["insufficient quantity", "недостаточно деталей"];
    pub const SELECT_BUFFER_ADDRESS: &[&str] =
        &["select a buffer address", "выберите адрес в буфере"];
}
