//! # Production Service Seam
//!
//! The remote service is the system of record. This trait is the only way the
//! crate talks to it; an HTTP client, a test double, or anything else can sit
//! behind it.

use super::types::{
    AssignToMachineRequest, AssignToMachineResponse, CompleteProcessingResponse, DefectPartsRequest,
    DefectPartsResponse, MoveToBufferRequest, MoveToBufferResponse, PalletSnapshot,
    ProcessingRequest, RedistributeRequest, RedistributeResponse,
};
use crate::models::{Operation, PalletId};
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a [`ProductionService`] implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The service answered and refused the command
    #[error("Remote rejected the command ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Remote call timed out")]
    Timeout,

    /// The service answered with a body that could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[async_trait]
pub trait ProductionService: Send + Sync {
    async fn start_processing(&self, request: ProcessingRequest) -> RemoteResult<Operation>;

    async fn complete_processing(
        &self,
        request: ProcessingRequest,
    ) -> RemoteResult<CompleteProcessingResponse>;

    async fn move_to_buffer(&self, request: MoveToBufferRequest) -> RemoteResult<MoveToBufferResponse>;

    async fn assign_to_machine(
        &self,
        request: AssignToMachineRequest,
    ) -> RemoteResult<AssignToMachineResponse>;

    async fn defect_parts(&self, request: DefectPartsRequest) -> RemoteResult<DefectPartsResponse>;

    async fn redistribute_parts(
        &self,
        request: RedistributeRequest,
    ) -> RemoteResult<RedistributeResponse>;

    /// Current server state of a pallet, `None` if it no longer exists
    async fn fetch_pallet(&self, pallet_id: PalletId) -> RemoteResult<Option<PalletSnapshot>>;
}
