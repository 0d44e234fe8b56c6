//! Remote production service seam: trait, wire types and error classification

pub mod classifier;
pub mod service;
pub mod types;

pub use classifier::classify_remote_error;
pub use service::{ProductionService, RemoteError, RemoteResult};
pub use types::{
    AssignToMachineRequest, AssignToMachineResponse, CompleteProcessingResponse, DefectPartsRequest,
    DefectPartsResponse, DefectedPallet, MoveToBufferRequest, MoveToBufferResponse, PalletSnapshot,
    ProcessingRequest, Reclamation, RedistributeRequest, RedistributeResponse,
};
