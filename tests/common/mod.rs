//! Shared fixtures and test doubles for integration tests
#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use pallet_core::allocation::{BufferCellRegistry, MachineRegistry};
use pallet_core::config::PalletConfig;
use pallet_core::connection::{PushTransport, TransportError};
use pallet_core::events::{EventPublisher, PalletEvent, PublishedEvent};
use pallet_core::models::{
    BufferCell, Machine, Operation, Pallet, PalletId, PalletLocation, Part, Route, RouteStage,
    StageId,
};
use pallet_core::orchestration::PalletCoordinator;
use pallet_core::reconciliation::PushFrame;
use pallet_core::remote::{
    AssignToMachineRequest, AssignToMachineResponse, CompleteProcessingResponse, DefectPartsRequest,
    DefectPartsResponse, MoveToBufferRequest, MoveToBufferResponse, PalletSnapshot,
    ProcessingRequest, ProductionService, RedistributeRequest, RedistributeResponse, RemoteError,
    RemoteResult,
};
use pallet_core::state_machine::OperationStatus;
use pallet_core::store::PalletStore;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::Instant;

pub const PART_ID: i64 = 1;
pub const CUTTING: StageId = 10;
pub const EDGING: StageId = 20;
pub const DRILLING: StageId = 30;
pub const SAW: i64 = 7;
pub const EDGE_BANDER: i64 = 8;
pub const OPERATOR: i64 = 15;

pub fn part() -> Part {
    Part {
        part_id: PART_ID,
        article: "ДСП-001".to_string(),
        name: "Боковина".to_string(),
        material: "ЛДСП 16мм".to_string(),
        size: "720x560".to_string(),
        total_quantity: 30,
        completed: 0,
        ready_for_processing: 30,
    }
}

pub fn route() -> Route {
    Route::new(
        PART_ID,
        vec![
            RouteStage { stage_id: CUTTING, name: "Раскрой".to_string(), sequence: 1 },
            RouteStage { stage_id: EDGING, name: "Кромкооблицовка".to_string(), sequence: 2 },
            RouteStage { stage_id: DRILLING, name: "Присадка".to_string(), sequence: 3 },
        ],
    )
}

/// Pallet whose current record is `stage_id` in `status`
pub fn pallet(pallet_id: PalletId, name: &str, quantity: u32, stage_id: StageId, status: OperationStatus) -> Pallet {
    let mut pallet = Pallet::new(pallet_id, name, quantity, PART_ID);
    pallet.current_stage_progress = Some(Operation::new(pallet_id * 100 + stage_id, pallet_id, stage_id, status));
    pallet
}

/// Pallet at the edging stage with cutting already completed
pub fn pallet_at_edging(pallet_id: PalletId, name: &str, quantity: u32, status: OperationStatus) -> Pallet {
    let mut pallet = pallet(pallet_id, name, quantity, EDGING, status);
    pallet
        .stage_history
        .push(Operation::new(pallet_id * 100 + CUTTING, pallet_id, CUTTING, OperationStatus::Completed));
    pallet
}

pub fn in_buffer(mut pallet: Pallet, cell_id: i64) -> Pallet {
    pallet.location = PalletLocation::InBuffer { cell_id };
    pallet
}

pub fn versioned(mut pallet: Pallet, version: u64) -> Pallet {
    pallet.version = Some(version);
    pallet
}

pub fn store_with(pallets: impl IntoIterator<Item = Pallet>) -> Arc<PalletStore> {
    Arc::new(PalletStore::with_pallets(part(), route(), pallets))
}

pub fn cells() -> Vec<BufferCell> {
    vec![
        BufferCell::new(1, "A-01", 1),
        BufferCell::new(2, "A-02", 1),
        BufferCell::new(3, "B-01", 1),
    ]
}

pub fn machines() -> Vec<Machine> {
    vec![
        Machine::new(SAW, "Раскроечный станок"),
        Machine::new(EDGE_BANDER, "Кромкооблицовочный станок"),
    ]
}

pub fn test_config() -> PalletConfig {
    let mut config = PalletConfig::default();
    config.remote.command_timeout_ms = 1_000;
    config
}

pub struct Harness {
    pub coordinator: PalletCoordinator,
    pub service: Arc<MockProductionService>,
    pub events: broadcast::Receiver<PublishedEvent>,
}

impl Harness {
    pub fn new(pallets: impl IntoIterator<Item = Pallet>) -> Self {
        Self::with_config(pallets, &test_config())
    }

    pub fn with_config(pallets: impl IntoIterator<Item = Pallet>, config: &PalletConfig) -> Self {
        let service = MockProductionService::new();
        let publisher = EventPublisher::new(256);
        let events = publisher.subscribe();
        let coordinator = PalletCoordinator::new(
            store_with(pallets),
            Arc::new(BufferCellRegistry::new(cells())),
            Arc::new(MachineRegistry::new(machines())),
            Arc::clone(&service) as Arc<dyn ProductionService>,
            publisher,
            config,
        );
        Self {
            coordinator,
            service,
            events,
        }
    }

    pub fn store(&self) -> &Arc<PalletStore> {
        self.coordinator.store()
    }

    /// Drain every event published so far
    pub fn drain_events(&mut self) -> Vec<PalletEvent> {
        let mut drained = Vec::new();
        while let Ok(published) = self.events.try_recv() {
            drained.push(published.event);
        }
        drained
    }
}

type Script<T> = Mutex<VecDeque<RemoteResult<T>>>;

/// Scripted remote service. Each call pops the next scripted answer; an empty
/// script answers with a transport failure.
#[derive(Default)]
pub struct MockProductionService {
    start: Script<Operation>,
    complete: Script<CompleteProcessingResponse>,
    buffer: Script<MoveToBufferResponse>,
    assign: Script<AssignToMachineResponse>,
    defect: Script<DefectPartsResponse>,
    redistribute: Script<RedistributeResponse>,
    snapshots: Mutex<HashMap<PalletId, PalletSnapshot>>,
    calls: Mutex<Vec<&'static str>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockProductionService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_start(&self, result: RemoteResult<Operation>) {
        self.start.lock().push_back(result);
    }

    pub fn script_complete(&self, result: RemoteResult<CompleteProcessingResponse>) {
        self.complete.lock().push_back(result);
    }

    pub fn script_move_to_buffer(&self, result: RemoteResult<MoveToBufferResponse>) {
        self.buffer.lock().push_back(result);
    }

    pub fn script_assign(&self, result: RemoteResult<AssignToMachineResponse>) {
        self.assign.lock().push_back(result);
    }

    pub fn script_defect(&self, result: RemoteResult<DefectPartsResponse>) {
        self.defect.lock().push_back(result);
    }

    pub fn script_redistribute(&self, result: RemoteResult<RedistributeResponse>) {
        self.redistribute.lock().push_back(result);
    }

    /// Server state returned by `fetch_pallet`
    pub fn set_snapshot(&self, pallet: PalletSnapshot) {
        self.snapshots.lock().insert(pallet.pallet_id, pallet);
    }

    /// Block every call until the returned gate is notified
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.notify_waiters();
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|call| **call == name).count()
    }

    async fn enter(&self, name: &'static str) {
        self.calls.lock().push(name);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

fn next<T>(script: &Script<T>, name: &str) -> RemoteResult<T> {
    script
        .lock()
        .pop_front()
        .unwrap_or_else(|| Err(RemoteError::Transport(format!("no scripted answer for {name}"))))
}

#[async_trait]
impl ProductionService for MockProductionService {
    async fn start_processing(&self, _request: ProcessingRequest) -> RemoteResult<Operation> {
        self.enter("start_processing").await;
        next(&self.start, "start_processing")
    }

    async fn complete_processing(&self, _request: ProcessingRequest) -> RemoteResult<CompleteProcessingResponse> {
        self.enter("complete_processing").await;
        next(&self.complete, "complete_processing")
    }

    async fn move_to_buffer(&self, _request: MoveToBufferRequest) -> RemoteResult<MoveToBufferResponse> {
        self.enter("move_to_buffer").await;
        next(&self.buffer, "move_to_buffer")
    }

    async fn assign_to_machine(&self, _request: AssignToMachineRequest) -> RemoteResult<AssignToMachineResponse> {
        self.enter("assign_to_machine").await;
        next(&self.assign, "assign_to_machine")
    }

    async fn defect_parts(&self, _request: DefectPartsRequest) -> RemoteResult<DefectPartsResponse> {
        self.enter("defect_parts").await;
        next(&self.defect, "defect_parts")
    }

    async fn redistribute_parts(&self, _request: RedistributeRequest) -> RemoteResult<RedistributeResponse> {
        self.enter("redistribute_parts").await;
        next(&self.redistribute, "redistribute_parts")
    }

    async fn fetch_pallet(&self, pallet_id: PalletId) -> RemoteResult<Option<PalletSnapshot>> {
        self.enter("fetch_pallet").await;
        Ok(self.snapshots.lock().get(&pallet_id).cloned())
    }
}

enum ServerSignal {
    Frame(PushFrame),
    Drop,
}

/// In-process push transport driven by a [`MockPushServer`]
pub struct MockPushTransport {
    inbound: mpsc::UnboundedReceiver<ServerSignal>,
    server: Arc<ServerState>,
}

#[derive(Default)]
struct ServerState {
    sent: Mutex<Vec<PushFrame>>,
    connect_attempts: Mutex<Vec<Instant>>,
    refuse_connects: AtomicU32,
}

/// Test-side control of a [`MockPushTransport`]
#[derive(Clone)]
pub struct MockPushServer {
    signals: mpsc::UnboundedSender<ServerSignal>,
    state: Arc<ServerState>,
}

pub fn push_pair() -> (MockPushTransport, MockPushServer) {
    let (signals, inbound) = mpsc::unbounded_channel();
    let state = Arc::new(ServerState::default());
    (
        MockPushTransport {
            inbound,
            server: Arc::clone(&state),
        },
        MockPushServer { signals, state },
    )
}

impl MockPushServer {
    pub fn push(&self, frame: PushFrame) {
        let _ = self.signals.send(ServerSignal::Frame(frame));
    }

    pub fn drop_connection(&self) {
        let _ = self.signals.send(ServerSignal::Drop);
    }

    pub fn refuse_next_connects(&self, count: u32) {
        self.state.refuse_connects.store(count, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> Vec<Instant> {
        self.state.connect_attempts.lock().clone()
    }

    pub fn sent(&self) -> Vec<PushFrame> {
        self.state.sent.lock().clone()
    }

    /// How many join frames were sent for `room`
    pub fn joins_of(&self, room: &str) -> usize {
        self.state
            .sent
            .lock()
            .iter()
            .filter(|frame| frame.event == "joinRoom" && frame.data["room"] == room)
            .count()
    }
}

#[async_trait]
impl PushTransport for MockPushTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.server.connect_attempts.lock().push(Instant::now());
        let refused = self
            .server
            .refuse_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            Err(TransportError::Disconnected("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    async fn send(&mut self, frame: PushFrame) -> Result<(), TransportError> {
        self.server.sent.lock().push(frame);
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<PushFrame>, TransportError> {
        match self.inbound.recv().await {
            Some(ServerSignal::Frame(frame)) => Ok(Some(frame)),
            Some(ServerSignal::Drop) => Err(TransportError::Disconnected("server dropped the connection".to_string())),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}
