//! Two-phase command behaviour of the pallet coordinator

mod common;

use common::*;
use pallet_core::error::{ErrorKind, PalletError};
use pallet_core::events::PalletEvent;
use pallet_core::models::{CellStatus, Operation, PalletLocation};
use pallet_core::orchestration::{
    AssignToMachine, CommandResolution, CompleteWork, MoveToBuffer, StartWork,
};
use pallet_core::remote::{
    AssignToMachineResponse, CompleteProcessingResponse, MoveToBufferResponse, RemoteError,
};
use pallet_core::state_machine::OperationStatus;
use std::time::Duration;

fn start_on_saw(pallet_id: i64, stage_id: i64) -> StartWork {
    StartWork {
        pallet_id,
        stage_id,
        machine_id: SAW,
        operator_id: Some(OPERATOR),
    }
}

fn in_progress(pallet_id: i64, stage_id: i64, machine_id: i64) -> Operation {
    let mut op = Operation::new(pallet_id * 100 + stage_id, pallet_id, stage_id, OperationStatus::InProgress);
    op.machine_id = Some(machine_id);
    op.operator_id = Some(OPERATOR);
    op
}

#[tokio::test]
async fn test_start_work_blocked_by_unfinished_predecessor() {
    let mut blocked = pallet(1, "П-1", 10, EDGING, OperationStatus::NotProcessed);
    blocked
        .stage_history
        .push(Operation::new(110, 1, CUTTING, OperationStatus::InProgress));
    let mut harness = Harness::new([blocked.clone()]);

    let resolution = harness.coordinator.start_work(start_on_saw(1, EDGING)).await;

    let error = resolution.error().cloned().expect("command should be rejected");
    assert!(matches!(resolution, CommandResolution::Rejected(_)));
    assert_eq!(
        error,
        PalletError::StageGuardViolation {
            stage_name: "Раскрой".to_string()
        }
    );
    assert_eq!(error.kind(), ErrorKind::GuardViolation);
    assert!(harness.service.calls().is_empty());
    assert_eq!(harness.store().get(1).unwrap(), blocked);

    let rejected = harness
        .drain_events()
        .into_iter()
        .find(|e| matches!(e, PalletEvent::CommandRejected { .. }));
    assert!(matches!(
        rejected,
        Some(PalletEvent::CommandRejected { pallet_id: 1, ref code, .. }) if code == "stage_guard_violation"
    ));
}

#[tokio::test]
async fn test_start_work_confirmed_by_server() {
    let harness = Harness::new([pallet(1, "П-1", 10, CUTTING, OperationStatus::Pending)]);
    harness.service.script_start(Ok(in_progress(1, CUTTING, SAW)));

    let resolution = harness.coordinator.start_work(start_on_saw(1, CUTTING)).await;

    let operation = resolution.into_result().unwrap();
    assert_eq!(operation.status, OperationStatus::InProgress);
    let stored = harness.store().get(1).unwrap();
    assert_eq!(stored.current_stage_progress, Some(operation));
    assert!(harness.coordinator.in_flight().is_empty());
}

#[tokio::test]
async fn test_stage_transition_is_published_only_after_confirmation() {
    let mut rejected = Harness::new([pallet(1, "П-1", 10, CUTTING, OperationStatus::Pending)]);
    rejected
        .service
        .script_start(Err(RemoteError::rejected(403, "Operator is not assigned to this machine")));

    assert!(!rejected.coordinator.start_work(start_on_saw(1, CUTTING)).await.is_confirmed());
    let events = rejected.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, PalletEvent::CommandRejected { pallet_id: 1, .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, PalletEvent::StageTransitioned { .. })));

    let mut confirmed = Harness::new([pallet(1, "П-1", 10, CUTTING, OperationStatus::Pending)]);
    confirmed.service.script_start(Ok(in_progress(1, CUTTING, SAW)));

    assert!(confirmed.coordinator.start_work(start_on_saw(1, CUTTING)).await.is_confirmed());
    let transitions: Vec<PalletEvent> = confirmed
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, PalletEvent::StageTransitioned { .. }))
        .collect();
    assert_eq!(
        transitions,
        vec![PalletEvent::StageTransitioned {
            pallet_id: 1,
            stage_id: CUTTING,
            from: OperationStatus::Pending,
            to: OperationStatus::InProgress,
        }]
    );
}

#[tokio::test]
async fn test_start_work_without_operator_is_validation_error() {
    let harness = Harness::new([pallet(1, "П-1", 10, CUTTING, OperationStatus::Pending)]);

    let resolution = harness
        .coordinator
        .start_work(StartWork {
            operator_id: None,
            ..start_on_saw(1, CUTTING)
        })
        .await;

    assert_eq!(resolution.into_result(), Err(PalletError::OperatorRequired));
}

#[tokio::test]
async fn test_second_command_on_same_pallet_is_rejected_while_first_is_in_flight() {
    let harness = Harness::new([pallet(1, "П-1", 10, CUTTING, OperationStatus::Pending)]);
    harness.service.script_start(Ok(in_progress(1, CUTTING, SAW)));
    harness.service.hold();

    let coordinator = harness.coordinator.clone();
    let first = tokio::spawn(async move { coordinator.start_work(start_on_saw(1, CUTTING)).await });

    while harness.service.call_count("start_processing") == 0 {
        tokio::task::yield_now().await;
    }
    assert!(harness.coordinator.in_flight().contains(1));

    let second = harness
        .coordinator
        .move_to_buffer(MoveToBuffer { pallet_id: 1, cell_id: 1 })
        .await;
    assert_eq!(
        second.into_result(),
        Err(PalletError::OperationInProgress { pallet_id: 1 })
    );
    assert_eq!(harness.service.call_count("move_to_buffer"), 0);

    harness.service.release();
    let first = first.await.unwrap();
    assert!(first.is_confirmed());
    assert!(!harness.coordinator.in_flight().contains(1));
}

#[tokio::test]
async fn test_rejected_move_rolls_back_location_and_cell() {
    let mut harness = Harness::new([pallet(1, "П-1", 10, CUTTING, OperationStatus::InProgress)]);
    harness
        .service
        .script_move_to_buffer(Err(RemoteError::rejected(400, "Ячейка занята другим поддоном")));

    let resolution = harness
        .coordinator
        .move_to_buffer(MoveToBuffer { pallet_id: 1, cell_id: 2 })
        .await;

    let error = resolution.into_result().unwrap_err();
    assert_eq!(error.code(), "cell_unavailable");
    assert_eq!(error.to_string(), "Ячейка занята другим поддоном");

    assert_eq!(harness.store().get(1).unwrap().location, PalletLocation::Unassigned);
    let cell = harness.coordinator.allocation().cells().get(2).unwrap();
    assert_eq!(cell.status, CellStatus::Available);
    assert_eq!(cell.occupant, None);

    let events = harness.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        PalletEvent::CommandRejected { message, kind: ErrorKind::GuardViolation, .. }
            if message == "Ячейка занята другим поддоном"
    )));
}

#[tokio::test]
async fn test_confirmed_move_occupies_cell() {
    let harness = Harness::new([pallet(1, "П-1", 10, CUTTING, OperationStatus::InProgress)]);
    let server_pallet = versioned(
        in_buffer(pallet(1, "П-1", 10, CUTTING, OperationStatus::InProgress), 2),
        4,
    );
    harness
        .service
        .script_move_to_buffer(Ok(MoveToBufferResponse { pallet: server_pallet.clone() }));

    let pallet = harness
        .coordinator
        .move_to_buffer(MoveToBuffer { pallet_id: 1, cell_id: 2 })
        .await
        .into_result()
        .unwrap();

    assert_eq!(pallet.location, PalletLocation::InBuffer { cell_id: 2 });
    assert_eq!(pallet.version, Some(4));
    let cells = harness.coordinator.allocation().cells();
    assert_eq!(cells.held_by(1).map(|c| c.cell_id), Some(2));
    assert_eq!(cells.get(2).unwrap().current_load, 10);
}

#[tokio::test]
async fn test_occupied_cell_is_rejected_locally() {
    let harness = Harness::new([
        in_buffer(pallet(1, "П-1", 10, CUTTING, OperationStatus::Buffered), 1),
        pallet(2, "П-2", 8, CUTTING, OperationStatus::InProgress),
    ]);
    harness.coordinator.allocation().sync_location(1, PalletLocation::InBuffer { cell_id: 1 });

    let resolution = harness
        .coordinator
        .move_to_buffer(MoveToBuffer { pallet_id: 2, cell_id: 1 })
        .await;

    let error = resolution.into_result().unwrap_err();
    assert_eq!(error.code(), "cell_unavailable");
    assert!(harness.service.calls().is_empty());
    assert_eq!(harness.store().get(2).unwrap().location, PalletLocation::Unassigned);
}

#[tokio::test]
async fn test_assign_to_machine_rejected_while_busy_elsewhere() {
    let mut busy = pallet(1, "П-1", 10, CUTTING, OperationStatus::InProgress);
    busy.location = PalletLocation::OnMachine { machine_id: SAW };
    let harness = Harness::new([busy]);

    let resolution = harness
        .coordinator
        .assign_to_machine(AssignToMachine {
            pallet_id: 1,
            machine_id: EDGE_BANDER,
            segment_id: 3,
            operator_id: Some(OPERATOR),
        })
        .await;

    let error = resolution.into_result().unwrap_err();
    assert_eq!(
        error,
        PalletError::PalletBusy {
            pallet_id: 1,
            machine_name: "Раскроечный станок".to_string()
        }
    );
    assert_eq!(error.kind(), ErrorKind::GuardViolation);
}

#[tokio::test]
async fn test_assign_to_machine_releases_buffer_cell() {
    let harness = Harness::new([in_buffer(pallet_at_edging(1, "П-1", 10, OperationStatus::Pending), 3)]);
    harness.coordinator.allocation().sync_location(1, PalletLocation::InBuffer { cell_id: 3 });
    let mut assigned = Operation::new(120, 1, EDGING, OperationStatus::Pending);
    assigned.machine_id = Some(EDGE_BANDER);
    harness
        .service
        .script_assign(Ok(AssignToMachineResponse { operation: assigned.clone() }));

    let operation = harness
        .coordinator
        .assign_to_machine(AssignToMachine {
            pallet_id: 1,
            machine_id: EDGE_BANDER,
            segment_id: 3,
            operator_id: None,
        })
        .await
        .into_result()
        .unwrap();

    assert_eq!(operation, assigned);
    let stored = harness.store().get(1).unwrap();
    assert_eq!(stored.location, PalletLocation::OnMachine { machine_id: EDGE_BANDER });
    assert_eq!(stored.current_stage_progress, Some(assigned));
    assert!(harness.coordinator.allocation().cells().held_by(1).is_none());
}

#[tokio::test]
async fn test_complete_work_unlocks_next_stage() {
    let mut working = in_buffer(pallet(1, "П-1", 10, CUTTING, OperationStatus::InProgress), 1);
    working.current_stage_progress = Some(in_progress(1, CUTTING, SAW));
    let harness = Harness::new([working]);

    let mut completed = in_progress(1, CUTTING, SAW);
    completed.status = OperationStatus::Completed;
    let mut server_pallet = in_buffer(pallet(1, "П-1", 10, EDGING, OperationStatus::Pending), 1);
    server_pallet.version = Some(2);
    harness.service.script_complete(Ok(CompleteProcessingResponse {
        operation: completed.clone(),
        pallet: server_pallet,
        next_step_name: Some("Кромкооблицовка".to_string()),
    }));

    let completion = harness
        .coordinator
        .complete_work(CompleteWork {
            pallet_id: 1,
            stage_id: CUTTING,
            machine_id: None,
            operator_id: Some(OPERATOR),
        })
        .await
        .into_result()
        .unwrap();

    assert_eq!(completion.completed, completed);
    let next = completion.next_operation.expect("edging should be unlocked");
    assert_eq!(next.stage_id, EDGING);
    assert_eq!(next.status, OperationStatus::Pending);
    assert_eq!(completion.next_step_name.as_deref(), Some("Кромкооблицовка"));

    let stored = harness.store().get(1).unwrap();
    assert_eq!(stored.current_stage_id(), Some(EDGING));
    assert_eq!(stored.record_for_stage(CUTTING).map(|op| op.status), Some(OperationStatus::Completed));
}

#[tokio::test]
async fn test_complete_work_requires_buffer_location() {
    let mut working = pallet(1, "П-1", 10, CUTTING, OperationStatus::InProgress);
    working.current_stage_progress = Some(in_progress(1, CUTTING, SAW));
    let harness = Harness::new([working]);

    let resolution = harness
        .coordinator
        .complete_work(CompleteWork {
            pallet_id: 1,
            stage_id: CUTTING,
            machine_id: None,
            operator_id: Some(OPERATOR),
        })
        .await;

    assert_eq!(resolution.into_result(), Err(PalletError::BufferLocationRequired));
    assert!(harness.service.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_command_times_out_as_transport_failure() {
    let harness = Harness::new([pallet(1, "П-1", 10, CUTTING, OperationStatus::Pending)]);
    harness.service.hold();

    let resolution = harness.coordinator.start_work(start_on_saw(1, CUTTING)).await;

    assert!(matches!(resolution, CommandResolution::TransportFailed(_)));
    assert_eq!(resolution.error().map(PalletError::kind), Some(ErrorKind::Transport));
    let stored = harness.store().get(1).unwrap();
    assert_eq!(
        stored.current_stage_progress.map(|op| op.status),
        Some(OperationStatus::Pending)
    );
    assert!(harness.coordinator.in_flight().is_empty());
}

#[tokio::test]
async fn test_transport_error_rolls_back() {
    let harness = Harness::new([pallet(1, "П-1", 10, CUTTING, OperationStatus::Pending)]);
    harness
        .service
        .script_start(Err(RemoteError::Transport("connection reset".to_string())));

    let resolution = harness.coordinator.start_work(start_on_saw(1, CUTTING)).await;

    assert!(matches!(resolution, CommandResolution::TransportFailed(ref e) if e.to_string().contains("connection reset")));
    assert_eq!(
        harness.store().get(1).unwrap().current_stage_progress.map(|op| op.status),
        Some(OperationStatus::Pending)
    );
}

#[tokio::test(start_paused = true)]
async fn test_conflict_schedules_refetch() {
    let harness = Harness::new([pallet(1, "П-1", 10, CUTTING, OperationStatus::Pending)]);
    harness
        .service
        .script_start(Err(RemoteError::rejected(409, "version mismatch")));

    let resolution = harness.coordinator.start_work(start_on_saw(1, CUTTING)).await;

    let error = resolution.into_result().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Conflict);
    assert_eq!(error.to_string(), "version mismatch");
    assert!(harness.coordinator.reconciler().debouncer().is_pending(1));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!harness.coordinator.reconciler().debouncer().is_pending(1));
}
