use super::errors::{GuardError, GuardResult};
use crate::models::{OperatorId, Pallet, PalletLocation, Route};

/// Snapshot a guard evaluates against
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub pallet: &'a Pallet,
    pub route: &'a Route,
    pub operator_id: Option<OperatorId>,
}

/// Trait for implementing state transition guards
pub trait StateGuard {
    /// Check if a transition is allowed
    fn check(&self, ctx: &StageContext<'_>) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard to check the predecessor stage's record is completed before work starts.
///
/// A missing predecessor record counts as not completed.
pub struct PredecessorCompletedGuard;

impl StateGuard for PredecessorCompletedGuard {
    fn check(&self, ctx: &StageContext<'_>) -> GuardResult<()> {
        let Some(stage_id) = ctx.pallet.current_stage_id() else {
            return Ok(());
        };
        let Some(predecessor) = ctx.route.predecessor_of(stage_id) else {
            return Ok(());
        };

        let completed = ctx
            .pallet
            .record_for_stage(predecessor.stage_id)
            .is_some_and(|op| op.status.satisfies_successor());

        if completed {
            Ok(())
        } else {
            Err(GuardError::PredecessorNotCompleted {
                stage_name: predecessor.name.clone(),
            })
        }
    }

    fn description(&self) -> &'static str {
        "Predecessor stage must be completed"
    }
}

/// Guard to check a buffer cell is assigned before work is completed
pub struct BufferLocationAssignedGuard;

impl StateGuard for BufferLocationAssignedGuard {
    fn check(&self, ctx: &StageContext<'_>) -> GuardResult<()> {
        match ctx.pallet.location {
            PalletLocation::InBuffer { .. } => Ok(()),
            _ => Err(GuardError::BufferLocationRequired),
        }
    }

    fn description(&self) -> &'static str {
        "Pallet must be assigned to a buffer cell"
    }
}

/// Guard to check an operator is identified
pub struct OperatorPresentGuard;

impl StateGuard for OperatorPresentGuard {
    fn check(&self, ctx: &StageContext<'_>) -> GuardResult<()> {
        match ctx.operator_id {
            Some(id) if id > 0 => Ok(()),
            _ => Err(GuardError::OperatorRequired),
        }
    }

    fn description(&self) -> &'static str {
        "Operator must be identified"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, RouteStage};
    use crate::state_machine::states::OperationStatus;

    fn route() -> Route {
        Route::new(
            1,
            vec![
                RouteStage { stage_id: 10, name: "Раскрой".into(), sequence: 1 },
                RouteStage { stage_id: 20, name: "Кромкооблицовка".into(), sequence: 2 },
            ],
        )
    }

    fn pallet_at_stage_two(predecessor: Option<OperationStatus>) -> Pallet {
        let mut pallet = Pallet::new(1, "П-1", 10, 1);
        if let Some(status) = predecessor {
            pallet.stage_history.push(Operation::new(1, 1, 10, status));
        }
        pallet.current_stage_progress = Some(Operation::new(2, 1, 20, OperationStatus::NotProcessed));
        pallet
    }

    #[test]
    fn test_guard_descriptions() {
        assert_eq!(
            PredecessorCompletedGuard.description(),
            "Predecessor stage must be completed"
        );
        assert_eq!(
            BufferLocationAssignedGuard.description(),
            "Pallet must be assigned to a buffer cell"
        );
        assert_eq!(OperatorPresentGuard.description(), "Operator must be identified");
    }

    #[test]
    fn test_predecessor_guard_names_blocking_stage() {
        let route = route();
        let pallet = pallet_at_stage_two(Some(OperationStatus::InProgress));
        let ctx = StageContext { pallet: &pallet, route: &route, operator_id: Some(1) };

        assert_eq!(
            PredecessorCompletedGuard.check(&ctx),
            Err(GuardError::PredecessorNotCompleted {
                stage_name: "Раскрой".to_string()
            })
        );
    }

    #[test]
    fn test_predecessor_guard_passes_when_completed_or_first() {
        let route = route();
        let pallet = pallet_at_stage_two(Some(OperationStatus::Completed));
        let ctx = StageContext { pallet: &pallet, route: &route, operator_id: None };
        assert!(PredecessorCompletedGuard.check(&ctx).is_ok());

        let mut first = Pallet::new(2, "П-2", 5, 1);
        first.current_stage_progress = Some(Operation::new(3, 2, 10, OperationStatus::Pending));
        let ctx = StageContext { pallet: &first, route: &route, operator_id: None };
        assert!(PredecessorCompletedGuard.check(&ctx).is_ok());
    }

    #[test]
    fn test_missing_predecessor_record_blocks() {
        let route = route();
        let pallet = pallet_at_stage_two(None);
        let ctx = StageContext { pallet: &pallet, route: &route, operator_id: None };
        assert!(PredecessorCompletedGuard.check(&ctx).is_err());
    }

    #[test]
    fn test_operator_guard() {
        let route = route();
        let pallet = pallet_at_stage_two(None);
        let ctx = StageContext { pallet: &pallet, route: &route, operator_id: None };
        assert_eq!(OperatorPresentGuard.check(&ctx), Err(GuardError::OperatorRequired));
    }
}
