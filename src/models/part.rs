use super::{PartId, StageId};
use serde::{Deserialize, Serialize};

/// Catalog entry for a detail; read-only to this crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub part_id: PartId,
    pub article: String,
    pub name: String,
    pub material: String,
    pub size: String,
    pub total_quantity: u32,
    pub completed: u32,
    pub ready_for_processing: u32,
}

/// One step of a part's manufacturing route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStage {
    pub stage_id: StageId,
    pub name: String,
    pub sequence: u32,
}

/// Ordered route of a part. Stages are kept sorted by `sequence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RouteWire")]
pub struct Route {
    pub part_id: PartId,
    stages: Vec<RouteStage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteWire {
    part_id: PartId,
    stages: Vec<RouteStage>,
}

impl From<RouteWire> for Route {
    fn from(wire: RouteWire) -> Self {
        Route::new(wire.part_id, wire.stages)
    }
}

impl Route {
    pub fn new(part_id: PartId, mut stages: Vec<RouteStage>) -> Self {
        stages.sort_by_key(|stage| stage.sequence);
        Self { part_id, stages }
    }

    pub fn stages(&self) -> &[RouteStage] {
        &self.stages
    }

    pub fn stage(&self, stage_id: StageId) -> Option<&RouteStage> {
        self.stages.iter().find(|stage| stage.stage_id == stage_id)
    }

    fn position(&self, stage_id: StageId) -> Option<usize> {
        self.stages.iter().position(|stage| stage.stage_id == stage_id)
    }

    pub fn first(&self) -> Option<&RouteStage> {
        self.stages.first()
    }

    pub fn is_first_stage(&self, stage_id: StageId) -> bool {
        self.position(stage_id) == Some(0)
    }

    pub fn predecessor_of(&self, stage_id: StageId) -> Option<&RouteStage> {
        match self.position(stage_id)? {
            0 => None,
            idx => self.stages.get(idx - 1),
        }
    }

    pub fn successor_of(&self, stage_id: StageId) -> Option<&RouteStage> {
        self.position(stage_id)
            .and_then(|idx| self.stages.get(idx + 1))
    }

    /// Human-readable stage name, falling back to the id for unknown stages
    pub fn stage_name(&self, stage_id: StageId) -> String {
        self.stage(stage_id)
            .map(|stage| stage.name.clone())
            .unwrap_or_else(|| format!("stage {stage_id}"))
    }
}
