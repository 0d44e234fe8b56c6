use pallet_core::models::{Distribution, RedistributionPlan};
use proptest::prelude::*;

/// Quantities of the pallets initially in the store, ids 1..=n
pub fn pallet_quantities_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..=200, 1..6)
}

/// A single distribution against a store of `pallet_count` pallets.
/// Existing targets may point past the store to exercise not-found rejection.
pub fn distribution_strategy(pallet_count: usize) -> impl Strategy<Value = Distribution> {
    let max_id = pallet_count as i64 + 1;
    prop_oneof![
        (1i64..=max_id, 0u32..=120).prop_map(|(id, qty)| Distribution::to_existing(id, qty)),
        ("[A-Z]-[0-9]{1,2}", 0u32..=120).prop_map(|(name, qty)| Distribution::to_new(name, qty)),
    ]
}

/// A plan whose source is one of the store's pallets
pub fn plan_strategy(pallet_count: usize) -> impl Strategy<Value = RedistributionPlan> {
    (
        1i64..=pallet_count as i64,
        prop::collection::vec(distribution_strategy(pallet_count), 0..5),
    )
        .prop_map(|(source, distributions)| RedistributionPlan::new(source, distributions))
}

/// Quantities (possibly oversized) to report as defective, one per step
pub fn defect_quantities_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..=60, 1..8)
}

/// One quantity-changing step against the store's original pallets
#[derive(Debug, Clone)]
pub enum QuantityStep {
    Defect { pallet_id: i64, quantity: u32 },
    Redistribute(RedistributionPlan),
}

/// Defects and redistributions interleaved in arbitrary order
pub fn quantity_steps_strategy(pallet_count: usize) -> impl Strategy<Value = Vec<QuantityStep>> {
    let step = prop_oneof![
        (1i64..=pallet_count as i64, 0u32..=60)
            .prop_map(|(pallet_id, quantity)| QuantityStep::Defect { pallet_id, quantity }),
        plan_strategy(pallet_count).prop_map(QuantityStep::Redistribute),
    ];
    prop::collection::vec(step, 1..10)
}
