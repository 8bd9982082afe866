//! Seams to the collaborators around the engine.
//!
//! The engine itself is synchronous and side-effect free; geometry, cost
//! policy and plan persistence come in through these traits.

use crate::assembler::{PlanId, PlanStatus, RoutePlan};
use crate::config::CostRates;
use crate::cost::{CostBreakdown, CostInputs};
use crate::error::PlanningError;
use crate::matrix::LegMatrix;
use crate::model::Coordinates;

/// Provides road distance and drive time between every pair of locations.
///
/// The matrix is indexed by the provided locations. Implementations should
/// never fail outright; an estimate is better than no plan.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, locations: &[Coordinates], avoid_tolls: bool) -> LegMatrix;
}

/// Dispatcher cost policy.
pub trait CostModel {
    /// Cost of driving one leg; used to score stop orders and fuel detours.
    fn leg_cost(&self, miles: f64, hours: f64, rates: &CostRates) -> f64;

    /// Roll trip totals up into a cost estimate.
    fn trip_cost(&self, inputs: &CostInputs, rates: &CostRates) -> CostBreakdown;
}

/// Append-only chain of plan versions per logical route.
///
/// Versions are never rewritten; only their status moves.
pub trait PlanVersionStore {
    /// Append a version. Must be exactly one past the current head.
    fn append(&self, plan: RoutePlan) -> Result<(), PlanningError>;

    fn get(&self, plan_id: PlanId, version: u32) -> Option<RoutePlan>;

    /// Latest version, whatever its status.
    fn head(&self, plan_id: PlanId) -> Option<RoutePlan>;

    /// The single active version, if any.
    fn active(&self, plan_id: PlanId) -> Option<RoutePlan>;

    /// Version numbers with their current status, oldest first.
    fn versions(&self, plan_id: PlanId) -> Vec<(u32, PlanStatus)>;

    fn set_status(&self, plan_id: PlanId, version: u32, status: PlanStatus) -> Result<(), PlanningError>;
}
