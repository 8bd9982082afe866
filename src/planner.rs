//! Planning entry points.
//!
//! `plan_route` is the pure pipeline: validate, sequence, build, assemble.
//! `RoutePlanner` wraps it with a version store and serialises writes per
//! logical route, so two replans racing on the same base version cannot both
//! land.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rayon::prelude::*;
use uuid::Uuid;

use crate::assembler::{self, AssemblyInput, PlanId, PlanStatus, RoutePlan};
use crate::builder::{self, BuildAdjustments, BuildContext, BuildCursor};
use crate::error::PlanningError;
use crate::matrix::dedupe_locations;
use crate::model::{PlanRequest, Stop};
use crate::replan::{self, SimulationResult};
use crate::sequencer;
use crate::traits::{CostModel, DistanceMatrixProvider, PlanVersionStore};
use crate::trigger::Trigger;

/// Plan `request` as version 1 of `plan_id`.
///
/// Deterministic: the same request always yields the same segments.
pub fn plan_route<M: DistanceMatrixProvider, C: CostModel>(
    request: PlanRequest,
    provider: &M,
    cost_model: &C,
    plan_id: PlanId,
    created_at: DateTime<Utc>,
) -> Result<RoutePlan, PlanningError> {
    request.validate()?;
    let config = &request.config;
    let start = BuildCursor::origin(&request)?;

    let mut locations = vec![request.origin.location];
    locations.extend(request.stops.iter().map(|stop| stop.location));
    locations.extend(request.fuel_stations.iter().map(|station| station.location));
    let matrix = provider.matrix_for(&dedupe_locations(locations), config.avoid_tolls);

    let sequence = sequencer::sequence_stops(
        request.origin.location,
        &request.stops,
        &matrix,
        cost_model,
        config,
        request.optimize_sequence,
    )?;
    let ordered: Vec<Stop> = sequence.order.iter().map(|&i| request.stops[i].clone()).collect();

    let ctx = BuildContext {
        config,
        matrix: &matrix,
        stations: &request.fuel_stations,
        cost_model,
    };
    let outcome =
        builder::build_segments(&ctx, start, &ordered, &BuildAdjustments::default()).inspect_err(|err| {
            if err.is_contract_violation() {
                tracing::error!(error = %err, %plan_id, "planning broke an HOS or fuel contract");
            }
        })?;

    let stop_sequence = ordered.iter().map(|stop| stop.id.clone()).collect();
    let plan = assembler::assemble(
        AssemblyInput {
            plan_id,
            plan_version: 1,
            stop_sequence,
            segments: outcome.segments,
            issues: outcome.issues,
            builder_feasible: outcome.is_feasible,
            created_at,
            request,
        },
        cost_model,
    )?;

    tracing::info!(
        %plan_id,
        driver = %plan.request.driver_id,
        stops = plan.stop_sequence.len(),
        segments = plan.segments.len(),
        is_feasible = plan.is_feasible,
        total_miles = plan.totals.distance_miles,
        "plan created"
    );
    Ok(plan)
}

/// Planning service over a version store.
pub struct RoutePlanner<M, C, S> {
    provider: M,
    cost_model: C,
    store: S,
    route_locks: Mutex<HashMap<PlanId, Arc<Mutex<()>>>>,
}

impl<M, C, S> RoutePlanner<M, C, S>
where
    M: DistanceMatrixProvider,
    C: CostModel,
    S: PlanVersionStore,
{
    pub fn new(provider: M, cost_model: C, store: S) -> Self {
        Self {
            provider,
            cost_model,
            store,
            route_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn route_lock(&self, plan_id: PlanId) -> Arc<Mutex<()>> {
        self.route_locks
            .lock()
            .entry(plan_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Plan a new route and store it as draft version 1.
    pub fn plan(&self, request: PlanRequest) -> Result<RoutePlan, PlanningError> {
        let plan = plan_route(request, &self.provider, &self.cost_model, Uuid::new_v4(), Utc::now())?;
        self.store.append(plan.clone())?;
        Ok(plan)
    }

    /// Replan from `base_version`, which must still be the head of the chain.
    pub fn simulate_triggers(
        &self,
        plan_id: PlanId,
        base_version: u32,
        triggers: &[Trigger],
    ) -> Result<SimulationResult, PlanningError> {
        let lock = self.route_lock(plan_id);
        let _guard = lock.lock();

        let head = self.store.head(plan_id).ok_or(PlanningError::PlanNotFound(plan_id))?;
        if head.plan_version != base_version {
            tracing::warn!(%plan_id, base_version, head = head.plan_version, "stale replan rejected");
            return Err(PlanningError::StaleVersion {
                plan_id,
                expected: base_version,
                head: head.plan_version,
            });
        }
        if !head.status.is_replannable() {
            return Err(PlanningError::InvalidTransition {
                from: head.status,
                to: PlanStatus::Draft,
            });
        }

        let result = replan::apply_triggers(&head, triggers, &self.provider, &self.cost_model, Utc::now())?;
        self.store.append(result.plan.clone())?;
        Ok(result)
    }

    /// Make `version` the active plan, superseding the previous active one.
    pub fn activate(&self, plan_id: PlanId, version: u32) -> Result<RoutePlan, PlanningError> {
        let lock = self.route_lock(plan_id);
        let _guard = lock.lock();

        let target = self
            .store
            .get(plan_id, version)
            .ok_or(PlanningError::VersionNotFound { plan_id, version })?;
        if !target.status.can_transition_to(PlanStatus::Active) {
            return Err(PlanningError::InvalidTransition {
                from: target.status,
                to: PlanStatus::Active,
            });
        }
        if let Some(previous) = self.store.active(plan_id) {
            self.store
                .set_status(plan_id, previous.plan_version, PlanStatus::Superseded)?;
        }
        self.store.set_status(plan_id, version, PlanStatus::Active)?;
        self.store
            .get(plan_id, version)
            .ok_or(PlanningError::VersionNotFound { plan_id, version })
    }

    pub fn cancel(&self, plan_id: PlanId, version: u32) -> Result<(), PlanningError> {
        self.transition(plan_id, version, PlanStatus::Cancelled)
    }

    pub fn complete(&self, plan_id: PlanId, version: u32) -> Result<(), PlanningError> {
        self.transition(plan_id, version, PlanStatus::Completed)
    }

    fn transition(&self, plan_id: PlanId, version: u32, status: PlanStatus) -> Result<(), PlanningError> {
        let lock = self.route_lock(plan_id);
        let _guard = lock.lock();
        self.store.set_status(plan_id, version, status)?;
        // No draft or active version left: nothing can change this route again.
        if self.store.versions(plan_id).iter().all(|(_, status)| !status.is_replannable()) {
            self.route_locks.lock().remove(&plan_id);
            tracing::debug!(%plan_id, ?status, "route closed");
        }
        Ok(())
    }
}

impl<M, C, S> RoutePlanner<M, C, S>
where
    M: DistanceMatrixProvider + Sync,
    C: CostModel + Sync,
    S: PlanVersionStore + Sync,
{
    /// Plan independent routes in parallel. Results keep the input order.
    pub fn plan_batch(&self, requests: Vec<PlanRequest>) -> Vec<Result<RoutePlan, PlanningError>> {
        requests.into_par_iter().map(|request| self.plan(request)).collect()
    }
}
