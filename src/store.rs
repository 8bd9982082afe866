//! In-memory plan version store.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::assembler::{PlanId, PlanStatus, RoutePlan};
use crate::error::PlanningError;
use crate::traits::PlanVersionStore;

/// Versions for every route, oldest first; index `v - 1` holds version `v`.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    chains: RwLock<HashMap<PlanId, Vec<RoutePlan>>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route_count(&self) -> usize {
        self.chains.read().len()
    }
}

impl PlanVersionStore for InMemoryPlanStore {
    fn append(&self, plan: RoutePlan) -> Result<(), PlanningError> {
        let mut chains = self.chains.write();
        let chain = chains.entry(plan.plan_id).or_default();
        let head = chain.len() as u32;
        if plan.plan_version != head + 1 {
            return Err(PlanningError::StaleVersion {
                plan_id: plan.plan_id,
                expected: plan.plan_version.saturating_sub(1),
                head,
            });
        }
        tracing::info!(plan_id = %plan.plan_id, version = plan.plan_version, status = ?plan.status, "plan version appended");
        chain.push(plan);
        Ok(())
    }

    fn get(&self, plan_id: PlanId, version: u32) -> Option<RoutePlan> {
        let index = version.checked_sub(1)? as usize;
        self.chains.read().get(&plan_id)?.get(index).cloned()
    }

    fn head(&self, plan_id: PlanId) -> Option<RoutePlan> {
        self.chains.read().get(&plan_id)?.last().cloned()
    }

    fn active(&self, plan_id: PlanId) -> Option<RoutePlan> {
        self.chains
            .read()
            .get(&plan_id)?
            .iter()
            .rev()
            .find(|plan| plan.status == PlanStatus::Active)
            .cloned()
    }

    fn versions(&self, plan_id: PlanId) -> Vec<(u32, PlanStatus)> {
        self.chains
            .read()
            .get(&plan_id)
            .map(|chain| chain.iter().map(|plan| (plan.plan_version, plan.status)).collect())
            .unwrap_or_default()
    }

    fn set_status(&self, plan_id: PlanId, version: u32, status: PlanStatus) -> Result<(), PlanningError> {
        let mut chains = self.chains.write();
        let chain = chains.get_mut(&plan_id).ok_or(PlanningError::PlanNotFound(plan_id))?;
        let plan = version
            .checked_sub(1)
            .and_then(|index| chain.get_mut(index as usize))
            .ok_or(PlanningError::VersionNotFound { plan_id, version })?;
        if !plan.status.can_transition_to(status) {
            return Err(PlanningError::InvalidTransition {
                from: plan.status,
                to: status,
            });
        }
        tracing::info!(%plan_id, version, from = ?plan.status, to = ?status, "plan status changed");
        plan.status = status;
        Ok(())
    }
}
