//! Error taxonomy.
//!
//! Infeasible routes are not errors: they come back as a plan with
//! `is_feasible == false`. Errors here are caller mistakes, version
//! conflicts, or internal contract violations.

use thiserror::Error;

use crate::assembler::{PlanId, PlanStatus};

/// The HOS state machine was asked to do something illegal.
///
/// Seeing one of these means the segment builder failed to insert a rest or
/// break first.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HosError {
    #[error("duration must be finite and non-negative, got {0}")]
    InvalidDuration(f64),

    #[error("driving {requested:.2}h would exceed the {limit}h drive limit ({used:.2}h used)")]
    DriveLimitExceeded { requested: f64, used: f64, limit: f64 },

    #[error("driving {requested:.2}h would exceed the {limit}h duty window ({used:.2}h used)")]
    DutyWindowExceeded { requested: f64, used: f64, limit: f64 },

    #[error("driving {requested:.2}h would pass {limit}h without a break ({used:.2}h since last break)")]
    BreakRequired { requested: f64, used: f64, limit: f64 },

    #[error("driving {requested:.2}h would exceed the {limit}h cycle ({used:.2}h used)")]
    CycleExhausted { requested: f64, used: f64, limit: f64 },

    #[error("split rest portion of {hours:.2}h is shorter than the required {required}h")]
    SplitPortionTooShort { hours: f64, required: f64 },

    #[error("HOS invariant broken: {0}")]
    InvariantBroken(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FuelError {
    #[error("fuel amount must be finite and non-negative, got {0}")]
    InvalidAmount(f64),

    #[error("driving {miles:.1} mi needs {needed:.1} gal but only {available:.1} gal remain")]
    Exhausted { miles: f64, needed: f64, available: f64 },

    #[error("adding {added:.1} gal would overfill the tank ({current:.1}/{capacity:.1} gal)")]
    Overfill { added: f64, current: f64, capacity: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("HOS contract violation: {0}")]
    Hos(#[from] HosError),

    #[error("fuel contract violation: {0}")]
    Fuel(#[from] FuelError),

    #[error("plan {0} not found")]
    PlanNotFound(PlanId),

    #[error("plan {plan_id} has no version {version}")]
    VersionNotFound { plan_id: PlanId, version: u32 },

    #[error("stale plan version for {plan_id}: based on v{expected}, head is v{head}")]
    StaleVersion { plan_id: PlanId, expected: u32, head: u32 },

    #[error("segment {0} not found in plan")]
    SegmentNotFound(u32),

    #[error("trigger does not apply: {0}")]
    TriggerMismatch(String),

    #[error("cannot move plan from {from:?} to {to:?}")]
    InvalidTransition { from: PlanStatus, to: PlanStatus },
}

impl PlanningError {
    /// True for internal invariant failures that should page engineering.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, PlanningError::Hos(_) | PlanningError::Fuel(_))
    }
}
