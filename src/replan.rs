//! Incremental replanning.
//!
//! A trigger names the segment it affects. The prefix before that segment is
//! kept as is, the state after the prefix becomes the checkpoint, the
//! trigger's effect is applied, and the builder runs again over the stops not
//! yet docked. Batches apply in order, each against the list the previous
//! trigger left behind.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assembler::{self, AssemblyInput, RoutePlan};
use crate::builder::{self, BuildAdjustments, BuildContext, BuildCursor};
use crate::error::PlanningError;
use crate::hos::HosState;
use crate::matrix::dedupe_locations;
use crate::model::{PlanRequest, Stop};
use crate::segment::{Segment, SegmentKind};
use crate::traits::{CostModel, DistanceMatrixProvider};
use crate::trigger::{ImpactSummary, Trigger, TriggerKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub plan: RoutePlan,
    pub impact: ImpactSummary,
    pub replan_triggered: bool,
    pub replan_reason: Option<String>,
}

/// Apply `triggers` to `base` and assemble the next draft version.
///
/// Nothing is stored; the caller decides whether to append the result.
pub fn apply_triggers<M: DistanceMatrixProvider, C: CostModel>(
    base: &RoutePlan,
    triggers: &[Trigger],
    provider: &M,
    cost_model: &C,
    created_at: DateTime<Utc>,
) -> Result<SimulationResult, PlanningError> {
    if triggers.is_empty() {
        return Err(PlanningError::InvalidInput("no triggers to apply".into()));
    }

    let mut request = base.request.clone();
    let mut segments = base.segments.clone();
    let mut issues: Vec<String> = Vec::new();
    let mut builder_feasible = base.is_feasible;
    let mut unavoidable: Vec<String> = Vec::new();

    for trigger in triggers {
        trigger.validate()?;
        let idx = segments
            .iter()
            .position(|s| s.sequence_order == trigger.segment)
            .ok_or(PlanningError::SegmentNotFound(trigger.segment))?;

        let mut start = match idx {
            0 => BuildCursor::origin(&request)?,
            _ => BuildCursor::after(&segments[idx - 1]),
        };
        let adjustments = apply_effect(trigger, &segments[idx], &mut request, &mut start, &mut unavoidable)?;

        let remaining = remaining_stops(&request, &base.stop_sequence, &segments[..idx]);
        let mut locations = vec![start.at.location];
        locations.extend(remaining.iter().map(|stop| stop.location));
        locations.extend(request.fuel_stations.iter().map(|station| station.location));
        let matrix = provider.matrix_for(&dedupe_locations(locations), request.config.avoid_tolls);

        let ctx = BuildContext {
            config: &request.config,
            matrix: &matrix,
            stations: &request.fuel_stations,
            cost_model,
        };
        let outcome = builder::build_segments(&ctx, start, &remaining, &adjustments).inspect_err(|err| {
            if err.is_contract_violation() {
                tracing::error!(error = %err, segment = trigger.segment, "replan broke an HOS or fuel contract");
            }
        })?;

        tracing::debug!(
            trigger = %trigger.describe(),
            kept = idx,
            rebuilt = outcome.segments.len(),
            "suffix rebuilt"
        );
        segments.truncate(idx);
        segments.extend(outcome.segments);
        issues = outcome.issues;
        builder_feasible = outcome.is_feasible;
    }

    issues.extend(unavoidable.iter().cloned());
    let plan = assembler::assemble(
        AssemblyInput {
            plan_id: base.plan_id,
            plan_version: base.plan_version + 1,
            stop_sequence: base.stop_sequence.clone(),
            segments,
            issues,
            builder_feasible,
            created_at,
            request,
        },
        cost_model,
    )?;

    let descriptions = triggers.iter().map(Trigger::describe).collect();
    let impact = ImpactSummary::between(base, &plan, descriptions);
    let reasons = replan_reasons(&impact, &unavoidable, base.request.config.replan_eta_threshold_hours);
    let replan_triggered = !reasons.is_empty();
    let replan_reason = replan_triggered.then(|| reasons.join("; "));

    tracing::info!(
        plan_id = %plan.plan_id,
        version = plan.plan_version,
        eta_change_hours = impact.total_eta_change_hours,
        replan_triggered,
        "triggers applied"
    );

    Ok(SimulationResult {
        plan,
        impact,
        replan_triggered,
        replan_reason,
    })
}

/// Edit the request or the checkpoint for one trigger.
fn apply_effect(
    trigger: &Trigger,
    target: &Segment,
    request: &mut PlanRequest,
    start: &mut BuildCursor,
    unavoidable: &mut Vec<String>,
) -> Result<BuildAdjustments, PlanningError> {
    let mut adjustments = BuildAdjustments::default();
    match &trigger.kind {
        TriggerKind::TrafficDelay { delay_minutes } => {
            if !matches!(target.kind, SegmentKind::Drive { .. }) {
                return Err(mismatch(trigger, "a drive"));
            }
            adjustments.first_leg_delay_hours = delay_minutes / 60.0;
        }
        TriggerKind::DockTimeChange { actual_dock_hours } => {
            let stop = docked_stop(trigger, target, request)?;
            stop.dock_hours = *actual_dock_hours;
        }
        TriggerKind::DriverRestRequest { rest_hours } => {
            adjustments.initial_rest_hours = Some(*rest_hours);
        }
        TriggerKind::FuelPriceSpike {
            station_id,
            price_per_gallon,
        } => match station_id {
            Some(id) => {
                let station = request
                    .fuel_stations
                    .iter_mut()
                    .find(|station| &station.id == id)
                    .ok_or_else(|| PlanningError::TriggerMismatch(format!("unknown fuel station '{id}'")))?;
                station.price_per_gallon = *price_per_gallon;
            }
            None => request.config.fuel.default_price_per_gallon = *price_per_gallon,
        },
        TriggerKind::AppointmentChange {
            earliest_arrival,
            latest_arrival,
        } => {
            let stop = docked_stop(trigger, target, request)?;
            stop.earliest_arrival = *earliest_arrival;
            stop.latest_arrival = *latest_arrival;
        }
        TriggerKind::HosViolation { reported } => {
            let rules = &request.config.hos;
            let hos = HosState::from_snapshot(reported, rules)?.with_day_clock(start.hos.day_clock_hours);
            let exceeded = hos.exceeded_limits(rules);
            if !exceeded.is_empty() {
                let reason = format!(
                    "driver reported hours past {exceeded:?} at segment {}; dispatcher decision needed",
                    trigger.segment
                );
                tracing::warn!(segment = trigger.segment, ?exceeded, "reported HOS violation");
                unavoidable.push(reason);
            }
            start.hos = hos;
        }
    }
    Ok(adjustments)
}

fn mismatch(trigger: &Trigger, expected: &str) -> PlanningError {
    PlanningError::TriggerMismatch(format!(
        "{} needs {expected} segment",
        trigger.describe()
    ))
}

fn docked_stop<'r>(trigger: &Trigger, target: &Segment, request: &'r mut PlanRequest) -> Result<&'r mut Stop, PlanningError> {
    let stop_id = target.dock_stop_id().ok_or_else(|| mismatch(trigger, "a dock"))?;
    request
        .stop_mut(stop_id)
        .ok_or_else(|| PlanningError::TriggerMismatch(format!("stop '{stop_id}' is not part of the request")))
}

/// Stops in plan order that `prefix` has not docked yet.
fn remaining_stops(request: &PlanRequest, sequence: &[String], prefix: &[Segment]) -> Vec<Stop> {
    let docked: HashSet<&str> = prefix.iter().filter_map(Segment::dock_stop_id).collect();
    sequence
        .iter()
        .filter(|id| !docked.contains(id.as_str()))
        .filter_map(|id| request.stop(id).cloned())
        .collect()
}

fn replan_reasons(impact: &ImpactSummary, unavoidable: &[String], eta_threshold_hours: f64) -> Vec<String> {
    let mut reasons: Vec<String> = unavoidable.to_vec();
    if impact.total_eta_change_hours.abs() >= eta_threshold_hours {
        reasons.push(format!("ETA moved {:+.2}h", impact.total_eta_change_hours));
    }
    if impact.stops_changed() {
        reasons.push(format!(
            "stops changed: {:+} rest, {:+} break, {:+} fuel",
            impact.rest_stops_added, impact.breaks_added, impact.fuel_stops_added
        ));
    }
    if !impact.new_compliance_issues.is_empty() {
        reasons.push(format!("{} new issue(s)", impact.new_compliance_issues.len()));
    }
    if impact.feasibility_changed {
        reasons.push("feasibility changed".to_string());
    }
    reasons
}
