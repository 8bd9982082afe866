//! Trigger-driven replanning against the version store.
//!
//! The base plan for most tests is `two_stop_request`:
//! 1 Drive depot→A (2h), 2 Dock A (1h), 3 Drive A→B (8h), 4 Dock B (1h).

mod fixtures;

use std::thread;

use fixtures::*;
use hos_planner::cost::LinearCostModel;
use hos_planner::model::DriverSnapshot;
use hos_planner::segment::{RestReason, RestType, SegmentKind, SegmentType};
use hos_planner::store::InMemoryPlanStore;
use hos_planner::traits::PlanVersionStore;
use hos_planner::{PlanStatus, PlanningError, RoutePlan, RoutePlanner, Trigger, TriggerKind};

type GridPlanner = RoutePlanner<GridMatrix, LinearCostModel, InMemoryPlanStore>;

fn planner_with_base() -> (GridPlanner, RoutePlan) {
    init_tracing();
    let planner = RoutePlanner::new(GridMatrix::default(), LinearCostModel, InMemoryPlanStore::new());
    let base = planner.plan(two_stop_request()).unwrap();
    let active = planner.activate(base.plan_id, 1).unwrap();
    (planner, active)
}

fn types(plan: &RoutePlan) -> Vec<SegmentType> {
    plan.segments.iter().map(|s| s.segment_type()).collect()
}

#[test]
fn test_base_plan_shape() {
    let (_, base) = planner_with_base();
    assert_eq!(
        types(&base),
        vec![SegmentType::Drive, SegmentType::Dock, SegmentType::Drive, SegmentType::Dock]
    );
    assert_eq!(base.status, PlanStatus::Active);
}

#[test]
fn test_traffic_delay_keeps_prefix_and_cascades() {
    let (planner, base) = planner_with_base();

    let result = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(3, TriggerKind::TrafficDelay { delay_minutes: 90.0 })],
        )
        .unwrap();

    let plan = &result.plan;
    assert_eq!(plan.plan_version, 2);
    assert_eq!(plan.status, PlanStatus::Draft);
    assert_eq!(plan.segments[..2], base.segments[..2]);

    // 9.5h of driving no longer fits the 11h limit after the first 2h leg.
    assert!(result.impact.total_eta_change_hours >= 1.5 - 1e-6);
    assert_eq!(result.impact.rest_stops_added, 1);
    assert_eq!(result.impact.breaks_added, 1);
    assert!(result.replan_triggered);
    assert!(result.replan_reason.as_deref().unwrap().contains("ETA moved"));
    assert_eq!(result.impact.trigger_descriptions, vec!["segment 3: traffic delay of 90 min".to_string()]);

    assert_eq!(planner.store().head(base.plan_id).unwrap().plan_version, 2);
    // The base stays active until the new version is activated.
    assert_eq!(planner.store().active(base.plan_id).unwrap().plan_version, 1);
}

#[test]
fn test_short_delay_adds_break_only() {
    let (planner, base) = planner_with_base();

    let result = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(3, TriggerKind::TrafficDelay { delay_minutes: 30.0 })],
        )
        .unwrap();

    // The delay plus the 30 minute break an 8.5h stint needs.
    assert!((result.impact.total_eta_change_hours - 1.0).abs() < 1e-3);
    assert_eq!(result.impact.rest_stops_added, 0);
    assert_eq!(result.impact.breaks_added, 1);
}

#[test]
fn test_stale_base_version_is_rejected() {
    let (planner, base) = planner_with_base();
    let trigger = [Trigger::new(3, TriggerKind::TrafficDelay { delay_minutes: 20.0 })];

    planner.simulate_triggers(base.plan_id, 1, &trigger).unwrap();
    let err = planner.simulate_triggers(base.plan_id, 1, &trigger).unwrap_err();

    assert!(matches!(err, PlanningError::StaleVersion { expected: 1, head: 2, .. }));
    assert_eq!(planner.store().versions(base.plan_id).len(), 2);
}

#[test]
fn test_concurrent_replans_on_same_base_yield_one_version() {
    let (planner, base) = planner_with_base();
    let trigger = [Trigger::new(3, TriggerKind::TrafficDelay { delay_minutes: 45.0 })];

    let results: Vec<Result<_, PlanningError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| planner.simulate_triggers(base.plan_id, 1, &trigger)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| matches!(err, PlanningError::StaleVersion { .. }))
    );
    assert_eq!(planner.store().versions(base.plan_id).len(), 2);
}

#[test]
fn test_activation_supersedes_previous_active() {
    let (planner, base) = planner_with_base();
    planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(3, TriggerKind::TrafficDelay { delay_minutes: 60.0 })],
        )
        .unwrap();

    let active = planner.activate(base.plan_id, 2).unwrap();

    assert_eq!(active.status, PlanStatus::Active);
    assert_eq!(
        planner.store().versions(base.plan_id),
        vec![(1, PlanStatus::Superseded), (2, PlanStatus::Active)]
    );
    // Superseded versions cannot come back.
    assert!(matches!(
        planner.activate(base.plan_id, 1),
        Err(PlanningError::InvalidTransition { .. })
    ));
}

#[test]
fn test_cancelled_plan_cannot_be_replanned() {
    let (planner, base) = planner_with_base();
    planner.cancel(base.plan_id, 1).unwrap();

    let err = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(1, TriggerKind::TrafficDelay { delay_minutes: 10.0 })],
        )
        .unwrap_err();

    assert!(matches!(err, PlanningError::InvalidTransition { from: PlanStatus::Cancelled, .. }));
}

#[test]
fn test_dock_time_change_shifts_eta() {
    let (planner, base) = planner_with_base();

    let result = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(2, TriggerKind::DockTimeChange { actual_dock_hours: 3.0 })],
        )
        .unwrap();

    let plan = &result.plan;
    assert_eq!(plan.segments[0], base.segments[0]);
    match &plan.segments[1].kind {
        SegmentKind::Dock { stop_id, dock_hours, .. } => {
            assert_eq!(stop_id, "A");
            assert!((dock_hours - 3.0).abs() < 1e-9);
        }
        other => panic!("expected dock A, got {other:?}"),
    }
    assert!((result.impact.total_eta_change_hours - 2.0).abs() < 1e-3);
    assert_eq!(plan.request.stop("A").unwrap().dock_hours, 3.0);
}

#[test]
fn test_dock_trigger_on_drive_segment_is_a_mismatch() {
    let (planner, base) = planner_with_base();

    let err = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(3, TriggerKind::DockTimeChange { actual_dock_hours: 2.0 })],
        )
        .unwrap_err();

    assert!(matches!(err, PlanningError::TriggerMismatch(_)));
    assert_eq!(planner.store().versions(base.plan_id).len(), 1);
}

#[test]
fn test_unknown_segment() {
    let (planner, base) = planner_with_base();

    let err = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(99, TriggerKind::TrafficDelay { delay_minutes: 10.0 })],
        )
        .unwrap_err();

    assert!(matches!(err, PlanningError::SegmentNotFound(99)));
}

#[test]
fn test_driver_rest_request_inserted_at_segment() {
    let (planner, base) = planner_with_base();

    let result = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(3, TriggerKind::DriverRestRequest { rest_hours: 2.0 })],
        )
        .unwrap();

    let plan = &result.plan;
    match &plan.segments[2].kind {
        SegmentKind::Rest { rest_type, reason, .. } => {
            assert_eq!(*rest_type, RestType::OffDuty);
            assert_eq!(*reason, RestReason::DriverRequest);
        }
        other => panic!("expected requested rest, got {other:?}"),
    }
    assert_eq!(plan.segments[2].sequence_order, 3);
    assert!((result.impact.total_eta_change_hours - 2.0).abs() < 1e-3);
    assert!(result.replan_triggered);
}

#[test]
fn test_reported_violation_forces_rest_and_dispatcher_flag() {
    let (planner, base) = planner_with_base();

    let result = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(
                3,
                TriggerKind::HosViolation {
                    reported: DriverSnapshot {
                        hours_driven: 11.5,
                        on_duty_time: 12.0,
                        hours_since_break: 3.0,
                        ..DriverSnapshot::default()
                    },
                },
            )],
        )
        .unwrap();

    assert!(result.replan_triggered);
    assert!(result.replan_reason.as_deref().unwrap().contains("dispatcher decision needed"));
    assert!(result.plan.issues.iter().any(|issue| issue.contains("segment 3")));
    match &result.plan.segments[2].kind {
        SegmentKind::Rest { rest_type, .. } => assert_eq!(*rest_type, RestType::Full),
        other => panic!("expected a rest before driving on, got {other:?}"),
    }
}

#[test]
fn test_fuel_price_spike_on_unused_station_is_quiet() {
    let (planner, base) = planner_with_base();

    let result = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(
                1,
                TriggerKind::FuelPriceSpike {
                    station_id: None,
                    price_per_gallon: 5.25,
                },
            )],
        )
        .unwrap();

    // The tank covers the trip, so only the fuel cost moves.
    assert_eq!(result.plan.segments, base.segments);
    assert!(!result.replan_triggered);
    assert!(result.plan.cost.fuel_cost > base.cost.fuel_cost);
    assert_eq!(result.plan.request.config.fuel.default_price_per_gallon, 5.25);
}

#[test]
fn test_fuel_price_spike_for_unknown_station() {
    let (planner, base) = planner_with_base();

    let err = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(
                1,
                TriggerKind::FuelPriceSpike {
                    station_id: Some("nowhere".to_string()),
                    price_per_gallon: 5.25,
                },
            )],
        )
        .unwrap_err();

    assert!(matches!(err, PlanningError::TriggerMismatch(_)));
}

#[test]
fn test_appointment_change_adds_wait() {
    let (planner, base) = planner_with_base();
    let dock_b = base.segments[3].clone();
    let opens = dock_b.starts_at + chrono::Duration::hours(3);

    let result = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[Trigger::new(
                4,
                TriggerKind::AppointmentChange {
                    earliest_arrival: Some(opens),
                    latest_arrival: None,
                },
            )],
        )
        .unwrap();

    match &result.plan.segments[3].kind {
        SegmentKind::Dock { wait_hours, .. } => assert!((wait_hours - 3.0).abs() < 1e-3),
        other => panic!("expected dock B, got {other:?}"),
    }
    assert!((result.impact.total_eta_change_hours - 3.0).abs() < 1e-3);
}

#[test]
fn test_trigger_batch_applies_in_order() {
    let (planner, base) = planner_with_base();

    let result = planner
        .simulate_triggers(
            base.plan_id,
            1,
            &[
                Trigger::new(2, TriggerKind::DockTimeChange { actual_dock_hours: 2.0 }),
                Trigger::new(3, TriggerKind::DriverRestRequest { rest_hours: 1.0 }),
            ],
        )
        .unwrap();

    let plan = &result.plan;
    match &plan.segments[1].kind {
        SegmentKind::Dock { dock_hours, .. } => assert!((dock_hours - 2.0).abs() < 1e-9),
        other => panic!("expected dock A, got {other:?}"),
    }
    assert_eq!(plan.segments[2].rest_type(), Some(RestType::OffDuty));
    assert!((result.impact.total_eta_change_hours - 2.0).abs() < 1e-3);
    assert_eq!(result.impact.trigger_descriptions.len(), 2);
    assert_eq!(plan.plan_version, 2);
}
