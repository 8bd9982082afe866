//! Plan assembly: day buckets, totals, cost and feasibility.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builder::{hours_between, local_offset};
use crate::compliance::{self, ComplianceReport};
use crate::cost::{CostBreakdown, CostInputs};
use crate::error::PlanningError;
use crate::model::{PlanRequest, WeatherAlert};
use crate::segment::{Segment, SegmentKind, SegmentType};
use crate::traits::CostModel;

/// Logical route id; versions hang off it.
pub type PlanId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Active,
    Cancelled,
    Superseded,
    Completed,
}

impl PlanStatus {
    pub fn can_transition_to(self, next: PlanStatus) -> bool {
        matches!(
            (self, next),
            (PlanStatus::Draft, PlanStatus::Active)
                | (PlanStatus::Draft, PlanStatus::Cancelled)
                | (PlanStatus::Active, PlanStatus::Cancelled)
                | (PlanStatus::Active, PlanStatus::Completed)
                | (PlanStatus::Active, PlanStatus::Superseded)
        )
    }

    /// Statuses a replan may start from.
    pub fn is_replannable(self) -> bool {
        matches!(self, PlanStatus::Draft | PlanStatus::Active)
    }
}

/// Segments grouped by the local calendar day they end on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBreakdown {
    pub date: NaiveDate,
    pub drive_hours: f64,
    pub on_duty_hours: f64,
    pub off_duty_hours: f64,
    pub distance_miles: f64,
    pub segment_count: usize,
    pub rest_stops: usize,
    pub fuel_stops: usize,
    pub dock_stops: usize,
}

impl DayBreakdown {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            drive_hours: 0.0,
            on_duty_hours: 0.0,
            off_duty_hours: 0.0,
            distance_miles: 0.0,
            segment_count: 0,
            rest_stops: 0,
            fuel_stops: 0,
            dock_stops: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTotals {
    pub distance_miles: f64,
    pub drive_hours: f64,
    pub on_duty_hours: f64,
    pub off_duty_hours: f64,
    pub trip_hours: f64,
    pub fuel_gallons_consumed: f64,
    pub fuel_gallons_purchased: f64,
    pub fuel_spend: f64,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
}

/// One immutable version of a route plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    pub plan_id: PlanId,
    pub plan_version: u32,
    pub status: PlanStatus,
    pub is_feasible: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    /// Stop ids in visiting order.
    pub stop_sequence: Vec<String>,
    pub segments: Vec<Segment>,
    pub daily_breakdown: Vec<DayBreakdown>,
    pub compliance: ComplianceReport,
    pub totals: PlanTotals,
    pub cost: CostBreakdown,
    pub weather_alerts: Vec<WeatherAlert>,
    /// Request this version was built from, with any trigger edits applied.
    pub request: PlanRequest,
    pub created_at: DateTime<Utc>,
}

impl RoutePlan {
    pub fn eta(&self) -> DateTime<Utc> {
        self.totals.arrival
    }

    pub fn count(&self, segment_type: SegmentType) -> usize {
        self.segments.iter().filter(|s| s.segment_type() == segment_type).count()
    }
}

/// What the assembler needs beyond the segments themselves.
#[derive(Debug, Clone)]
pub struct AssemblyInput {
    pub plan_id: PlanId,
    pub plan_version: u32,
    pub request: PlanRequest,
    pub stop_sequence: Vec<String>,
    pub segments: Vec<Segment>,
    pub issues: Vec<String>,
    pub builder_feasible: bool,
    pub created_at: DateTime<Utc>,
}

pub fn assemble<C: CostModel>(input: AssemblyInput, cost_model: &C) -> Result<RoutePlan, PlanningError> {
    let AssemblyInput {
        plan_id,
        plan_version,
        request,
        stop_sequence,
        segments,
        mut issues,
        builder_feasible,
        created_at,
    } = input;
    let config = &request.config;

    let compliance = compliance::validate(&segments, &config.hos);
    for violation in &compliance.violations {
        issues.push(format!(
            "segment {}: {}",
            violation.sequence_order, violation.message
        ));
    }
    let is_feasible = builder_feasible && compliance.is_fully_compliant;

    let warnings = late_arrival_warnings(&request, &segments);
    let daily_breakdown = daily_breakdown(&segments, &request)?;
    let totals = totals(&segments, &request);
    let cost = cost_model.trip_cost(
        &CostInputs {
            distance_miles: totals.distance_miles,
            drive_hours: totals.drive_hours,
            on_duty_hours: totals.on_duty_hours,
            fuel_gallons_consumed: totals.fuel_gallons_consumed,
            fuel_gallons_purchased: totals.fuel_gallons_purchased,
            fuel_purchase_cost: totals.fuel_spend,
            default_fuel_price: config.fuel.default_price_per_gallon,
        },
        &config.cost,
    );

    if !is_feasible {
        tracing::warn!(%plan_id, plan_version, issues = issues.len(), "plan is infeasible");
    }

    Ok(RoutePlan {
        plan_id,
        plan_version,
        status: PlanStatus::Draft,
        is_feasible,
        issues,
        warnings,
        stop_sequence,
        segments,
        daily_breakdown,
        compliance,
        totals,
        cost,
        weather_alerts: request.weather_alerts.clone(),
        request,
        created_at,
    })
}

fn late_arrival_warnings(request: &PlanRequest, segments: &[Segment]) -> Vec<String> {
    segments
        .iter()
        .filter_map(|segment| {
            let stop = request.stop(segment.dock_stop_id()?)?;
            let latest = stop.latest_arrival?;
            if segment.starts_at <= latest {
                return None;
            }
            let late = hours_between(latest, segment.starts_at);
            tracing::warn!(stop = %stop.id, late_hours = late, "arrival after window");
            Some(format!("arrives at stop '{}' {late:.2}h after its window closes", stop.id))
        })
        .collect()
}

fn daily_breakdown(segments: &[Segment], request: &PlanRequest) -> Result<Vec<DayBreakdown>, PlanningError> {
    let offset = local_offset(&request.config)?;
    let mut days: BTreeMap<NaiveDate, DayBreakdown> = BTreeMap::new();
    for segment in segments {
        let date = segment.ends_at.with_timezone(&offset).date_naive();
        let day = days.entry(date).or_insert_with(|| DayBreakdown::new(date));
        let on_duty = segment.on_duty_hours();
        day.drive_hours += segment.drive_hours();
        day.on_duty_hours += on_duty;
        day.off_duty_hours += segment.duration_hours - on_duty;
        day.distance_miles += segment.distance_miles();
        day.segment_count += 1;
        match segment.segment_type() {
            SegmentType::Rest => day.rest_stops += 1,
            SegmentType::Fuel => day.fuel_stops += 1,
            SegmentType::Dock => day.dock_stops += 1,
            SegmentType::Drive | SegmentType::Break => {}
        }
    }
    Ok(days.into_values().collect())
}

fn totals(segments: &[Segment], request: &PlanRequest) -> PlanTotals {
    let mut totals = PlanTotals {
        distance_miles: 0.0,
        drive_hours: 0.0,
        on_duty_hours: 0.0,
        off_duty_hours: 0.0,
        trip_hours: 0.0,
        fuel_gallons_consumed: 0.0,
        fuel_gallons_purchased: 0.0,
        fuel_spend: 0.0,
        departure: request.departure,
        arrival: segments.last().map_or(request.departure, |s| s.ends_at),
    };
    for segment in segments {
        let on_duty = segment.on_duty_hours();
        totals.distance_miles += segment.distance_miles();
        totals.drive_hours += segment.drive_hours();
        totals.on_duty_hours += on_duty;
        totals.off_duty_hours += segment.duration_hours - on_duty;
        if let SegmentKind::Fuel { gallons, cost, .. } = segment.kind {
            totals.fuel_gallons_purchased += gallons;
            totals.fuel_spend += cost;
        }
    }
    totals.fuel_gallons_consumed = totals.distance_miles / request.vehicle.mpg;
    totals.trip_hours = hours_between(totals.departure, totals.arrival);
    totals
}
