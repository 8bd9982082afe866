//! Replan triggers and their impact summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assembler::RoutePlan;
use crate::builder::hours_between;
use crate::error::PlanningError;
use crate::model::{DriverSnapshot, MAX_DURATION_HOURS};
use crate::segment::SegmentType;

/// Something that happened (or is expected) on the road.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TriggerKind {
    /// Applies to drive segments.
    TrafficDelay { delay_minutes: f64 },
    /// Applies to dock segments.
    DockTimeChange { actual_dock_hours: f64 },
    DriverRestRequest { rest_hours: f64 },
    /// `station_id == None` reprices en-route fueling.
    FuelPriceSpike {
        station_id: Option<String>,
        price_per_gallon: f64,
    },
    /// Applies to dock segments.
    AppointmentChange {
        earliest_arrival: Option<DateTime<Utc>>,
        latest_arrival: Option<DateTime<Utc>>,
    },
    /// The driver's logs disagree with the plan's checkpoint.
    HosViolation { reported: DriverSnapshot },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// 1-based sequence order of the affected segment.
    pub segment: u32,
    #[serde(flatten)]
    pub kind: TriggerKind,
}

impl Trigger {
    pub fn new(segment: u32, kind: TriggerKind) -> Self {
        Self { segment, kind }
    }

    pub fn validate(&self) -> Result<(), PlanningError> {
        let check = |name: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(PlanningError::InvalidInput(format!(
                    "trigger {name} must be finite and non-negative, got {value}"
                )))
            }
        };
        let duration = |name: &str, hours: f64| {
            check(name, hours)?;
            if hours > MAX_DURATION_HOURS {
                return Err(PlanningError::InvalidInput(format!(
                    "trigger {name} of {hours:.1}h exceeds the {MAX_DURATION_HOURS}h limit"
                )));
            }
            Ok(())
        };
        match &self.kind {
            TriggerKind::TrafficDelay { delay_minutes } => {
                check("delayMinutes", *delay_minutes)?;
                duration("delayMinutes", delay_minutes / 60.0)
            }
            TriggerKind::DockTimeChange { actual_dock_hours } => duration("actualDockHours", *actual_dock_hours),
            TriggerKind::DriverRestRequest { rest_hours } => {
                duration("restHours", *rest_hours)?;
                if *rest_hours == 0.0 {
                    return Err(PlanningError::InvalidInput("trigger restHours must be positive".into()));
                }
                Ok(())
            }
            TriggerKind::FuelPriceSpike { price_per_gallon, .. } => check("pricePerGallon", *price_per_gallon),
            TriggerKind::AppointmentChange {
                earliest_arrival: Some(earliest),
                latest_arrival: Some(latest),
            } if earliest > latest => Err(PlanningError::InvalidInput(
                "trigger appointment window closes before it opens".into(),
            )),
            TriggerKind::AppointmentChange { .. } | TriggerKind::HosViolation { .. } => Ok(()),
        }
    }

    pub fn describe(&self) -> String {
        let what = match &self.kind {
            TriggerKind::TrafficDelay { delay_minutes } => format!("traffic delay of {delay_minutes:.0} min"),
            TriggerKind::DockTimeChange { actual_dock_hours } => {
                format!("dock time changed to {actual_dock_hours:.2}h")
            }
            TriggerKind::DriverRestRequest { rest_hours } => format!("driver requested {rest_hours:.2}h rest"),
            TriggerKind::FuelPriceSpike {
                station_id: Some(id),
                price_per_gallon,
            } => format!("fuel price at {id} now ${price_per_gallon:.3}/gal"),
            TriggerKind::FuelPriceSpike {
                station_id: None,
                price_per_gallon,
            } => format!("en-route fuel price now ${price_per_gallon:.3}/gal"),
            TriggerKind::AppointmentChange { .. } => "appointment window changed".to_string(),
            TriggerKind::HosViolation { reported } => format!(
                "driver reported {:.2}h driven, {:.2}h on duty",
                reported.hours_driven, reported.on_duty_time
            ),
        };
        format!("segment {}: {what}", self.segment)
    }
}

/// How a replanned version differs from the one it was based on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub total_eta_change_hours: f64,
    /// Negative when the replan removed stops.
    pub rest_stops_added: i64,
    pub breaks_added: i64,
    pub fuel_stops_added: i64,
    pub new_compliance_issues: Vec<String>,
    pub trigger_descriptions: Vec<String>,
    pub feasibility_changed: bool,
}

impl ImpactSummary {
    pub fn between(before: &RoutePlan, after: &RoutePlan, trigger_descriptions: Vec<String>) -> Self {
        let delta = |segment_type: SegmentType| after.count(segment_type) as i64 - before.count(segment_type) as i64;
        let new_compliance_issues = after
            .issues
            .iter()
            .filter(|issue| !before.issues.contains(issue))
            .cloned()
            .collect();
        Self {
            total_eta_change_hours: hours_between(before.eta(), after.eta()),
            rest_stops_added: delta(SegmentType::Rest),
            breaks_added: delta(SegmentType::Break),
            fuel_stops_added: delta(SegmentType::Fuel),
            new_compliance_issues,
            trigger_descriptions,
            feasibility_changed: before.is_feasible != after.is_feasible,
        }
    }

    pub fn stops_changed(&self) -> bool {
        self.rest_stops_added != 0 || self.breaks_added != 0 || self.fuel_stops_added != 0
    }
}
