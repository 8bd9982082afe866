//! Itinerary segments.
//!
//! A `Segment` carries the timing and the HOS/fuel checkpoint after it; the
//! `SegmentKind` carries only what that kind of segment needs. Segments are
//! never edited once emitted; replans build new ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fuel::FuelState;
use crate::hos::{HosLimit, HosState, SplitKind};
use crate::model::{StopAction, Waypoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    Drive,
    Rest,
    Break,
    Fuel,
    Dock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestType {
    /// Ten consecutive hours off duty / sleeper.
    Full,
    /// 34 hour cycle restart.
    Restart,
    SplitLong,
    SplitShort,
    /// Off duty, shorter than a qualifying rest.
    OffDuty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestReason {
    DriveLimit,
    DutyWindow,
    CycleLimit,
    /// Long half taken early so driving can continue before the pair completes.
    SplitStart,
    SplitPairing,
    DriverRequest,
    /// Off duty until a receiving window opens.
    AppointmentWait,
}

impl From<HosLimit> for RestReason {
    fn from(limit: HosLimit) -> Self {
        match limit {
            HosLimit::DriveLimit | HosLimit::Break => RestReason::DriveLimit,
            HosLimit::DutyWindow => RestReason::DutyWindow,
            HosLimit::Cycle => RestReason::CycleLimit,
        }
    }
}

impl RestReason {
    pub fn describe(self) -> &'static str {
        match self {
            RestReason::DriveLimit => "11-hour drive limit reached",
            RestReason::DutyWindow => "14-hour duty window reached",
            RestReason::CycleLimit => "cycle hours exhausted",
            RestReason::SplitStart => "starting split sleeper pair",
            RestReason::SplitPairing => "completing split sleeper pair",
            RestReason::DriverRequest => "driver requested rest",
            RestReason::AppointmentWait => "waiting for the receiving window",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SegmentKind {
    Drive {
        from: Waypoint,
        to: Waypoint,
        distance_miles: f64,
        drive_hours: f64,
    },
    Rest {
        at: Waypoint,
        rest_type: RestType,
        reason: RestReason,
        /// Set for split halves.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        split_kind: Option<SplitKind>,
    },
    Break {
        at: Waypoint,
    },
    Fuel {
        station: Waypoint,
        station_id: Option<String>,
        gallons: f64,
        price_per_gallon: f64,
        cost: f64,
        detour_miles: f64,
    },
    Dock {
        stop_id: String,
        at: Waypoint,
        action: StopAction,
        /// Off-duty wait for the receiving window to open.
        wait_hours: f64,
        dock_hours: f64,
        is_docktime_converted: bool,
        converted_rest: Option<RestType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        split_kind: Option<SplitKind>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// 1-based position in the plan.
    pub sequence_order: u32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_hours: f64,
    pub kind: SegmentKind,
    pub hos_after: HosState,
    pub fuel_after: FuelState,
}

impl Segment {
    pub fn segment_type(&self) -> SegmentType {
        match self.kind {
            SegmentKind::Drive { .. } => SegmentType::Drive,
            SegmentKind::Rest { .. } => SegmentType::Rest,
            SegmentKind::Break { .. } => SegmentType::Break,
            SegmentKind::Fuel { .. } => SegmentType::Fuel,
            SegmentKind::Dock { .. } => SegmentType::Dock,
        }
    }

    /// Where the truck is when this segment ends.
    pub fn end_location(&self) -> &Waypoint {
        match &self.kind {
            SegmentKind::Drive { to, .. } => to,
            SegmentKind::Rest { at, .. } | SegmentKind::Break { at } | SegmentKind::Dock { at, .. } => at,
            SegmentKind::Fuel { station, .. } => station,
        }
    }

    pub fn distance_miles(&self) -> f64 {
        match self.kind {
            SegmentKind::Drive { distance_miles, .. } => distance_miles,
            _ => 0.0,
        }
    }

    pub fn drive_hours(&self) -> f64 {
        match self.kind {
            SegmentKind::Drive { drive_hours, .. } => drive_hours,
            _ => 0.0,
        }
    }

    /// On-duty time spent in this segment, driving included.
    pub fn on_duty_hours(&self) -> f64 {
        match self.kind {
            SegmentKind::Drive { drive_hours, .. } => drive_hours,
            SegmentKind::Fuel { .. } => self.duration_hours,
            SegmentKind::Dock {
                dock_hours,
                is_docktime_converted,
                ..
            } => {
                if is_docktime_converted {
                    0.0
                } else {
                    dock_hours
                }
            }
            SegmentKind::Rest { .. } | SegmentKind::Break { .. } => 0.0,
        }
    }

    pub fn rest_type(&self) -> Option<RestType> {
        match self.kind {
            SegmentKind::Rest { rest_type, .. } => Some(rest_type),
            SegmentKind::Dock { converted_rest, .. } => converted_rest,
            _ => None,
        }
    }

    /// Split rule a split-half rest (or converted dock) was taken under.
    pub fn split_kind(&self) -> Option<SplitKind> {
        match self.kind {
            SegmentKind::Rest { split_kind, .. } | SegmentKind::Dock { split_kind, .. } => split_kind,
            _ => None,
        }
    }

    pub fn dock_stop_id(&self) -> Option<&str> {
        match &self.kind {
            SegmentKind::Dock { stop_id, .. } => Some(stop_id),
            _ => None,
        }
    }
}
