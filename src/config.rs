//! Planning configuration.
//!
//! A `PlanningConfig` travels with every request; the engine never consults
//! environment variables or process-wide defaults.

use serde::{Deserialize, Serialize};

use crate::error::PlanningError;

/// Rolling on-duty cycle (e.g. 70 hours over 8 days).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRule {
    pub limit_hours: f64,
    pub days: usize,
}

impl CycleRule {
    pub const SEVENTY_EIGHT: CycleRule = CycleRule { limit_hours: 70.0, days: 8 };
    pub const SIXTY_SEVEN: CycleRule = CycleRule { limit_hours: 60.0, days: 7 };
}

impl Default for CycleRule {
    fn default() -> Self {
        Self::SEVENTY_EIGHT
    }
}

/// Hours-of-service limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HosRules {
    pub drive_limit_hours: f64,
    pub duty_window_hours: f64,
    /// Cumulative driving allowed before a break is required.
    pub break_after_driving_hours: f64,
    /// Minimum consecutive non-driving time that counts as a break.
    pub break_minimum_hours: f64,
    pub full_rest_hours: f64,
    pub restart_hours: f64,
    pub cycle: CycleRule,
}

impl Default for HosRules {
    fn default() -> Self {
        Self {
            drive_limit_hours: 11.0,
            duty_window_hours: 14.0,
            break_after_driving_hours: 8.0,
            break_minimum_hours: 0.5,
            full_rest_hours: 10.0,
            restart_hours: 34.0,
            cycle: CycleRule::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestPreference {
    #[default]
    Auto,
    Full,
    #[serde(rename = "split_8_2")]
    Split82,
    #[serde(rename = "split_7_3")]
    Split73,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationPriority {
    MinimizeTime,
    MinimizeCost,
    #[default]
    Balance,
}

impl OptimizationPriority {
    /// Weights applied to (labor-valued time, leg cost) when scoring edges.
    pub fn weights(self) -> (f64, f64) {
        match self {
            OptimizationPriority::MinimizeTime => (1.0, 0.0),
            OptimizationPriority::MinimizeCost => (0.0, 1.0),
            OptimizationPriority::Balance => (0.5, 0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FuelPolicy {
    pub max_detour_miles: f64,
    /// A station with a longer detour is only preferred when it saves at least this much.
    pub min_savings: f64,
    /// Fraction of tank capacity never planned below.
    pub reserve_fraction: f64,
    pub stop_hours: f64,
    /// Price used for en-route fueling and for fuel burned but not bought on the trip.
    pub default_price_per_gallon: f64,
}

impl Default for FuelPolicy {
    fn default() -> Self {
        Self {
            max_detour_miles: 15.0,
            min_savings: 10.0,
            reserve_fraction: 0.1,
            stop_hours: 0.5,
            default_price_per_gallon: 3.85,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostRates {
    pub cost_per_mile: f64,
    pub labor_cost_per_hour: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            cost_per_mile: 0.65,
            labor_cost_per_hour: 32.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanningConfig {
    pub hos: HosRules,
    pub rest_preference: RestPreference,
    pub priority: OptimizationPriority,
    pub fuel: FuelPolicy,
    pub cost: CostRates,
    /// Forward-simulation step for driving.
    pub slice_hours: f64,
    /// Below this much remaining drive time, rest before leaving instead of driving a stub.
    pub min_drive_stint_hours: f64,
    /// With a split preference, drive time kept back for after the long half.
    pub split_reserve_hours: f64,
    /// Break length the dispatcher prefers; never shorter than the regulatory minimum.
    pub preferred_break_hours: f64,
    pub dock_time_counts_as_rest: bool,
    pub avoid_tolls: bool,
    /// Offset used to bucket segments into local calendar days.
    pub utc_offset_minutes: i32,
    /// ETA movement that by itself warrants surfacing a replan.
    pub replan_eta_threshold_hours: f64,
    /// Local search passes after cheapest insertion.
    pub local_search_iterations: usize,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            hos: HosRules::default(),
            rest_preference: RestPreference::default(),
            priority: OptimizationPriority::default(),
            fuel: FuelPolicy::default(),
            cost: CostRates::default(),
            slice_hours: 0.25,
            min_drive_stint_hours: 1.0,
            split_reserve_hours: 3.0,
            preferred_break_hours: 0.5,
            dock_time_counts_as_rest: true,
            avoid_tolls: false,
            utc_offset_minutes: 0,
            replan_eta_threshold_hours: 0.25,
            local_search_iterations: 50,
        }
    }
}

impl PlanningConfig {
    pub fn break_hours(&self) -> f64 {
        self.preferred_break_hours.max(self.hos.break_minimum_hours)
    }

    pub fn validate(&self) -> Result<(), PlanningError> {
        let positive = [
            ("hos.driveLimitHours", self.hos.drive_limit_hours),
            ("hos.dutyWindowHours", self.hos.duty_window_hours),
            ("hos.breakAfterDrivingHours", self.hos.break_after_driving_hours),
            ("hos.breakMinimumHours", self.hos.break_minimum_hours),
            ("hos.fullRestHours", self.hos.full_rest_hours),
            ("hos.restartHours", self.hos.restart_hours),
            ("hos.cycle.limitHours", self.hos.cycle.limit_hours),
            ("fuel.stopHours", self.fuel.stop_hours),
            ("fuel.defaultPricePerGallon", self.fuel.default_price_per_gallon),
            ("sliceHours", self.slice_hours),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(PlanningError::InvalidInput(format!(
                    "config {name} must be positive, got {value}"
                )));
            }
        }

        let non_negative = [
            ("fuel.maxDetourMiles", self.fuel.max_detour_miles),
            ("fuel.minSavings", self.fuel.min_savings),
            ("cost.costPerMile", self.cost.cost_per_mile),
            ("cost.laborCostPerHour", self.cost.labor_cost_per_hour),
            ("minDriveStintHours", self.min_drive_stint_hours),
            ("splitReserveHours", self.split_reserve_hours),
            ("preferredBreakHours", self.preferred_break_hours),
            ("replanEtaThresholdHours", self.replan_eta_threshold_hours),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(PlanningError::InvalidInput(format!(
                    "config {name} must be non-negative, got {value}"
                )));
            }
        }

        if !(0.0..1.0).contains(&self.fuel.reserve_fraction) {
            return Err(PlanningError::InvalidInput(
                "config fuel.reserveFraction must be in [0, 1)".into(),
            ));
        }
        if self.hos.cycle.days == 0 {
            return Err(PlanningError::InvalidInput("config hos.cycle.days must be at least 1".into()));
        }
        if self.hos.drive_limit_hours > self.hos.duty_window_hours {
            return Err(PlanningError::InvalidInput(
                "config drive limit cannot exceed the duty window".into(),
            ));
        }
        Ok(())
    }
}
