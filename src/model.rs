//! Input snapshots consumed by the planner.
//!
//! Everything here is a read-only view handed over by the collaborators that
//! own drivers, vehicles, loads and fuel prices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PlanningConfig;
use crate::error::PlanningError;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite and inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Stable key used to index distance matrices.
    pub fn key(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationCategory {
    Warehouse,
    Customer,
    DistributionCenter,
    TruckStop,
    ServiceArea,
    FuelStation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopAction {
    Pickup,
    Delivery,
    Both,
}

impl StopAction {
    pub fn picks_up(self) -> bool {
        matches!(self, StopAction::Pickup | StopAction::Both)
    }

    pub fn delivers(self) -> bool {
        matches!(self, StopAction::Delivery | StopAction::Both)
    }
}

/// A named point on the itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub name: String,
    pub location: Coordinates,
    pub category: Option<LocationCategory>,
    pub stop_id: Option<String>,
}

impl Waypoint {
    pub fn new(name: impl Into<String>, location: Coordinates) -> Self {
        Self {
            name: name.into(),
            location,
            category: None,
            stop_id: None,
        }
    }

    pub fn with_category(mut self, category: LocationCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// A pickup/delivery stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub location: Coordinates,
    pub category: LocationCategory,
    pub action: StopAction,
    /// Load this stop belongs to; pickups of a load precede its delivery.
    pub load_id: Option<String>,
    pub earliest_arrival: Option<DateTime<Utc>>,
    pub latest_arrival: Option<DateTime<Utc>>,
    /// Estimated (or actual, once known) dock duration.
    pub dock_hours: f64,
}

impl Stop {
    pub fn waypoint(&self) -> Waypoint {
        Waypoint {
            name: self.name.clone(),
            location: self.location,
            category: Some(self.category),
            stop_id: Some(self.id.clone()),
        }
    }
}

/// Fuel station with a pre-fetched price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelStation {
    pub id: String,
    pub name: String,
    pub location: Coordinates,
    pub price_per_gallon: f64,
}

impl FuelStation {
    pub fn waypoint(&self) -> Waypoint {
        Waypoint {
            name: self.name.clone(),
            location: self.location,
            category: Some(LocationCategory::FuelStation),
            stop_id: None,
        }
    }
}

/// Longest single duration (dock, delay, requested rest) a request may carry.
pub const MAX_DURATION_HOURS: f64 = 168.0;

/// Driver hours as reported by the driver registry / ELD.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverSnapshot {
    pub hours_driven: f64,
    pub on_duty_time: f64,
    /// Hours since the current shift started, off-duty time included.
    pub shift_elapsed_hours: f64,
    pub hours_since_break: f64,
    pub cycle_hours_used: f64,
    /// On-duty hours per cycle day, oldest first, today last.
    pub cycle_days_history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    pub fuel_capacity_gallons: f64,
    pub current_fuel_gallons: f64,
    pub mpg: f64,
}

/// Weather alert passed through untouched to the plan result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherAlert {
    pub region: String,
    pub severity: String,
    pub description: String,
}

/// Everything needed to produce a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub driver_id: String,
    pub vehicle_id: String,
    pub origin: Waypoint,
    pub departure: DateTime<Utc>,
    pub stops: Vec<Stop>,
    /// When false the stop order is taken as given.
    #[serde(default)]
    pub optimize_sequence: bool,
    pub driver: DriverSnapshot,
    pub vehicle: VehicleSnapshot,
    #[serde(default)]
    pub fuel_stations: Vec<FuelStation>,
    #[serde(default)]
    pub weather_alerts: Vec<WeatherAlert>,
    #[serde(default)]
    pub config: PlanningConfig,
}

impl PlanRequest {
    pub fn stop(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.iter().find(|stop| stop.id == stop_id)
    }

    pub(crate) fn stop_mut(&mut self, stop_id: &str) -> Option<&mut Stop> {
        self.stops.iter_mut().find(|stop| stop.id == stop_id)
    }

    /// Reject malformed requests before any simulation runs.
    pub fn validate(&self) -> Result<(), PlanningError> {
        self.config.validate()?;

        if self.stops.is_empty() {
            return Err(PlanningError::InvalidInput("at least one stop is required".into()));
        }
        if !self.origin.location.is_valid() {
            return Err(PlanningError::InvalidInput(format!(
                "origin '{}' has invalid coordinates",
                self.origin.name
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for stop in &self.stops {
            if !seen.insert(stop.id.as_str()) {
                return Err(PlanningError::InvalidInput(format!("duplicate stop id '{}'", stop.id)));
            }
            if !stop.location.is_valid() {
                return Err(PlanningError::InvalidInput(format!(
                    "stop '{}' has invalid coordinates",
                    stop.id
                )));
            }
            if !stop.dock_hours.is_finite() || !(0.0..=MAX_DURATION_HOURS).contains(&stop.dock_hours) {
                return Err(PlanningError::InvalidInput(format!(
                    "stop '{}' has invalid dock duration {}",
                    stop.id, stop.dock_hours
                )));
            }
            if let (Some(earliest), Some(latest)) = (stop.earliest_arrival, stop.latest_arrival) {
                if earliest > latest {
                    return Err(PlanningError::InvalidInput(format!(
                        "stop '{}' time window closes before it opens",
                        stop.id
                    )));
                }
            }
        }

        for stop in self.stops.iter().filter(|s| s.action.delivers()) {
            if let Some(load) = &stop.load_id {
                let has_pickup = self
                    .stops
                    .iter()
                    .any(|other| other.action.picks_up() && other.load_id.as_ref() == Some(load));
                if !has_pickup {
                    return Err(PlanningError::InvalidInput(format!(
                        "delivery '{}' for load '{}' has no matching pickup",
                        stop.id, load
                    )));
                }
            }
        }

        for station in &self.fuel_stations {
            if !station.location.is_valid() {
                return Err(PlanningError::InvalidInput(format!(
                    "fuel station '{}' has invalid coordinates",
                    station.id
                )));
            }
            if !station.price_per_gallon.is_finite() || station.price_per_gallon <= 0.0 {
                return Err(PlanningError::InvalidInput(format!(
                    "fuel station '{}' has invalid price",
                    station.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, action: StopAction, load: Option<&str>) -> Stop {
        Stop {
            id: id.to_string(),
            name: id.to_string(),
            location: Coordinates::new(41.0, -87.0),
            category: LocationCategory::Warehouse,
            action,
            load_id: load.map(str::to_string),
            earliest_arrival: None,
            latest_arrival: None,
            dock_hours: 1.0,
        }
    }

    fn request(stops: Vec<Stop>) -> PlanRequest {
        PlanRequest {
            driver_id: "d1".into(),
            vehicle_id: "t1".into(),
            origin: Waypoint::new("Yard", Coordinates::new(41.8, -87.6)),
            departure: DateTime::<Utc>::default(),
            stops,
            optimize_sequence: false,
            driver: DriverSnapshot::default(),
            vehicle: VehicleSnapshot {
                fuel_capacity_gallons: 150.0,
                current_fuel_gallons: 150.0,
                mpg: 6.5,
            },
            fuel_stations: Vec::new(),
            weather_alerts: Vec::new(),
            config: PlanningConfig::default(),
        }
    }

    #[test]
    fn test_delivery_without_pickup_rejected() {
        let req = request(vec![stop("d", StopAction::Delivery, Some("L1"))]);
        let err = req.validate().unwrap_err();
        assert!(matches!(err, PlanningError::InvalidInput(msg) if msg.contains("no matching pickup")));
    }

    #[test]
    fn test_both_action_satisfies_pickup() {
        let req = request(vec![
            stop("x", StopAction::Both, Some("L1")),
            stop("d", StopAction::Delivery, Some("L1")),
        ]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_non_finite_coordinates_rejected() {
        let mut bad = stop("p", StopAction::Pickup, None);
        bad.location = Coordinates::new(f64::NAN, -87.0);
        assert!(request(vec![bad]).validate().is_err());
    }

    #[test]
    fn test_duplicate_stop_ids_rejected() {
        let req = request(vec![
            stop("p", StopAction::Pickup, None),
            stop("p", StopAction::Pickup, None),
        ]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_dock_longer_than_a_week_rejected() {
        let mut stuck = stop("p", StopAction::Pickup, None);
        stuck.dock_hours = 1e12;
        let err = request(vec![stuck]).validate().unwrap_err();
        assert!(matches!(err, PlanningError::InvalidInput(msg) if msg.contains("invalid dock duration")));

        let mut week = stop("p", StopAction::Pickup, None);
        week.dock_hours = MAX_DURATION_HOURS;
        assert!(request(vec![week]).validate().is_ok());
    }

    #[test]
    fn test_location_key_precision() {
        assert_eq!(Coordinates::new(36.1, -115.25).key(), "36.100000,-115.250000");
    }
}
