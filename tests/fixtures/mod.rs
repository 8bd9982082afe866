//! Test fixtures for hos-planner.
//!
//! Provides:
//! - Real I-80 / I-76 freight corridor locations (Chicago to Denver)
//! - A grid distance provider with exact, hand-checkable legs
//! - Request builders with sensible defaults

#![allow(dead_code)]

pub mod freight_locations;

pub use freight_locations::*;

use chrono::{DateTime, Utc};

use hos_planner::config::PlanningConfig;
use hos_planner::matrix::LegMatrix;
use hos_planner::model::{
    Coordinates, DriverSnapshot, FuelStation, LocationCategory, PlanRequest, Stop, StopAction, VehicleSnapshot,
    Waypoint,
};
use hos_planner::traits::DistanceMatrixProvider;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Manhattan distance in degrees × 100 miles, driven at 50 mph.
///
/// Stops placed along one meridian give round numbers: one degree of
/// latitude is 100 miles and two hours.
#[derive(Debug, Clone)]
pub struct GridMatrix {
    pub miles_per_degree: f64,
    pub speed_mph: f64,
}

impl Default for GridMatrix {
    fn default() -> Self {
        Self {
            miles_per_degree: 100.0,
            speed_mph: 50.0,
        }
    }
}

impl DistanceMatrixProvider for GridMatrix {
    fn matrix_for(&self, locations: &[Coordinates], _avoid_tolls: bool) -> LegMatrix {
        let miles: Vec<Vec<f64>> = locations
            .iter()
            .map(|a| {
                locations
                    .iter()
                    .map(|b| ((a.lat - b.lat).abs() + (a.lng - b.lng).abs()) * self.miles_per_degree)
                    .collect()
            })
            .collect();
        let hours = miles
            .iter()
            .map(|row| row.iter().map(|m| m / self.speed_mph).collect())
            .collect();
        LegMatrix::new(locations, miles, hours)
    }
}

pub const GRID_LNG: f64 = -95.0;

pub fn grid_point(lat: f64) -> Coordinates {
    Coordinates::new(lat, GRID_LNG)
}

pub fn departure() -> DateTime<Utc> {
    "2026-03-02T06:00:00Z".parse().expect("valid timestamp")
}

pub fn grid_stop(id: &str, lat: f64, action: StopAction, load_id: Option<&str>, dock_hours: f64) -> Stop {
    Stop {
        id: id.to_string(),
        name: format!("Customer {id}"),
        location: grid_point(lat),
        category: LocationCategory::Customer,
        action,
        load_id: load_id.map(str::to_string),
        earliest_arrival: None,
        latest_arrival: None,
        dock_hours,
    }
}

pub fn grid_station(id: &str, lat: f64, price_per_gallon: f64) -> FuelStation {
    FuelStation {
        id: id.to_string(),
        name: format!("Fuel {id}"),
        location: grid_point(lat),
        price_per_gallon,
    }
}

pub fn fresh_driver() -> DriverSnapshot {
    DriverSnapshot::default()
}

pub fn big_tank() -> VehicleSnapshot {
    VehicleSnapshot {
        fuel_capacity_gallons: 200.0,
        current_fuel_gallons: 200.0,
        mpg: 6.5,
    }
}

/// Request departing the grid depot at latitude 0.
pub fn grid_request(stops: Vec<Stop>, driver: DriverSnapshot, vehicle: VehicleSnapshot) -> PlanRequest {
    PlanRequest {
        driver_id: "driver-17".to_string(),
        vehicle_id: "truck-204".to_string(),
        origin: Waypoint::new("Grid Depot", grid_point(0.0)).with_category(LocationCategory::Warehouse),
        departure: departure(),
        stops,
        optimize_sequence: false,
        driver,
        vehicle,
        fuel_stations: Vec::new(),
        weather_alerts: Vec::new(),
        config: PlanningConfig::default(),
    }
}

/// Depot → pickup A (lat 1) → delivery B (lat 5), one-hour docks.
pub fn two_stop_request() -> PlanRequest {
    grid_request(
        vec![
            grid_stop("A", 1.0, StopAction::Pickup, Some("L1"), 1.0),
            grid_stop("B", 5.0, StopAction::Delivery, Some("L1"), 1.0),
        ],
        fresh_driver(),
        big_tank(),
    )
}
