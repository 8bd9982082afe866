//! Real I-80 / I-76 corridor locations for realistic test fixtures.
//!
//! Coordinates are the public addresses of the facilities, rounded to four
//! decimals. Good enough for great-circle legs and for OSRM snapping.

use hos_planner::model::{Coordinates, FuelStation, LocationCategory, Stop, StopAction};

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

// ============================================================================
// Shippers and consignees
// ============================================================================

pub const CHICAGO_DC: Location = Location::new("Chicago Distribution Center", 41.8500, -87.6500);
pub const DES_MOINES_DC: Location = Location::new("Des Moines Cross-Dock", 41.5868, -93.6250);
pub const OMAHA_DC: Location = Location::new("Omaha Cold Storage", 41.2565, -95.9345);
pub const DENVER_DC: Location = Location::new("Denver Grocery DC", 39.7392, -104.9903);

// ============================================================================
// Truck stops (fuel with price snapshots)
// ============================================================================

pub struct PricedStop {
    pub id: &'static str,
    pub location: Location,
    pub price_per_gallon: f64,
}

pub const TRUCK_STOPS: &[PricedStop] = &[
    PricedStop {
        id: "iowa80-walcott",
        location: Location::new("Iowa 80 Truckstop, Walcott IA", 41.6075, -90.7793),
        price_per_gallon: 3.79,
    },
    PricedStop {
        id: "pilot-council-bluffs",
        location: Location::new("Pilot Travel Center, Council Bluffs IA", 41.2280, -95.8430),
        price_per_gallon: 3.85,
    },
    PricedStop {
        id: "loves-york",
        location: Location::new("Love's Travel Stop, York NE", 40.8686, -97.5920),
        price_per_gallon: 3.72,
    },
    PricedStop {
        id: "ta-north-platte",
        location: Location::new("TA Travel Center, North Platte NE", 41.1403, -100.7601),
        price_per_gallon: 3.69,
    },
    PricedStop {
        id: "flyingj-ogallala",
        location: Location::new("Flying J, Ogallala NE", 41.1300, -101.7160),
        price_per_gallon: 3.75,
    },
];

pub fn truck_stop_stations() -> Vec<FuelStation> {
    TRUCK_STOPS
        .iter()
        .map(|stop| FuelStation {
            id: stop.id.to_string(),
            name: stop.location.name.to_string(),
            location: stop.location.coords(),
            price_per_gallon: stop.price_per_gallon,
        })
        .collect()
}

pub fn corridor_stop(id: &str, location: &Location, action: StopAction, load_id: &str, dock_hours: f64) -> Stop {
    Stop {
        id: id.to_string(),
        name: location.name.to_string(),
        location: location.coords(),
        category: LocationCategory::DistributionCenter,
        action,
        load_id: Some(load_id.to_string()),
        earliest_arrival: None,
        latest_arrival: None,
        dock_hours,
    }
}
