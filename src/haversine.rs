//! Great-circle leg provider.
//!
//! Straight-line miles scaled by a road factor and divided by an average
//! truck speed. Less accurate than a road network but always available, and
//! fully deterministic, which is what tests and offline planning want.

use rayon::prelude::*;

use crate::matrix::{Leg, LegMatrix};
use crate::model::Coordinates;
use crate::traits::DistanceMatrixProvider;

/// Average loaded truck speed on mixed highway.
const DEFAULT_SPEED_MPH: f64 = 55.0;

/// Straight line to road distance.
const DEFAULT_ROAD_FACTOR: f64 = 1.2;

/// Earth radius in miles.
const EARTH_RADIUS_MILES: f64 = 3958.8;

#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    pub speed_mph: f64,
    pub road_factor: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_mph: DEFAULT_SPEED_MPH,
            road_factor: DEFAULT_ROAD_FACTOR,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_mph: f64, road_factor: f64) -> Self {
        Self { speed_mph, road_factor }
    }

    /// Great-circle distance in miles.
    pub fn haversine_miles(from: Coordinates, to: Coordinates) -> f64 {
        let lat1_rad = from.lat.to_radians();
        let lat2_rad = to.lat.to_radians();
        let delta_lat = (to.lat - from.lat).to_radians();
        let delta_lng = (to.lng - from.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_MILES * c
    }

    pub fn estimate(&self, from: Coordinates, to: Coordinates) -> Leg {
        let miles = Self::haversine_miles(from, to) * self.road_factor;
        Leg {
            miles,
            hours: miles / self.speed_mph,
        }
    }
}

/// Point `fraction` of the way from `from` to `to`.
///
/// Linear in lat/lng, which is close enough for labelling en-route stops.
pub fn interpolate(from: Coordinates, to: Coordinates, fraction: f64) -> Coordinates {
    let t = fraction.clamp(0.0, 1.0);
    Coordinates {
        lat: from.lat + (to.lat - from.lat) * t,
        lng: from.lng + (to.lng - from.lng) * t,
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, locations: &[Coordinates], _avoid_tolls: bool) -> LegMatrix {
        let rows: Vec<(Vec<f64>, Vec<f64>)> = locations
            .par_iter()
            .enumerate()
            .map(|(i, from)| {
                let mut miles = vec![0.0; locations.len()];
                let mut hours = vec![0.0; locations.len()];
                for (j, to) in locations.iter().enumerate() {
                    if i != j {
                        let leg = self.estimate(*from, *to);
                        miles[j] = leg.miles;
                        hours[j] = leg.hours;
                    }
                }
                (miles, hours)
            })
            .collect();

        let (miles, hours) = rows.into_iter().unzip();
        LegMatrix::new(locations, miles, hours)
    }
}
