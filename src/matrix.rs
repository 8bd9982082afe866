//! Leg matrix: miles and drive hours between indexed locations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::haversine;
use crate::model::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub miles: f64,
    pub hours: f64,
}

impl Leg {
    pub const ZERO: Leg = Leg { miles: 0.0, hours: 0.0 };
}

#[derive(Debug, Clone, Default)]
pub struct LegMatrix {
    index: HashMap<String, usize>,
    miles: Vec<Vec<f64>>,
    hours: Vec<Vec<f64>>,
}

impl LegMatrix {
    /// Build a matrix. `miles` and `hours` are indexed like `locations`.
    pub fn new(locations: &[Coordinates], miles: Vec<Vec<f64>>, hours: Vec<Vec<f64>>) -> Self {
        let mut index = HashMap::new();
        for (i, location) in locations.iter().enumerate() {
            index.entry(location.key()).or_insert(i);
        }
        Self { index, miles, hours }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn leg(&self, from: Coordinates, to: Coordinates) -> Option<Leg> {
        let i = *self.index.get(&from.key())?;
        let j = *self.index.get(&to.key())?;
        let miles = *self.miles.get(i)?.get(j)?;
        let hours = *self.hours.get(i)?.get(j)?;
        Some(Leg { miles, hours })
    }

    /// Matrix value, or a great-circle estimate when the pair is missing.
    pub fn leg_or_estimate(&self, from: Coordinates, to: Coordinates) -> Leg {
        if from.key() == to.key() {
            return Leg::ZERO;
        }
        match self.leg(from, to) {
            Some(leg) => leg,
            None => {
                tracing::debug!(from = %from.key(), to = %to.key(), "leg missing from matrix, estimating");
                haversine::HaversineMatrix::default().estimate(from, to)
            }
        }
    }
}

/// Remove duplicate locations, keeping first occurrence order.
pub fn dedupe_locations(locations: Vec<Coordinates>) -> Vec<Coordinates> {
    let mut seen = std::collections::HashSet::new();
    locations
        .into_iter()
        .filter(|location| seen.insert(location.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_coordinates() {
        let a = Coordinates::new(41.0, -87.0);
        let b = Coordinates::new(42.0, -88.0);
        let matrix = LegMatrix::new(
            &[a, b],
            vec![vec![0.0, 90.0], vec![91.0, 0.0]],
            vec![vec![0.0, 1.5], vec![1.6, 0.0]],
        );
        assert_eq!(matrix.leg(a, b), Some(Leg { miles: 90.0, hours: 1.5 }));
        assert_eq!(matrix.leg(b, a).map(|l| l.miles), Some(91.0));
        assert_eq!(matrix.leg(a, Coordinates::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_missing_pair_is_estimated() {
        let matrix = LegMatrix::empty();
        let leg = matrix.leg_or_estimate(Coordinates::new(41.0, -87.0), Coordinates::new(41.5, -87.0));
        assert!(leg.miles > 30.0 && leg.hours > 0.5);
    }

    #[test]
    fn test_dedupe_keeps_order() {
        let a = Coordinates::new(1.0, 1.0);
        let b = Coordinates::new(2.0, 2.0);
        assert_eq!(dedupe_locations(vec![a, b, a]), vec![a, b]);
    }
}
