//! Fuel state tracker.

use serde::{Deserialize, Serialize};

use crate::error::{FuelError, PlanningError};
use crate::hos::EPSILON;
use crate::model::VehicleSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelState {
    pub current_gallons: f64,
    pub capacity_gallons: f64,
    pub mpg: f64,
}

impl FuelState {
    pub fn from_snapshot(vehicle: &VehicleSnapshot) -> Result<Self, PlanningError> {
        let valid = vehicle.fuel_capacity_gallons.is_finite()
            && vehicle.fuel_capacity_gallons > 0.0
            && vehicle.mpg.is_finite()
            && vehicle.mpg > 0.0
            && vehicle.current_fuel_gallons.is_finite()
            && vehicle.current_fuel_gallons >= 0.0
            && vehicle.current_fuel_gallons <= vehicle.fuel_capacity_gallons + EPSILON;
        if !valid {
            return Err(PlanningError::InvalidInput(format!(
                "vehicle fuel state is inconsistent: {:.1}/{:.1} gal at {:.2} mpg",
                vehicle.current_fuel_gallons, vehicle.fuel_capacity_gallons, vehicle.mpg
            )));
        }
        Ok(Self {
            current_gallons: vehicle.current_fuel_gallons.min(vehicle.fuel_capacity_gallons),
            capacity_gallons: vehicle.fuel_capacity_gallons,
            mpg: vehicle.mpg,
        })
    }

    pub fn range_miles(&self) -> f64 {
        self.current_gallons * self.mpg
    }

    /// Miles drivable before dipping into the reserve.
    pub fn usable_range_miles(&self, reserve_fraction: f64) -> f64 {
        let reserve = self.capacity_gallons * reserve_fraction;
        ((self.current_gallons - reserve) * self.mpg).max(0.0)
    }

    pub fn gallons_to_fill(&self) -> f64 {
        (self.capacity_gallons - self.current_gallons).max(0.0)
    }

    pub fn gallons_for(&self, miles: f64) -> f64 {
        miles / self.mpg
    }

    pub fn consume(&self, miles: f64) -> Result<FuelState, FuelError> {
        if !miles.is_finite() || miles < 0.0 {
            return Err(FuelError::InvalidAmount(miles));
        }
        let needed = self.gallons_for(miles);
        if needed > self.current_gallons + EPSILON {
            return Err(FuelError::Exhausted {
                miles,
                needed,
                available: self.current_gallons,
            });
        }
        Ok(FuelState {
            current_gallons: (self.current_gallons - needed).max(0.0),
            ..self.clone()
        })
    }

    pub fn refuel(&self, gallons: f64) -> Result<FuelState, FuelError> {
        if !gallons.is_finite() || gallons < 0.0 {
            return Err(FuelError::InvalidAmount(gallons));
        }
        if self.current_gallons + gallons > self.capacity_gallons + EPSILON {
            return Err(FuelError::Overfill {
                added: gallons,
                current: self.current_gallons,
                capacity: self.capacity_gallons,
            });
        }
        Ok(FuelState {
            current_gallons: (self.current_gallons + gallons).min(self.capacity_gallons),
            ..self.clone()
        })
    }

    /// Fill the tank; returns the new state and the gallons added.
    pub fn fill_up(&self) -> (FuelState, f64) {
        let added = self.gallons_to_fill();
        let full = FuelState {
            current_gallons: self.capacity_gallons,
            ..self.clone()
        };
        (full, added)
    }
}
