//! Trip cost estimation.

use serde::{Deserialize, Serialize};

use crate::config::CostRates;
use crate::traits::CostModel;

/// Trip quantities a cost model prices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostInputs {
    pub distance_miles: f64,
    pub drive_hours: f64,
    pub on_duty_hours: f64,
    pub fuel_gallons_consumed: f64,
    pub fuel_gallons_purchased: f64,
    /// Amount paid at planned fuel stops.
    pub fuel_purchase_cost: f64,
    /// Price applied to burned fuel that was not bought on this trip.
    pub default_fuel_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub mileage_cost: f64,
    pub labor_cost: f64,
    pub fuel_cost: f64,
    pub total: f64,
}

/// distance × cost-per-mile + on-duty hours × labor rate + fuel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearCostModel;

impl CostModel for LinearCostModel {
    fn leg_cost(&self, miles: f64, hours: f64, rates: &CostRates) -> f64 {
        miles * rates.cost_per_mile + hours * rates.labor_cost_per_hour
    }

    fn trip_cost(&self, inputs: &CostInputs, rates: &CostRates) -> CostBreakdown {
        let mileage_cost = inputs.distance_miles * rates.cost_per_mile;
        let labor_cost = inputs.on_duty_hours * rates.labor_cost_per_hour;
        let unbought = (inputs.fuel_gallons_consumed - inputs.fuel_gallons_purchased).max(0.0);
        let fuel_cost = inputs.fuel_purchase_cost + unbought * inputs.default_fuel_price;
        CostBreakdown {
            mileage_cost,
            labor_cost,
            fuel_cost,
            total: mileage_cost + labor_cost + fuel_cost,
        }
    }
}
