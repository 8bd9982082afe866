//! Stop sequencing.
//!
//! Cheapest insertion in stable input order, then 2-opt and relocate passes,
//! never breaking pickup-before-delivery for a load. Ties keep the earliest
//! position so identical inputs always give the identical order.

use crate::config::PlanningConfig;
use crate::error::PlanningError;
use crate::matrix::LegMatrix;
use crate::model::{Coordinates, Stop, StopAction};
use crate::traits::CostModel;

/// Ordered stop indices plus the objective they scored.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceResult {
    pub order: Vec<usize>,
    pub total_miles: f64,
    pub total_hours: f64,
    pub score: f64,
}

struct Scorer<'a, C: CostModel> {
    origin: Coordinates,
    stops: &'a [Stop],
    matrix: &'a LegMatrix,
    cost_model: &'a C,
    config: &'a PlanningConfig,
}

impl<C: CostModel> Scorer<'_, C> {
    fn edge(&self, from: Coordinates, to: Coordinates) -> (f64, f64, f64) {
        let leg = self.matrix.leg_or_estimate(from, to);
        let (time_weight, cost_weight) = self.config.priority.weights();
        let time_value = leg.hours * self.config.cost.labor_cost_per_hour;
        let leg_cost = self.cost_model.leg_cost(leg.miles, leg.hours, &self.config.cost);
        (leg.miles, leg.hours, time_weight * time_value + cost_weight * leg_cost)
    }

    fn route(&self, order: &[usize]) -> (f64, f64, f64) {
        let mut prev = self.origin;
        let mut totals = (0.0, 0.0, 0.0);
        for &idx in order {
            let location = self.stops[idx].location;
            let (miles, hours, score) = self.edge(prev, location);
            totals.0 += miles;
            totals.1 += hours;
            totals.2 += score;
            prev = location;
        }
        totals
    }

    fn score(&self, order: &[usize]) -> f64 {
        self.route(order).2
    }
}

/// Order `stops` starting from `origin`.
///
/// With `optimize == false` the input order is kept but still checked for
/// precedence.
pub fn sequence_stops<C: CostModel>(
    origin: Coordinates,
    stops: &[Stop],
    matrix: &LegMatrix,
    cost_model: &C,
    config: &PlanningConfig,
    optimize: bool,
) -> Result<SequenceResult, PlanningError> {
    let scorer = Scorer {
        origin,
        stops,
        matrix,
        cost_model,
        config,
    };

    let order: Vec<usize> = if optimize {
        let mut order = cheapest_insertion(&scorer)?;
        local_search(&scorer, &mut order);
        order
    } else {
        let order: Vec<usize> = (0..stops.len()).collect();
        if !respects_precedence(stops, &order) {
            return Err(PlanningError::InvalidInput(
                "stop order places a delivery before its pickup".into(),
            ));
        }
        order
    };

    let (total_miles, total_hours, score) = scorer.route(&order);
    tracing::debug!(stops = stops.len(), optimize, total_miles, score, "stops sequenced");
    Ok(SequenceResult {
        order,
        total_miles,
        total_hours,
        score,
    })
}

fn precedence_rank(action: StopAction) -> u8 {
    match action {
        StopAction::Pickup => 0,
        StopAction::Both => 1,
        StopAction::Delivery => 2,
    }
}

/// Within a load, pickups come before combined stops, which come before deliveries.
pub fn respects_precedence(stops: &[Stop], order: &[usize]) -> bool {
    for (pos, &a) in order.iter().enumerate() {
        let Some(load) = stops[a].load_id.as_ref() else {
            continue;
        };
        for &b in &order[pos + 1..] {
            if stops[b].load_id.as_ref() == Some(load)
                && precedence_rank(stops[b].action) < precedence_rank(stops[a].action)
            {
                return false;
            }
        }
    }
    true
}

fn cheapest_insertion<C: CostModel>(scorer: &Scorer<'_, C>) -> Result<Vec<usize>, PlanningError> {
    let mut route: Vec<usize> = Vec::with_capacity(scorer.stops.len());

    for idx in 0..scorer.stops.len() {
        let mut best: Option<(usize, f64)> = None;
        for position in 0..=route.len() {
            let mut candidate = route.clone();
            candidate.insert(position, idx);
            if !respects_precedence(scorer.stops, &candidate) {
                continue;
            }
            let score = scorer.score(&candidate);
            if best.is_none_or(|(_, best_score)| score < best_score) {
                best = Some((position, score));
            }
        }

        match best {
            Some((position, _)) => route.insert(position, idx),
            None => {
                return Err(PlanningError::InvalidInput(format!(
                    "stop '{}' cannot be placed without breaking load precedence",
                    scorer.stops[idx].id
                )));
            }
        }
    }

    Ok(route)
}

// ============================================================================
// Local Search Operators
// ============================================================================

/// 2-opt: reverse a run of stops when that lowers the score.
fn two_opt_improve<C: CostModel>(scorer: &Scorer<'_, C>, order: &mut Vec<usize>) -> bool {
    let n = order.len();
    if n < 3 {
        return false;
    }
    let current = scorer.score(order);

    for i in 0..n - 1 {
        for j in i + 1..n {
            let mut candidate = order.clone();
            candidate[i..=j].reverse();
            if !respects_precedence(scorer.stops, &candidate) {
                continue;
            }
            if scorer.score(&candidate) + 1e-9 < current {
                *order = candidate;
                return true;
            }
        }
    }
    false
}

/// Relocate: move one stop to another position.
fn relocate_improve<C: CostModel>(scorer: &Scorer<'_, C>, order: &mut Vec<usize>) -> bool {
    let n = order.len();
    if n < 2 {
        return false;
    }
    let current = scorer.score(order);

    for from in 0..n {
        for to in 0..n {
            if from == to {
                continue;
            }
            let mut candidate = order.clone();
            let stop = candidate.remove(from);
            candidate.insert(to, stop);
            if !respects_precedence(scorer.stops, &candidate) {
                continue;
            }
            if scorer.score(&candidate) + 1e-9 < current {
                *order = candidate;
                return true;
            }
        }
    }
    false
}

fn local_search<C: CostModel>(scorer: &Scorer<'_, C>, order: &mut Vec<usize>) {
    for _ in 0..scorer.config.local_search_iterations {
        let mut improved = two_opt_improve(scorer, order);
        if relocate_improve(scorer, order) {
            improved = true;
        }
        if !improved {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::LinearCostModel;
    use crate::haversine::HaversineMatrix;
    use crate::model::LocationCategory;
    use crate::traits::DistanceMatrixProvider;

    fn stop(id: &str, lat: f64, action: StopAction, load: Option<&str>) -> Stop {
        Stop {
            id: id.into(),
            name: id.into(),
            location: Coordinates::new(lat, -90.0),
            category: LocationCategory::Customer,
            action,
            load_id: load.map(str::to_string),
            earliest_arrival: None,
            latest_arrival: None,
            dock_hours: 1.0,
        }
    }

    fn matrix_for(origin: Coordinates, stops: &[Stop]) -> LegMatrix {
        let mut locations = vec![origin];
        locations.extend(stops.iter().map(|s| s.location));
        HaversineMatrix::default().matrix_for(&locations, false)
    }

    #[test]
    fn test_precedence_rank_order() {
        let stops = vec![
            stop("d", 1.0, StopAction::Delivery, Some("L")),
            stop("p", 2.0, StopAction::Pickup, Some("L")),
        ];
        assert!(!respects_precedence(&stops, &[0, 1]));
        assert!(respects_precedence(&stops, &[1, 0]));
    }

    #[test]
    fn test_fixed_order_rejects_bad_precedence() {
        let origin = Coordinates::new(0.0, -90.0);
        let stops = vec![
            stop("d", 1.0, StopAction::Delivery, Some("L")),
            stop("p", 2.0, StopAction::Pickup, Some("L")),
        ];
        let matrix = matrix_for(origin, &stops);
        let result = sequence_stops(origin, &stops, &matrix, &LinearCostModel, &PlanningConfig::default(), false);
        assert!(result.is_err());
    }

    #[test]
    fn test_optimized_order_is_geographic() {
        let origin = Coordinates::new(0.0, -90.0);
        let stops = vec![
            stop("far", 3.0, StopAction::Delivery, None),
            stop("near", 1.0, StopAction::Delivery, None),
            stop("mid", 2.0, StopAction::Delivery, None),
        ];
        let matrix = matrix_for(origin, &stops);
        let result =
            sequence_stops(origin, &stops, &matrix, &LinearCostModel, &PlanningConfig::default(), true).unwrap();
        assert_eq!(result.order, vec![1, 2, 0]);
    }

    #[test]
    fn test_optimized_order_keeps_pickup_first() {
        let origin = Coordinates::new(0.0, -90.0);
        // Delivery is closer to the origin than its pickup.
        let stops = vec![
            stop("p", 3.0, StopAction::Pickup, Some("L")),
            stop("d", 1.0, StopAction::Delivery, Some("L")),
        ];
        let matrix = matrix_for(origin, &stops);
        let result =
            sequence_stops(origin, &stops, &matrix, &LinearCostModel, &PlanningConfig::default(), true).unwrap();
        assert_eq!(result.order, vec![0, 1]);
    }
}
