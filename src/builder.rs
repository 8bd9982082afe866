//! Segment builder.
//!
//! Walks the sequenced stops and simulates driving forward in short slices
//! through the HOS and fuel trackers, inserting rests, breaks, fuel stops and
//! docks as limits come due. A slice never crosses a limit boundary: it is
//! clipped to whatever comes first of the slice length, the rest of the leg,
//! the drive time left, the break threshold, or the fuel reserve.
//!
//! Every emitted segment carries the state after it, so a replan can resume
//! from any segment boundary without re-simulating the prefix.

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};

use crate::config::{PlanningConfig, RestPreference};
use crate::error::{HosError, PlanningError};
use crate::fuel::FuelState;
use crate::haversine;
use crate::hos::{Activity, EPSILON, HosLimit, HosState, SplitKind, SplitPortion};
use crate::matrix::{Leg, LegMatrix};
use crate::model::{FuelStation, LocationCategory, PlanRequest, Stop, Waypoint};
use crate::segment::{RestReason, RestType, Segment, SegmentKind};
use crate::traits::CostModel;

/// Rests in a row without any driving before the builder gives up.
const MAX_RESTS_WITHOUT_PROGRESS: u8 = 3;

pub fn add_hours(time: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    time + Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

pub(crate) fn local_offset(config: &PlanningConfig) -> Result<FixedOffset, PlanningError> {
    FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
        PlanningError::InvalidInput(format!("utc offset of {} minutes is out of range", config.utc_offset_minutes))
    })
}

pub(crate) fn split_kind(preference: RestPreference) -> Option<SplitKind> {
    match preference {
        RestPreference::Split82 => Some(SplitKind::Sleeper8And2),
        RestPreference::Split73 => Some(SplitKind::Sleeper7And3),
        RestPreference::Auto | RestPreference::Full => None,
    }
}

fn split_rest_type(portion: SplitPortion) -> RestType {
    match portion {
        SplitPortion::Long => RestType::SplitLong,
        SplitPortion::Short => RestType::SplitShort,
    }
}

/// Where the simulation stands: position, clock, and the two trackers.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildCursor {
    pub at: Waypoint,
    pub time: DateTime<Utc>,
    pub hos: HosState,
    pub fuel: FuelState,
    /// Sequence order the next emitted segment gets.
    pub next_sequence: u32,
}

impl BuildCursor {
    /// Trip start: the request origin at departure with the reported driver
    /// and vehicle state.
    pub fn origin(request: &PlanRequest) -> Result<Self, PlanningError> {
        let config = &request.config;
        let local = request.departure.with_timezone(&local_offset(config)?);
        let hours_into_day = f64::from(local.time().num_seconds_from_midnight()) / 3600.0;
        Ok(Self {
            at: request.origin.clone(),
            time: request.departure,
            hos: HosState::from_snapshot(&request.driver, &config.hos)?.with_day_clock(hours_into_day),
            fuel: FuelState::from_snapshot(&request.vehicle)?,
            next_sequence: 1,
        })
    }

    /// Resume point right after `segment`.
    pub fn after(segment: &Segment) -> Self {
        Self {
            at: segment.end_location().clone(),
            time: segment.ends_at,
            hos: segment.hos_after.clone(),
            fuel: segment.fuel_after.clone(),
            next_sequence: segment.sequence_order + 1,
        }
    }
}

/// Everything the builder reads but never changes.
pub struct BuildContext<'a, C: CostModel> {
    pub config: &'a PlanningConfig,
    pub matrix: &'a LegMatrix,
    pub stations: &'a [FuelStation],
    pub cost_model: &'a C,
}

/// One-off changes applied at the start of a rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildAdjustments {
    /// Added to the first leg driven, e.g. for traffic.
    pub first_leg_delay_hours: f64,
    /// Off-duty time the driver asked for before continuing.
    pub initial_rest_hours: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub segments: Vec<Segment>,
    /// Reasons the route could not be completed.
    pub issues: Vec<String>,
    pub is_feasible: bool,
    pub cursor: BuildCursor,
}

/// Build segments for `stops` (already sequenced) starting at `start`.
///
/// Infeasibility comes back as `is_feasible == false` with an issue; an `Err`
/// means the input was invalid or the simulation broke an HOS or fuel
/// contract, which is a defect here.
pub fn build_segments<C: CostModel>(
    ctx: &BuildContext<'_, C>,
    start: BuildCursor,
    stops: &[Stop],
    adjustments: &BuildAdjustments,
) -> Result<BuildOutcome, PlanningError> {
    let mut builder = Builder {
        ctx,
        cursor: start,
        segments: Vec::new(),
        issues: Vec::new(),
        pending_delay_hours: adjustments.first_leg_delay_hours.max(0.0),
        rests_without_progress: 0,
    };

    if let Some(hours) = adjustments.initial_rest_hours {
        builder.requested_rest(hours)?;
    }

    let mut is_feasible = true;
    for (i, stop) in stops.iter().enumerate() {
        if !builder.travel_to(&stop.waypoint())? {
            is_feasible = false;
            break;
        }
        let next_leg_hours = stops
            .get(i + 1)
            .map(|next| ctx.matrix.leg_or_estimate(stop.location, next.location).hours);
        builder.dock(stop, next_leg_hours)?;
    }

    tracing::debug!(
        segments = builder.segments.len(),
        stops = stops.len(),
        is_feasible,
        "segments built"
    );

    Ok(BuildOutcome {
        segments: builder.segments,
        issues: builder.issues,
        is_feasible,
        cursor: builder.cursor,
    })
}

/// Accumulated driving not yet emitted as a segment.
struct Stint {
    from: Waypoint,
    hours: f64,
    miles: f64,
}

#[derive(Debug, Clone)]
struct StationChoice {
    index: usize,
    to_station: Leg,
    onward_miles: f64,
    detour_miles: f64,
    price_per_gallon: f64,
    detour_cost: f64,
}

struct Builder<'a, 'b, C: CostModel> {
    ctx: &'b BuildContext<'a, C>,
    cursor: BuildCursor,
    segments: Vec<Segment>,
    issues: Vec<String>,
    pending_delay_hours: f64,
    rests_without_progress: u8,
}

impl<C: CostModel> Builder<'_, '_, C> {
    fn emit(&mut self, kind: SegmentKind, hours: f64, hos: HosState, fuel: FuelState) {
        let starts_at = self.cursor.time;
        let ends_at = add_hours(starts_at, hours);
        let segment = Segment {
            sequence_order: self.cursor.next_sequence,
            starts_at,
            ends_at,
            duration_hours: hours,
            kind,
            hos_after: hos.clone(),
            fuel_after: fuel.clone(),
        };
        self.cursor.at = segment.end_location().clone();
        self.cursor.time = ends_at;
        self.cursor.hos = hos;
        self.cursor.fuel = fuel;
        self.cursor.next_sequence += 1;
        self.segments.push(segment);
    }

    /// Drive to `target`, refuelling at stations when the tank cannot make it.
    /// Returns false when no station gets the truck there.
    fn travel_to(&mut self, target: &Waypoint) -> Result<bool, PlanningError> {
        let reserve = self.ctx.config.fuel.reserve_fraction;
        loop {
            let leg = self.ctx.matrix.leg_or_estimate(self.cursor.at.location, target.location);
            let usable = self.cursor.fuel.usable_range_miles(reserve);
            if self.ctx.stations.is_empty() || usable + EPSILON >= leg.miles {
                self.drive_to(target, leg)?;
                return Ok(true);
            }

            let Some(choice) = self.choose_station(target, leg) else {
                let issue = format!(
                    "no fuel station reachable between {} and {}: {:.0} mi needed, {:.0} mi usable range, {:.0} mi max detour",
                    self.cursor.at.name, target.name, leg.miles, usable, self.ctx.config.fuel.max_detour_miles
                );
                tracing::warn!(from = %self.cursor.at.name, to = %target.name, "route infeasible: no reachable fuel");
                self.issues.push(issue);
                return Ok(false);
            };

            let stations = self.ctx.stations;
            let station = &stations[choice.index];
            tracing::debug!(
                station = %station.id,
                price = station.price_per_gallon,
                detour_miles = choice.detour_miles,
                "fuel station chosen"
            );
            self.drive_to(&station.waypoint(), choice.to_station)?;
            self.refuel(
                station.waypoint(),
                Some(station.id.clone()),
                station.price_per_gallon,
                choice.detour_miles,
            )?;
        }
    }

    /// Candidate stations must be reachable on usable fuel, bring the truck
    /// closer to `target`, and stay within the detour limit. The latest
    /// station along the way wins unless another one scores at least the
    /// minimum savings lower. Scores price the fill the truck would take on
    /// at the latest station, plus the detour.
    fn choose_station(&self, target: &Waypoint, direct: Leg) -> Option<StationChoice> {
        let policy = &self.ctx.config.fuel;
        let here = self.cursor.at.location;
        let usable = self.cursor.fuel.usable_range_miles(policy.reserve_fraction);

        let candidates: Vec<StationChoice> = self
            .ctx
            .stations
            .iter()
            .enumerate()
            .filter_map(|(index, station)| {
                if station.location.key() == here.key() {
                    return None;
                }
                let to_station = self.ctx.matrix.leg_or_estimate(here, station.location);
                if to_station.miles > usable + EPSILON {
                    return None;
                }
                let onward = self.ctx.matrix.leg_or_estimate(station.location, target.location);
                if onward.miles + EPSILON >= direct.miles {
                    return None;
                }
                let detour_miles = (to_station.miles + onward.miles - direct.miles).max(0.0);
                if detour_miles > policy.max_detour_miles + EPSILON {
                    return None;
                }
                let detour_hours = (to_station.hours + onward.hours - direct.hours).max(0.0);
                let detour_cost = self
                    .ctx
                    .cost_model
                    .leg_cost(detour_miles, detour_hours, &self.ctx.config.cost);
                Some(StationChoice {
                    index,
                    to_station,
                    onward_miles: onward.miles,
                    detour_miles,
                    price_per_gallon: station.price_per_gallon,
                    detour_cost,
                })
            })
            .collect();

        let latest = candidates
            .iter()
            .min_by(|a, b| a.onward_miles.total_cmp(&b.onward_miles))?;
        let fuel = &self.cursor.fuel;
        let gallons = fuel.gallons_to_fill() + fuel.gallons_for(latest.to_station.miles);
        let score = |choice: &StationChoice| choice.price_per_gallon * gallons + choice.detour_cost;
        let cheapest = candidates.iter().min_by(|a, b| score(a).total_cmp(&score(b)))?;
        let chosen = if score(latest) - score(cheapest) >= policy.min_savings {
            cheapest
        } else {
            latest
        };
        Some(chosen.clone())
    }

    fn refuel(
        &mut self,
        at: Waypoint,
        station_id: Option<String>,
        price_per_gallon: f64,
        detour_miles: f64,
    ) -> Result<(), PlanningError> {
        let hours = self.ctx.config.fuel.stop_hours;
        let (fuel, gallons) = self.cursor.fuel.fill_up();
        let hos = self.cursor.hos.advance(hours, Activity::OnDuty, &self.ctx.config.hos)?;
        tracing::debug!(at = %at.name, gallons, price_per_gallon, "fuel stop inserted");
        self.emit(
            SegmentKind::Fuel {
                station: at,
                station_id,
                gallons,
                price_per_gallon,
                cost: gallons * price_per_gallon,
                detour_miles,
            },
            hours,
            hos,
            fuel,
        );
        Ok(())
    }

    fn flush(&mut self, stint: &mut Option<Stint>, to: Waypoint) {
        if let Some(stint) = stint.take() {
            let hos = self.cursor.hos.clone();
            let fuel = self.cursor.fuel.clone();
            self.emit(
                SegmentKind::Drive {
                    from: stint.from,
                    to,
                    distance_miles: stint.miles,
                    drive_hours: stint.hours,
                },
                stint.hours,
                hos,
                fuel,
            );
        }
    }

    fn drive_to(&mut self, target: &Waypoint, leg: Leg) -> Result<(), PlanningError> {
        let config = self.ctx.config;
        let rules = &config.hos;
        let en_route_fuel = self.ctx.stations.is_empty();
        let origin = self.cursor.at.clone();
        let total_hours = leg.hours + std::mem::take(&mut self.pending_delay_hours);
        if total_hours <= EPSILON {
            self.cursor.at = target.clone();
            return Ok(());
        }
        let mph = leg.miles / total_hours;

        let mut progress_hours = 0.0;
        let mut stint: Option<Stint> = None;
        loop {
            let remaining = total_hours - progress_hours;
            if remaining <= EPSILON {
                break;
            }
            let departing = progress_hours <= EPSILON;
            // Leaving a named location with too little time to finish: stop here instead.
            let stub = |capacity: f64| {
                departing && capacity + EPSILON < remaining && capacity < config.min_drive_stint_hours
            };
            let here = en_route_waypoint(&origin, target, progress_hours / total_hours);

            let available = self.cursor.hos.drive_hours_available(rules);
            if available <= EPSILON || stub(available) {
                self.flush(&mut stint, here);
                self.rest()?;
                continue;
            }

            let split = self.split_reserve().filter(|_| remaining > available + EPSILON);
            if let Some((kind, reserve)) = split {
                if available <= reserve + EPSILON && self.cursor.hos.hours_driven > EPSILON {
                    self.flush(&mut stint, here);
                    self.start_split(kind)?;
                    continue;
                }
            }

            let until_break = self.cursor.hos.hours_until_break(rules);
            if until_break <= EPSILON || stub(until_break) {
                self.flush(&mut stint, here);
                self.take_break()?;
                continue;
            }

            let mut slice = config.slice_hours.min(remaining).min(available).min(until_break);
            if let Some((_, reserve)) = split.filter(|(_, reserve)| available > reserve + EPSILON) {
                slice = slice.min(available - reserve);
            }
            if en_route_fuel && mph > 0.0 {
                let to_reserve = self.cursor.fuel.usable_range_miles(config.fuel.reserve_fraction) / mph;
                if to_reserve <= EPSILON {
                    self.flush(&mut stint, here);
                    let at = self.cursor.at.clone();
                    self.refuel(at, None, config.fuel.default_price_per_gallon, 0.0)?;
                    continue;
                }
                slice = slice.min(to_reserve);
            }

            let miles = slice * mph;
            self.cursor.hos = self.cursor.hos.advance(slice, Activity::Driving, rules)?;
            self.cursor.fuel = self.cursor.fuel.consume(miles)?;
            self.rests_without_progress = 0;
            progress_hours += slice;

            let from = &self.cursor.at;
            let current = stint.get_or_insert_with(|| Stint {
                from: from.clone(),
                hours: 0.0,
                miles: 0.0,
            });
            current.hours += slice;
            current.miles += miles;
        }

        self.flush(&mut stint, target.clone());
        self.cursor.at = target.clone();
        Ok(())
    }

    /// Rest when a limit stops driving: restart for the cycle, the other half
    /// of an open split pair, otherwise a full rest. Pairs are only opened by
    /// `start_split`, while drive time is still left after the long half.
    fn rest(&mut self) -> Result<(), PlanningError> {
        self.rests_without_progress += 1;
        if self.rests_without_progress > MAX_RESTS_WITHOUT_PROGRESS {
            let err = HosError::InvariantBroken(format!(
                "no drive time available after {MAX_RESTS_WITHOUT_PROGRESS} consecutive rests at {}",
                self.cursor.at.name
            ));
            tracing::error!(error = %err, "segment builder stalled");
            return Err(err.into());
        }

        let config = self.ctx.config;
        let rules = &config.hos;
        let limit = self.cursor.hos.binding_limit(rules);
        let open_pair = match (split_kind(config.rest_preference), &self.cursor.hos.split) {
            (Some(kind), Some(open)) if open.kind == kind => Some((kind, open.completed.other())),
            _ => None,
        };
        let (rest_type, hours, activity, reason, split) = match open_pair {
            _ if limit == HosLimit::Cycle => (
                RestType::Restart,
                rules.restart_hours,
                Activity::OffDuty,
                RestReason::CycleLimit,
                None,
            ),
            Some((kind, portion)) => (
                split_rest_type(portion),
                kind.hours(portion),
                Activity::SplitRest { kind, portion },
                RestReason::SplitPairing,
                Some(kind),
            ),
            None => (
                RestType::Full,
                rules.full_rest_hours,
                Activity::OffDuty,
                RestReason::from(limit),
                None,
            ),
        };

        let hos = self.cursor.hos.advance(hours, activity, rules)?;
        self.emit_rest(rest_type, reason, split, hours, hos);
        Ok(())
    }

    /// Split preference with no pair open: the drive time to keep back for
    /// after the long half.
    fn split_reserve(&self) -> Option<(SplitKind, f64)> {
        let config = self.ctx.config;
        let kind = split_kind(config.rest_preference)?;
        if self.cursor.hos.split.is_some() || self.cursor.hos.binding_limit(&config.hos) == HosLimit::Cycle {
            return None;
        }
        Some((kind, config.split_reserve_hours.max(config.min_drive_stint_hours)))
    }

    fn start_split(&mut self, kind: SplitKind) -> Result<(), PlanningError> {
        let portion = SplitPortion::Long;
        let hours = kind.hours(portion);
        let hos = self
            .cursor
            .hos
            .advance(hours, Activity::SplitRest { kind, portion }, &self.ctx.config.hos)?;
        self.emit_rest(RestType::SplitLong, RestReason::SplitStart, Some(kind), hours, hos);
        Ok(())
    }

    fn emit_rest(
        &mut self,
        rest_type: RestType,
        reason: RestReason,
        split_kind: Option<SplitKind>,
        hours: f64,
        hos: HosState,
    ) {
        let fuel = self.cursor.fuel.clone();
        let at = self.cursor.at.clone();
        tracing::debug!(at = %at.name, ?rest_type, reason = reason.describe(), "rest inserted");
        self.emit(
            SegmentKind::Rest {
                at,
                rest_type,
                reason,
                split_kind,
            },
            hours,
            hos,
            fuel,
        );
    }

    fn take_break(&mut self) -> Result<(), PlanningError> {
        let hours = self.ctx.config.break_hours();
        let hos = self.cursor.hos.advance(hours, Activity::OffDuty, &self.ctx.config.hos)?;
        let fuel = self.cursor.fuel.clone();
        let at = self.cursor.at.clone();
        tracing::debug!(at = %at.name, hours, "break inserted");
        self.emit(SegmentKind::Break { at }, hours, hos, fuel);
        Ok(())
    }

    fn requested_rest(&mut self, hours: f64) -> Result<(), PlanningError> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(PlanningError::InvalidInput(format!(
                "requested rest must be positive, got {hours}"
            )));
        }
        let rest_type = self.qualifying_rest_type(hours);
        let hos = self.cursor.hos.advance(hours, Activity::OffDuty, &self.ctx.config.hos)?;
        self.emit_rest(rest_type, RestReason::DriverRequest, None, hours, hos);
        Ok(())
    }

    fn qualifying_rest_type(&self, hours: f64) -> RestType {
        let rules = &self.ctx.config.hos;
        if hours >= rules.restart_hours - EPSILON {
            RestType::Restart
        } else if hours >= rules.full_rest_hours - EPSILON {
            RestType::Full
        } else {
            RestType::OffDuty
        }
    }

    fn dock(&mut self, stop: &Stop, next_leg_hours: Option<f64>) -> Result<(), PlanningError> {
        let config = self.ctx.config;
        let rules = &config.hos;
        let arrival = self.cursor.time;

        let mut wait_hours = stop
            .earliest_arrival
            .filter(|earliest| *earliest > arrival)
            .map_or(0.0, |earliest| hours_between(arrival, earliest));
        if wait_hours >= rules.full_rest_hours - EPSILON {
            self.cursor.at = stop.waypoint();
            let rest_type = self.qualifying_rest_type(wait_hours);
            let hos = self.cursor.hos.advance(wait_hours, Activity::OffDuty, rules)?;
            tracing::debug!(stop = %stop.id, wait_hours, ?rest_type, "receiving window wait taken as rest");
            self.emit_rest(rest_type, RestReason::AppointmentWait, None, wait_hours, hos);
            wait_hours = 0.0;
        }
        let off_duty_hours = wait_hours + stop.dock_hours;
        let rest_pending = next_leg_hours
            .is_some_and(|hours| self.cursor.hos.drive_hours_available(rules) + EPSILON < hours);
        let conversion = if config.dock_time_counts_as_rest && rest_pending {
            self.dock_conversion(off_duty_hours)
        } else {
            None
        };

        let (hos, converted_rest, split_kind) = match conversion {
            Some((rest_type, activity)) => {
                tracing::debug!(stop = %stop.id, ?rest_type, "dock time converted to rest");
                let split = match activity {
                    Activity::SplitRest { kind, .. } => Some(kind),
                    _ => None,
                };
                (self.cursor.hos.advance(off_duty_hours, activity, rules)?, Some(rest_type), split)
            }
            None => {
                let waited = self.cursor.hos.advance(wait_hours, Activity::OffDuty, rules)?;
                (waited.advance(stop.dock_hours, Activity::OnDuty, rules)?, None, None)
            }
        };

        let fuel = self.cursor.fuel.clone();
        self.emit(
            SegmentKind::Dock {
                stop_id: stop.id.clone(),
                at: stop.waypoint(),
                action: stop.action,
                wait_hours,
                dock_hours: stop.dock_hours,
                is_docktime_converted: converted_rest.is_some(),
                converted_rest,
                split_kind,
            },
            off_duty_hours,
            hos,
            fuel,
        );
        Ok(())
    }

    /// The rest a dock of `hours` can stand in for, if any.
    fn dock_conversion(&self, hours: f64) -> Option<(RestType, Activity)> {
        let rules = &self.ctx.config.hos;
        if hours >= rules.restart_hours - EPSILON {
            return Some((RestType::Restart, Activity::OffDuty));
        }
        if hours >= rules.full_rest_hours - EPSILON {
            return Some((RestType::Full, Activity::OffDuty));
        }
        let kind = split_kind(self.ctx.config.rest_preference)?;
        let portion = match &self.cursor.hos.split {
            Some(open) if open.kind == kind => open.completed.other(),
            _ => SplitPortion::Long,
        };
        if hours + EPSILON < kind.hours(portion) {
            return None;
        }
        // A long half with nothing left to drive after it would only be paired at once.
        if portion == SplitPortion::Long
            && self.cursor.hos.drive_hours_available(rules) + EPSILON < self.ctx.config.min_drive_stint_hours
        {
            return None;
        }
        Some((split_rest_type(portion), Activity::SplitRest { kind, portion }))
    }
}

fn en_route_waypoint(origin: &Waypoint, target: &Waypoint, fraction: f64) -> Waypoint {
    if fraction <= EPSILON {
        return origin.clone();
    }
    Waypoint::new(
        format!("En route to {} ({:.0}%)", target.name, fraction * 100.0),
        haversine::interpolate(origin.location, target.location, fraction),
    )
    .with_category(LocationCategory::TruckStop)
}
