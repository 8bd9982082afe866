//! Hours-of-service state machine.
//!
//! Property-carrier model: 11 hours driving inside a 14 hour window that runs
//! on the wall clock from the start of the shift, a 30 minute break after 8
//! cumulative driving hours, 10 hours off duty to reset the shift, 8+2 / 7+3
//! sleeper splits, and a rolling cycle ledger that only a 34 hour restart
//! clears. Short off-duty time (breaks, appointment waits) does not stop the
//! window; only a split rest half pauses it.
//!
//! `advance` is pure: it returns a new state or refuses the activity. A refusal
//! is a contract violation on the caller's side, never something to clamp.

use serde::{Deserialize, Serialize};

use crate::config::HosRules;
use crate::error::{HosError, PlanningError};
use crate::model::DriverSnapshot;

/// Tolerance for floating point hour comparisons.
pub const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitKind {
    #[serde(rename = "split_8_2")]
    Sleeper8And2,
    #[serde(rename = "split_7_3")]
    Sleeper7And3,
}

impl SplitKind {
    pub fn long_hours(self) -> f64 {
        match self {
            SplitKind::Sleeper8And2 => 8.0,
            SplitKind::Sleeper7And3 => 7.0,
        }
    }

    pub fn short_hours(self) -> f64 {
        match self {
            SplitKind::Sleeper8And2 => 2.0,
            SplitKind::Sleeper7And3 => 3.0,
        }
    }

    pub fn hours(self, portion: SplitPortion) -> f64 {
        match portion {
            SplitPortion::Long => self.long_hours(),
            SplitPortion::Short => self.short_hours(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPortion {
    Long,
    Short,
}

impl SplitPortion {
    pub fn other(self) -> SplitPortion {
        match self {
            SplitPortion::Long => SplitPortion::Short,
            SplitPortion::Short => SplitPortion::Long,
        }
    }
}

/// A split rest with one half taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRestState {
    pub kind: SplitKind,
    pub completed: SplitPortion,
    /// Driving since the completed half ended.
    pub driven_after_first: f64,
    /// On-duty time since the completed half ended.
    pub duty_after_first: f64,
    /// Shift clock since the completed half ended, split halves excluded.
    #[serde(default)]
    pub elapsed_after_first: f64,
}

/// What the driver does for a span of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Driving,
    /// On duty, not driving (docks, fueling, inspections).
    OnDuty,
    OffDuty,
    SplitRest { kind: SplitKind, portion: SplitPortion },
}

/// Limits that can stop a driver from driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HosLimit {
    DriveLimit,
    DutyWindow,
    Break,
    Cycle,
}

/// Immutable snapshot of a driver's legal hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HosState {
    pub hours_driven: f64,
    pub on_duty_hours: f64,
    /// Wall-clock hours since the shift started; the duty window runs on this.
    #[serde(default)]
    pub shift_elapsed_hours: f64,
    pub hours_since_break: f64,
    pub cycle_hours_used: f64,
    /// On-duty hours per cycle day, oldest first, current day last.
    pub cycle_days: Vec<f64>,
    /// Hours elapsed in the current ledger day.
    pub day_clock_hours: f64,
    pub split: Option<SplitRestState>,
}

impl Default for HosState {
    fn default() -> Self {
        Self {
            hours_driven: 0.0,
            on_duty_hours: 0.0,
            shift_elapsed_hours: 0.0,
            hours_since_break: 0.0,
            cycle_hours_used: 0.0,
            cycle_days: vec![0.0],
            day_clock_hours: 0.0,
            split: None,
        }
    }
}

impl HosState {
    /// Build a state from a driver snapshot.
    ///
    /// Inconsistent but plausible inputs are normalised upward (on-duty is at
    /// least hours driven, the shift clock at least on-duty, cycle at least
    /// on-duty) rather than rejected.
    pub fn from_snapshot(snapshot: &DriverSnapshot, rules: &HosRules) -> Result<Self, PlanningError> {
        let scalars = [
            ("hoursDriven", snapshot.hours_driven),
            ("onDutyTime", snapshot.on_duty_time),
            ("shiftElapsedHours", snapshot.shift_elapsed_hours),
            ("hoursSinceBreak", snapshot.hours_since_break),
            ("cycleHoursUsed", snapshot.cycle_hours_used),
        ];
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(PlanningError::InvalidInput(format!(
                    "driver {name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if snapshot.cycle_days_history.iter().any(|h| !h.is_finite() || *h < 0.0) {
            return Err(PlanningError::InvalidInput(
                "driver cycleDaysHistory contains an invalid entry".into(),
            ));
        }

        let hours_driven = snapshot.hours_driven.max(snapshot.hours_since_break);
        let on_duty_hours = snapshot.on_duty_time.max(hours_driven);
        let shift_elapsed_hours = snapshot.shift_elapsed_hours.max(on_duty_hours);

        let history = &snapshot.cycle_days_history;
        let skip = history.len().saturating_sub(rules.cycle.days);
        let mut cycle_days: Vec<f64> = history[skip..].to_vec();
        let ledger_sum: f64 = cycle_days.iter().sum();
        let cycle_hours_used = snapshot.cycle_hours_used.max(ledger_sum).max(on_duty_hours);
        match cycle_days.last_mut() {
            Some(today) => *today += cycle_hours_used - ledger_sum,
            None => cycle_days.push(cycle_hours_used),
        }

        let state = Self {
            hours_driven,
            on_duty_hours,
            shift_elapsed_hours,
            hours_since_break: snapshot.hours_since_break,
            cycle_hours_used,
            cycle_days,
            day_clock_hours: 0.0,
            split: None,
        };
        state.check_invariants()?;
        Ok(state)
    }

    /// Position the ledger's day boundary, e.g. at the departure's local time of day.
    pub fn with_day_clock(mut self, hours_into_day: f64) -> Self {
        self.day_clock_hours = hours_into_day.clamp(0.0, 24.0 - EPSILON);
        self
    }

    /// Driving time left before any of the drive, window, or cycle limits.
    pub fn drive_hours_available(&self, rules: &HosRules) -> f64 {
        (rules.drive_limit_hours - self.hours_driven)
            .min(rules.duty_window_hours - self.shift_elapsed_hours)
            .min(self.cycle_hours_remaining(rules))
            .max(0.0)
    }

    pub fn hours_until_break(&self, rules: &HosRules) -> f64 {
        (rules.break_after_driving_hours - self.hours_since_break).max(0.0)
    }

    pub fn cycle_hours_remaining(&self, rules: &HosRules) -> f64 {
        (rules.cycle.limit_hours - self.cycle_hours_used).max(0.0)
    }

    /// The limit that currently caps driving the most.
    pub fn binding_limit(&self, rules: &HosRules) -> HosLimit {
        let drive = rules.drive_limit_hours - self.hours_driven;
        let window = rules.duty_window_hours - self.shift_elapsed_hours;
        let cycle = rules.cycle.limit_hours - self.cycle_hours_used;
        if cycle + EPSILON < drive.min(window) {
            HosLimit::Cycle
        } else if window + EPSILON < drive {
            HosLimit::DutyWindow
        } else {
            HosLimit::DriveLimit
        }
    }

    /// Limits this state is already past. A driving segment ending here is a violation.
    pub fn exceeded_limits(&self, rules: &HosRules) -> Vec<HosLimit> {
        let mut exceeded = Vec::new();
        if self.hours_driven > rules.drive_limit_hours + EPSILON {
            exceeded.push(HosLimit::DriveLimit);
        }
        if self.shift_elapsed_hours > rules.duty_window_hours + EPSILON {
            exceeded.push(HosLimit::DutyWindow);
        }
        if self.hours_since_break > rules.break_after_driving_hours + EPSILON {
            exceeded.push(HosLimit::Break);
        }
        if self.cycle_hours_used > rules.cycle.limit_hours + EPSILON {
            exceeded.push(HosLimit::Cycle);
        }
        exceeded
    }

    pub fn check_invariants(&self) -> Result<(), HosError> {
        let values = [
            self.hours_driven,
            self.on_duty_hours,
            self.shift_elapsed_hours,
            self.hours_since_break,
            self.cycle_hours_used,
            self.day_clock_hours,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < -EPSILON) {
            return Err(HosError::InvariantBroken(format!("negative or non-finite counter in {self:?}")));
        }
        if self.hours_driven > self.on_duty_hours + EPSILON {
            return Err(HosError::InvariantBroken(format!(
                "hours driven {:.3} exceed on-duty {:.3}",
                self.hours_driven, self.on_duty_hours
            )));
        }
        if self.on_duty_hours > self.shift_elapsed_hours + EPSILON {
            return Err(HosError::InvariantBroken(format!(
                "on-duty {:.3} exceeds the shift clock {:.3}",
                self.on_duty_hours, self.shift_elapsed_hours
            )));
        }
        if self.on_duty_hours > self.cycle_hours_used + EPSILON {
            return Err(HosError::InvariantBroken(format!(
                "on-duty {:.3} exceeds cycle hours {:.3}",
                self.on_duty_hours, self.cycle_hours_used
            )));
        }
        Ok(())
    }

    /// Advance the state by `hours` of `activity`.
    pub fn advance(&self, hours: f64, activity: Activity, rules: &HosRules) -> Result<HosState, HosError> {
        if !hours.is_finite() || hours < 0.0 {
            return Err(HosError::InvalidDuration(hours));
        }
        if hours == 0.0 {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        match activity {
            Activity::Driving => {
                self.check_can_drive(hours, rules)?;
                next.hours_driven += hours;
                next.on_duty_hours += hours;
                next.hours_since_break += hours;
                next.run_shift_clock(hours);
                if let Some(split) = next.split.as_mut() {
                    split.driven_after_first += hours;
                    split.duty_after_first += hours;
                }
                next.accrue_ledger(hours, true, rules);
            }
            Activity::OnDuty => {
                next.on_duty_hours += hours;
                next.run_shift_clock(hours);
                if let Some(split) = next.split.as_mut() {
                    split.duty_after_first += hours;
                }
                if hours >= rules.break_minimum_hours - EPSILON {
                    next.hours_since_break = 0.0;
                }
                next.accrue_ledger(hours, true, rules);
            }
            Activity::OffDuty => {
                next.run_shift_clock(hours);
                next.accrue_ledger(hours, false, rules);
                if hours >= rules.break_minimum_hours - EPSILON {
                    next.hours_since_break = 0.0;
                }
                if hours >= rules.full_rest_hours - EPSILON {
                    next.reset_shift();
                }
                if hours >= rules.restart_hours - EPSILON {
                    next.cycle_days = vec![0.0];
                    next.cycle_hours_used = 0.0;
                }
            }
            Activity::SplitRest { kind, portion } => {
                let required = kind.hours(portion);
                if hours < required - EPSILON {
                    return Err(HosError::SplitPortionTooShort { hours, required });
                }
                next.accrue_ledger(hours, false, rules);
                next.hours_since_break = 0.0;
                match next.split.take() {
                    Some(open) if open.kind == kind && open.completed == portion.other() => {
                        // Pair complete: the shift is recalculated from the end of the first half.
                        next.hours_driven = open.driven_after_first;
                        next.on_duty_hours = open.duty_after_first;
                        next.shift_elapsed_hours = open.elapsed_after_first;
                    }
                    _ => {
                        next.split = Some(SplitRestState {
                            kind,
                            completed: portion,
                            driven_after_first: 0.0,
                            duty_after_first: 0.0,
                            elapsed_after_first: 0.0,
                        });
                    }
                }
            }
        }

        next.check_invariants()?;
        Ok(next)
    }

    fn check_can_drive(&self, hours: f64, rules: &HosRules) -> Result<(), HosError> {
        if self.hours_driven + hours > rules.drive_limit_hours + EPSILON {
            return Err(HosError::DriveLimitExceeded {
                requested: hours,
                used: self.hours_driven,
                limit: rules.drive_limit_hours,
            });
        }
        if self.shift_elapsed_hours + hours > rules.duty_window_hours + EPSILON {
            return Err(HosError::DutyWindowExceeded {
                requested: hours,
                used: self.shift_elapsed_hours,
                limit: rules.duty_window_hours,
            });
        }
        if self.hours_since_break + hours > rules.break_after_driving_hours + EPSILON {
            return Err(HosError::BreakRequired {
                requested: hours,
                used: self.hours_since_break,
                limit: rules.break_after_driving_hours,
            });
        }
        if self.cycle_hours_used + hours > rules.cycle.limit_hours + EPSILON {
            return Err(HosError::CycleExhausted {
                requested: hours,
                used: self.cycle_hours_used,
                limit: rules.cycle.limit_hours,
            });
        }
        Ok(())
    }

    fn reset_shift(&mut self) {
        self.hours_driven = 0.0;
        self.on_duty_hours = 0.0;
        self.shift_elapsed_hours = 0.0;
        self.hours_since_break = 0.0;
        self.split = None;
    }

    fn run_shift_clock(&mut self, hours: f64) {
        self.shift_elapsed_hours += hours;
        if let Some(split) = self.split.as_mut() {
            split.elapsed_after_first += hours;
        }
    }

    /// Book `hours` into the day ledger. Constant time in `hours`: whole days
    /// beyond the cycle window would be dropped again, so they are never pushed.
    fn accrue_ledger(&mut self, hours: f64, on_duty: bool, rules: &HosRules) {
        let rate = if on_duty { 1.0 } else { 0.0 };
        if self.cycle_days.is_empty() {
            self.cycle_days.push(0.0);
        }
        let room = (24.0 - self.day_clock_hours).max(0.0);
        if hours < room - EPSILON {
            if let Some(today) = self.cycle_days.last_mut() {
                *today += hours * rate;
            }
            self.day_clock_hours += hours;
        } else {
            if let Some(today) = self.cycle_days.last_mut() {
                *today += room * rate;
            }
            let rest = (hours - room).max(0.0);
            let whole_days = (rest / 24.0).floor();
            let tail = (rest - whole_days * 24.0).clamp(0.0, 24.0 - EPSILON);
            let window = rules.cycle.days.max(1);
            let pushed = (whole_days as usize).min(window);
            self.cycle_days.extend(std::iter::repeat_n(24.0 * rate, pushed));
            self.cycle_days.push(tail * rate);
            self.day_clock_hours = tail;
            let excess = self.cycle_days.len().saturating_sub(window);
            self.cycle_days.drain(..excess);
        }
        self.cycle_hours_used = self.cycle_days.iter().sum();
    }
}
