//! Compliance validation over a finished segment list.
//!
//! Every rule is reported, either as `pass` (nothing came close), `addressed`
//! (an inserted rest, break or restart kept the driver legal) or `violated`.

use serde::{Deserialize, Serialize};

use crate::config::HosRules;
use crate::hos::{EPSILON, HosLimit, SplitPortion};
use crate::segment::{RestReason, RestType, Segment, SegmentKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HosRule {
    DriveLimit,
    DutyWindow,
    Break,
    Cycle,
    FullRest,
    SplitSleeper,
    StateConsistency,
}

impl HosRule {
    pub const ALL: [HosRule; 7] = [
        HosRule::DriveLimit,
        HosRule::DutyWindow,
        HosRule::Break,
        HosRule::Cycle,
        HosRule::FullRest,
        HosRule::SplitSleeper,
        HosRule::StateConsistency,
    ];
}

impl From<HosLimit> for HosRule {
    fn from(limit: HosLimit) -> Self {
        match limit {
            HosLimit::DriveLimit => HosRule::DriveLimit,
            HosLimit::DutyWindow => HosRule::DutyWindow,
            HosLimit::Break => HosRule::Break,
            HosLimit::Cycle => HosRule::Cycle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Pass,
    Addressed,
    Violated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCheck {
    pub rule: HosRule,
    pub status: RuleStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceViolation {
    pub sequence_order: u32,
    pub rule: HosRule,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub rest_stops: usize,
    pub breaks: usize,
    pub restarts: usize,
    pub split_rests: usize,
    pub docktime_conversions: usize,
    pub fuel_stops: usize,
    pub violations: Vec<ComplianceViolation>,
    pub rules: Vec<RuleCheck>,
    pub is_fully_compliant: bool,
}

impl ComplianceReport {
    pub fn status(&self, rule: HosRule) -> Option<RuleStatus> {
        self.rules.iter().find(|check| check.rule == rule).map(|check| check.status)
    }
}

/// Check every segment's post-state against `rules`.
pub fn validate(segments: &[Segment], rules: &HosRules) -> ComplianceReport {
    let mut report = ComplianceReport::default();
    let mut addressed: Vec<HosRule> = Vec::new();

    for segment in segments {
        let order = segment.sequence_order;
        if let Err(err) = segment.hos_after.check_invariants() {
            report.violations.push(ComplianceViolation {
                sequence_order: order,
                rule: HosRule::StateConsistency,
                message: err.to_string(),
            });
        }

        match &segment.kind {
            SegmentKind::Drive { .. } => {
                for limit in segment.hos_after.exceeded_limits(rules) {
                    report.violations.push(ComplianceViolation {
                        sequence_order: order,
                        rule: limit.into(),
                        message: format!("drive segment {order} ends past the {limit:?} limit"),
                    });
                }
            }
            SegmentKind::Rest { rest_type, reason, .. } => {
                report.rest_stops += 1;
                match reason {
                    RestReason::DriveLimit => addressed.push(HosRule::DriveLimit),
                    RestReason::DutyWindow => addressed.push(HosRule::DutyWindow),
                    RestReason::CycleLimit => addressed.push(HosRule::Cycle),
                    RestReason::SplitStart
                    | RestReason::SplitPairing
                    | RestReason::DriverRequest
                    | RestReason::AppointmentWait => {}
                }
                check_rest_length(&mut report, &mut addressed, segment, *rest_type, rules);
            }
            SegmentKind::Break { .. } => {
                report.breaks += 1;
                addressed.push(HosRule::Break);
                if segment.duration_hours + EPSILON < rules.break_minimum_hours {
                    report.violations.push(ComplianceViolation {
                        sequence_order: order,
                        rule: HosRule::Break,
                        message: format!(
                            "break of {:.2}h is shorter than {}h",
                            segment.duration_hours, rules.break_minimum_hours
                        ),
                    });
                }
            }
            SegmentKind::Fuel { .. } => report.fuel_stops += 1,
            SegmentKind::Dock {
                converted_rest: Some(rest_type),
                ..
            } => {
                report.docktime_conversions += 1;
                check_rest_length(&mut report, &mut addressed, segment, *rest_type, rules);
            }
            SegmentKind::Dock { .. } => {}
        }
    }

    report.rules = HosRule::ALL
        .iter()
        .map(|&rule| {
            let status = if report.violations.iter().any(|v| v.rule == rule) {
                RuleStatus::Violated
            } else if addressed.contains(&rule) {
                RuleStatus::Addressed
            } else {
                RuleStatus::Pass
            };
            RuleCheck { rule, status }
        })
        .collect();
    report.is_fully_compliant = report.violations.is_empty();
    report
}

fn check_rest_length(
    report: &mut ComplianceReport,
    addressed: &mut Vec<HosRule>,
    segment: &Segment,
    rest_type: RestType,
    rules: &HosRules,
) {
    let order = segment.sequence_order;
    let hours = segment.duration_hours;
    let (rule, required) = match rest_type {
        RestType::Full => (HosRule::FullRest, rules.full_rest_hours),
        RestType::Restart => {
            report.restarts += 1;
            (HosRule::Cycle, rules.restart_hours)
        }
        RestType::SplitLong | RestType::SplitShort => {
            report.split_rests += 1;
            let Some(kind) = segment.split_kind() else {
                report.violations.push(ComplianceViolation {
                    sequence_order: order,
                    rule: HosRule::SplitSleeper,
                    message: format!("{rest_type:?} rest names no split rule"),
                });
                return;
            };
            let portion = if rest_type == RestType::SplitLong {
                SplitPortion::Long
            } else {
                SplitPortion::Short
            };
            (HosRule::SplitSleeper, kind.hours(portion))
        }
        RestType::OffDuty => return,
    };
    addressed.push(rule);
    if hours + EPSILON < required {
        report.violations.push(ComplianceViolation {
            sequence_order: order,
            rule,
            message: format!("{rest_type:?} rest of {hours:.2}h is shorter than {required}h"),
        });
    }
}
