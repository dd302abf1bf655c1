use std::fmt;
use std::fmt::Formatter;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use crate::tariff::Season;

/// How an appliance's operation may be treated by the scheduler
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Shiftability {
    Base,
    Shiftable,
    NonShiftable,
}

/// Implementation of the Display Trait for pretty print
impl fmt::Display for Shiftability {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Shiftability::Base => write!(f, "Base"),
            Shiftability::Shiftable => write!(f, "Shiftable"),
            Shiftability::NonShiftable => write!(f, "NonShiftable"),
        }
    }
}

/// Direction a shiftable event may be moved
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShiftRule {
    #[default]
    OnlyDelay,
    OnlyAdvance,
    Both,
}

/// Appliance label row from the label CSV
#[derive(Clone, Debug)]
pub struct ApplianceLabel {
    pub id: String,
    pub name: String,
    pub shiftability: Shiftability,
    pub pmin_w: Option<f64>,
    pub tmin_min: Option<u32>,
}

/// One appliance operation event produced by segmentation.
///
/// The power profile is not copied; the event references its run in the
/// power matrix through `col` and `row`.
#[derive(Clone, Debug)]
pub struct Event {
    pub event_id: String,
    pub appliance: usize,
    pub appliance_name: String,
    pub shiftability: Shiftability,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub duration_min: u32,
    pub energy_wmin: f64,
    pub col: usize,
    pub row: usize,
    pub is_reschedulable: bool,
    pub primary_price_level: Option<u8>,
}

impl Event {
    /// Minute of day of the original start
    pub fn start_minute_of_day(&self) -> u32 {
        self.start_time.hour() * 60 + self.start_time.minute()
    }

    /// Midnight of the event's original day
    pub fn day_start(&self) -> NaiveDateTime {
        self.start_time.date().and_hms_opt(0, 0, 0).unwrap()
    }
}

/// Schedule outcome of one reschedulable event
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Success,
    Failed,
}

/// Implementation of the Display Trait for pretty print
impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ScheduleStatus::Success => write!(f, "SUCCESS"),
            ScheduleStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Why a reschedulable event could not be placed
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum FailureReason {
    NoWorkingSpace,
    DurationBelowMinimum,
    NoValidCandidate,
    ForbiddenOverlap,
    ShiftRuleViolated,
    DeadlineUnreachable,
    CollisionUnresolved,
}

/// Implementation of the Display Trait for pretty print
impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let text = match self {
            FailureReason::NoWorkingSpace => "NoWorkingSpace",
            FailureReason::DurationBelowMinimum => "DurationBelowMinimum",
            FailureReason::NoValidCandidate => "NoValidCandidate",
            FailureReason::ForbiddenOverlap => "ForbiddenOverlap",
            FailureReason::ShiftRuleViolated => "ShiftRuleViolated",
            FailureReason::DeadlineUnreachable => "DeadlineUnreachable",
            FailureReason::CollisionUnresolved => "CollisionUnresolved",
        };
        write!(f, "{}", text)
    }
}

/// Placement decision for one reschedulable event.
///
/// `event_idx` points back into the pipeline's event vector. A FAILED
/// decision keeps the original placement in its scheduled fields.
#[derive(Clone, Debug)]
pub struct ScheduleDecision {
    pub event_idx: usize,
    pub event_id: String,
    pub appliance: usize,
    pub appliance_name: String,
    pub original_start: NaiveDateTime,
    pub original_end: NaiveDateTime,
    pub original_level: u8,
    pub scheduled_start: NaiveDateTime,
    pub scheduled_end: NaiveDateTime,
    pub scheduled_level: u8,
    pub status: ScheduleStatus,
    pub failure_reason: Option<FailureReason>,
    pub shift_minutes: i64,
    pub optimization_score: f64,
    pub season: Option<Season>,
}

/// Cost of one event under its original and scheduled placement.
/// `status` is None for events that never entered the scheduler.
#[derive(Clone, Debug)]
pub struct EventCost {
    pub event_idx: usize,
    pub event_id: String,
    pub appliance_name: String,
    pub status: Option<ScheduleStatus>,
    pub migrated: bool,
    pub orig_total_cost: f64,
    pub sched_total_cost: f64,
}

/// Absolute minute index of a timestamp, used for cross-day overlap checks
pub fn abs_minute(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp() / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, 0).unwrap()
    }

    #[test]
    fn test_start_minute_of_day() {
        let event = Event {
            event_id: "washing_machine_2024-03-01_01".into(),
            appliance: 0,
            appliance_name: "Washing Machine".into(),
            shiftability: Shiftability::Shiftable,
            start_time: dt(2024, 3, 1, 22, 10),
            end_time: dt(2024, 3, 1, 23, 40),
            duration_min: 90,
            energy_wmin: 180_000.0,
            col: 0,
            row: 1330,
            is_reschedulable: true,
            primary_price_level: None,
        };
        assert_eq!(event.start_minute_of_day(), 1330);
        assert_eq!(event.day_start(), dt(2024, 3, 1, 0, 0));
    }

    #[test]
    fn test_abs_minute_is_contiguous_across_midnight() {
        let before = abs_minute(dt(2024, 3, 1, 23, 59));
        let after = abs_minute(dt(2024, 3, 2, 0, 0));
        assert_eq!(after - before, 1);
    }

    #[test]
    fn test_shift_rule_snake_case_parse() {
        let rule: ShiftRule = serde_json::from_str("\"only_delay\"").unwrap();
        assert_eq!(rule, ShiftRule::OnlyDelay);
        let rule: ShiftRule = serde_json::from_str("\"both\"").unwrap();
        assert_eq!(rule, ShiftRule::Both);
    }

    #[test]
    fn test_status_display_matches_output_format() {
        assert_eq!(ScheduleStatus::Success.to_string(), "SUCCESS");
        assert_eq!(FailureReason::DeadlineUnreachable.to_string(), "DeadlineUnreachable");
    }
}
