use std::collections::HashMap;
use chrono::{Datelike, Duration};
use crate::appliance_index::ApplianceIndex;
use crate::constraints::{ApplianceConstraint, ConstraintBook};
use crate::models::{
    abs_minute, Event, FailureReason, ScheduleDecision, ScheduleStatus, ShiftRule,
};
use crate::tariff::{Season, Tariff};
use crate::workspace::WorkingSpace;

/// Mandatory minimum delay for only_delay events; doubles as the step used
/// to nudge a candidate start off a rejected minute
pub const MIN_DELAY_MIN: u32 = 5;

/// Already-scheduled intervals per appliance, in absolute minutes so events
/// of neighboring days cannot collide unnoticed
pub type TakenIntervals = HashMap<usize, Vec<(i64, i64)>>;

/// Chooses a new start for one reschedulable event.
///
/// Candidates are enumerated per price level in ascending level order, capped
/// at the event's original level, and the first accepted start wins. Within a
/// level, only_advance tries the nearest preceding interval first; delay and
/// free moves scan forward. Inside an interval the minimum start satisfying
/// the shift rule is tried and stepped in 5-minute increments past rejected
/// minutes.
///
/// Forbidden windows are checked with closed bounds against both endpoints,
/// and a candidate may not strictly contain a forbidden window; full
/// containment in a single available interval is not required, so the tail
/// may run into a following available interval.
///
/// # Arguments
///
/// * 'event' - the event to place
/// * 'event_idx' - its index in the pipeline event table
/// * 'constraint' - appliance constraint record
/// * 'space' - the appliance working space
/// * 'taken' - already-scheduled intervals of this appliance, absolute minutes
/// * 'season' - season variant the event falls into
pub fn schedule_event(
    event: &Event,
    event_idx: usize,
    constraint: &ApplianceConstraint,
    space: &WorkingSpace,
    taken: &[(i64, i64)],
    season: Option<Season>,
) -> ScheduleDecision {
    let original_level = event.primary_price_level.unwrap_or(0);

    if space.is_empty() {
        return failed(event, event_idx, original_level, FailureReason::NoWorkingSpace, season);
    }
    if event.duration_min < constraint.min_duration {
        return failed(event, event_idx, original_level, FailureReason::DurationBelowMinimum, season);
    }

    let duration = event.duration_min;
    let original_start = event.start_minute_of_day();
    let horizon = space.horizon;

    let deadline_unreachable = match constraint.shift_rule {
        ShiftRule::OnlyDelay => original_start + MIN_DELAY_MIN + duration > horizon,
        ShiftRule::OnlyAdvance => duration > original_start,
        ShiftRule::Both => duration > horizon,
    };
    if deadline_unreachable {
        return failed(event, event_idx, original_level, FailureReason::DeadlineUnreachable, season);
    }

    let day_abs = abs_minute(event.day_start());
    let mut saw_candidate = false;
    let mut saw_forbidden_reject = false;
    let mut saw_overlap_reject = false;

    for (&level, list) in space.price_level_intervals.iter() {
        if level > original_level {
            break;
        }

        let ordered: Vec<(u32, u32)> = match constraint.shift_rule {
            // Advance moves try the nearest preceding window first
            ShiftRule::OnlyAdvance => list.iter().rev().cloned().collect(),
            _ => list.clone(),
        };

        for (interval_start, interval_end) in ordered {
            let base = match constraint.shift_rule {
                ShiftRule::OnlyDelay => interval_start.max(original_start + MIN_DELAY_MIN),
                _ => interval_start,
            };

            let mut start = base;
            while start < interval_end {
                if constraint.shift_rule == ShiftRule::OnlyAdvance
                    && start + duration > original_start
                {
                    break;
                }
                if start + duration > horizon {
                    break;
                }
                saw_candidate = true;

                let end = start + duration;
                if hits_forbidden(start, end, &space.forbidden_intervals) {
                    saw_forbidden_reject = true;
                    start += MIN_DELAY_MIN;
                    continue;
                }

                let abs_start = day_abs + start as i64;
                let abs_end = day_abs + end as i64;
                if taken.iter().any(|&(s, e)| abs_start < e && s < abs_end) {
                    saw_overlap_reject = true;
                    start += MIN_DELAY_MIN;
                    continue;
                }

                return accepted(event, event_idx, original_level, level, start, season);
            }
        }
    }

    let reason = if !saw_candidate {
        FailureReason::ShiftRuleViolated
    } else if saw_forbidden_reject && !saw_overlap_reject {
        FailureReason::ForbiddenOverlap
    } else {
        FailureReason::NoValidCandidate
    };

    failed(event, event_idx, original_level, reason, season)
}

/// Schedules every reschedulable event of a house under one tariff.
///
/// Events are processed in ascending original start order, so earlier events
/// get first pick of cheaper slots; the per-appliance taken list grows as
/// placements succeed and a later event can never displace an earlier one.
///
/// # Arguments
///
/// * 'events' - the full event table
/// * 'index' - appliance index of the house
/// * 'constraints' - the house constraint book
/// * 'spaces' - working spaces keyed by (appliance, season)
/// * 'tariff' - target tariff scheme
pub fn schedule_events(
    events: &[Event],
    index: &ApplianceIndex,
    constraints: &ConstraintBook,
    spaces: &HashMap<(usize, Option<Season>), WorkingSpace>,
    tariff: &Tariff,
) -> (Vec<ScheduleDecision>, TakenIntervals) {
    let mut order: Vec<usize> = (0..events.len())
        .filter(|&i| events[i].is_reschedulable)
        .collect();
    order.sort_by_key(|&i| events[i].start_time);

    let mut decisions: Vec<ScheduleDecision> = Vec::with_capacity(order.len());
    let mut taken: TakenIntervals = HashMap::new();

    for event_idx in order {
        let event = &events[event_idx];
        let season = tariff.season_for_month(event.start_time.month());

        let decision = match (
            index.constraint(event.appliance, constraints),
            spaces.get(&(event.appliance, season)),
        ) {
            (Some(constraint), Some(space)) => {
                let taken_list = taken.entry(event.appliance).or_default();
                schedule_event(event, event_idx, constraint, space, taken_list, season)
            }
            _ => failed(
                event,
                event_idx,
                event.primary_price_level.unwrap_or(0),
                FailureReason::NoWorkingSpace,
                season,
            ),
        };

        if decision.status == ScheduleStatus::Success {
            let list = taken.entry(event.appliance).or_default();
            list.push((
                abs_minute(decision.scheduled_start),
                abs_minute(decision.scheduled_end),
            ));
            list.sort_unstable();
        }
        decisions.push(decision);
    }

    (decisions, taken)
}

/// Closed-bound endpoint and strict containment check against forbidden windows
fn hits_forbidden(start: u32, end: u32, forbidden: &[(u32, u32)]) -> bool {
    forbidden.iter().any(|&(s, e)| {
        (s <= start && start <= e) || (s <= end && end <= e) || (start < s && e < end)
    })
}

fn accepted(
    event: &Event,
    event_idx: usize,
    original_level: u8,
    level: u8,
    start: u32,
    season: Option<Season>,
) -> ScheduleDecision {
    let scheduled_start = event.day_start() + Duration::minutes(start as i64);
    let scheduled_end = scheduled_start + Duration::minutes(event.duration_min as i64);
    let shift_minutes = start as i64 - event.start_minute_of_day() as i64;

    // A move without level improvement keeps a weak positive score; consumers
    // must not threshold on it.
    let optimization_score = if level < original_level {
        (original_level - level) as f64
    } else {
        0.1
    };

    ScheduleDecision {
        event_idx,
        event_id: event.event_id.clone(),
        appliance: event.appliance,
        appliance_name: event.appliance_name.clone(),
        original_start: event.start_time,
        original_end: event.end_time,
        original_level,
        scheduled_start,
        scheduled_end,
        scheduled_level: level,
        status: ScheduleStatus::Success,
        failure_reason: None,
        shift_minutes,
        optimization_score,
        season,
    }
}

fn failed(
    event: &Event,
    event_idx: usize,
    original_level: u8,
    reason: FailureReason,
    season: Option<Season>,
) -> ScheduleDecision {
    ScheduleDecision {
        event_idx,
        event_id: event.event_id.clone(),
        appliance: event.appliance,
        appliance_name: event.appliance_name.clone(),
        original_start: event.start_time,
        original_end: event.end_time,
        original_level,
        scheduled_start: event.start_time,
        scheduled_end: event.end_time,
        scheduled_level: original_level,
        status: ScheduleStatus::Failed,
        failure_reason: Some(reason),
        shift_minutes: 0,
        optimization_score: 0.0,
        season,
    }
}
