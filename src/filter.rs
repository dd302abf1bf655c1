use chrono::{Datelike, Duration, Timelike};
use crate::appliance_index::ApplianceIndex;
use crate::constraints::ConstraintBook;
use crate::models::{Event, Shiftability};
use crate::tariff::Tariff;

/// Fewer expensive minutes than this and a move cannot pay off
const MIN_EXPENSIVE_MINUTES: u32 = 5;

/// Pass A: drops events shorter than their appliance's minimum operating
/// cycle; such runs are measurement noise or interruptions and must not be
/// moved. Events of appliances with no constraint record are dropped too.
///
/// Returns how many events were filtered out. Idempotent, never enlarges
/// the reschedulable set.
///
/// # Arguments
///
/// * 'events' - the event table, edited in place
/// * 'index' - appliance index of the house
/// * 'constraints' - the house constraint book
pub fn apply_min_duration_filter(
    events: &mut [Event],
    index: &ApplianceIndex,
    constraints: &ConstraintBook,
) -> usize {
    let mut filtered = 0usize;

    for event in events.iter_mut() {
        if event.shiftability != Shiftability::Shiftable || !event.is_reschedulable {
            continue;
        }
        match index.constraint(event.appliance, constraints) {
            None => {
                event.is_reschedulable = false;
                filtered += 1;
            }
            Some(constraint) if event.duration_min < constraint.min_duration => {
                event.is_reschedulable = false;
                filtered += 1;
            }
            Some(_) => {}
        }
    }

    filtered
}

/// Pass B: drops events without time-of-use optimization potential under the
/// target tariff and records each remaining event's primary price level.
///
/// An event minute is expensive when its level under the tariff is above 0;
/// events with fewer than 5 expensive minutes stay where they are. The
/// primary level is the level spanning the majority of event minutes, lowest
/// level winning a tie.
///
/// # Arguments
///
/// * 'events' - the event table, edited in place
/// * 'tariff' - target tariff scheme
pub fn apply_tou_filter(events: &mut [Event], tariff: &Tariff) -> usize {
    let mut filtered = 0usize;

    for event in events.iter_mut() {
        if !event.is_reschedulable {
            continue;
        }

        let mut expensive_minutes = 0u32;
        let mut level_minutes: Vec<u32> = Vec::new();

        for offset in 0..event.duration_min {
            let at = event.start_time + Duration::minutes(offset as i64);
            let season = tariff.season_for_month(at.month());
            let level = tariff.level_at(at.hour() * 60 + at.minute(), season);

            if level > 0 {
                expensive_minutes += 1;
            }
            if level_minutes.len() <= level as usize {
                level_minutes.resize(level as usize + 1, 0);
            }
            level_minutes[level as usize] += 1;
        }

        let primary = level_minutes
            .iter()
            .enumerate()
            .max_by_key(|(level, count)| (**count, std::cmp::Reverse(*level)))
            .map(|(level, _)| level as u8)
            .unwrap_or(0);
        event.primary_price_level = Some(primary);

        if expensive_minutes < MIN_EXPENSIVE_MINUTES {
            event.is_reschedulable = false;
            filtered += 1;
        }
    }

    filtered
}
