use std::collections::HashMap;
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use crate::models::{Event, EventCost, ScheduleDecision, ScheduleStatus};
use crate::power_data::PowerMatrix;
use crate::tariff::Tariff;

/// Cost of running a power profile from `placement_start` under a tariff.
///
/// Riemann sum over one-minute bins: instantaneous watts converted to kWh
/// times the per-minute rate. The season of each minute is derived from its
/// absolute calendar date, so a placement crossing midnight picks up the new
/// day's season.
///
/// # Arguments
///
/// * 'profile' - watts per minute
/// * 'placement_start' - absolute start of the placement
/// * 'tariff' - tariff scheme to price against
pub fn placement_cost(profile: &[f64], placement_start: NaiveDateTime, tariff: &Tariff) -> f64 {
    let mut total = 0.0;
    for (i, watts) in profile.iter().enumerate() {
        let at = placement_start + Duration::minutes(i as i64);
        let season = tariff.season_for_month(at.month());
        let rate = tariff.rate_at(at.hour() * 60 + at.minute(), season);
        total += watts / 60.0 / 1000.0 * rate;
    }

    total
}

/// Prices every event under its original and scheduled placement.
///
/// The power profile is carried unchanged: a moved appliance is assumed to
/// draw the same curve at its new start. Events without a SUCCESS decision
/// keep their original cost on both sides.
///
/// # Arguments
///
/// * 'events' - the full event table
/// * 'decisions' - schedule decisions over the reschedulable subset
/// * 'matrix' - power matrix the profiles live in
/// * 'tariff' - tariff scheme to price against
pub fn event_costs(
    events: &[Event],
    decisions: &[ScheduleDecision],
    matrix: &PowerMatrix,
    tariff: &Tariff,
) -> Vec<EventCost> {
    let by_event: HashMap<usize, &ScheduleDecision> =
        decisions.iter().map(|d| (d.event_idx, d)).collect();

    events
        .iter()
        .enumerate()
        .map(|(event_idx, event)| {
            let profile = matrix.profile(event.col, event.row, event.duration_min);
            let orig_total_cost = placement_cost(profile, event.start_time, tariff);

            let decision = by_event.get(&event_idx);
            let migrated = decision.is_some_and(|d| d.status == ScheduleStatus::Success);
            let sched_total_cost = match decision {
                Some(d) if migrated => placement_cost(profile, d.scheduled_start, tariff),
                _ => orig_total_cost,
            };

            EventCost {
                event_idx,
                event_id: event.event_id.clone(),
                appliance_name: event.appliance_name.clone(),
                status: decision.map(|d| d.status),
                migrated,
                orig_total_cost,
                sched_total_cost,
            }
        })
        .collect()
}

/// Sums a cost table into (original, scheduled) totals
pub fn totals(costs: &[EventCost]) -> (f64, f64) {
    costs.iter().fold((0.0, 0.0), |(orig, sched), c| {
        (orig + c.orig_total_cost, sched + c.sched_total_cost)
    })
}

/// Per-appliance (original, scheduled) totals, keyed by display name
pub fn appliance_totals(costs: &[EventCost]) -> std::collections::BTreeMap<String, (f64, f64)> {
    let mut by_appliance: std::collections::BTreeMap<String, (f64, f64)> = Default::default();
    for cost in costs {
        let entry = by_appliance.entry(cost.appliance_name.clone()).or_insert((0.0, 0.0));
        entry.0 += cost.orig_total_cost;
        entry.1 += cost.sched_total_cost;
    }
    by_appliance
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::tariff::TariffBook;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, 0).unwrap()
    }

    fn economy_7() -> Tariff {
        let json = r#"{
            "Economy_7": {"type": "time_based", "periods": [
                {"start": "00:30", "end": "07:30", "rate": 0.15},
                {"start": "07:30", "end": "00:30", "rate": 0.30}
            ]}
        }"#;
        TariffBook::from_json_str(json).unwrap().get("Economy_7").unwrap().clone()
    }

    #[test]
    fn test_flat_profile_cost() {
        // 2000 W for 90 minutes at 0.30/kWh = 0.9
        let profile = vec![2000.0; 90];
        let cost = placement_cost(&profile, dt(2024, 3, 1, 22, 10), &economy_7());
        assert!((cost - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_cost_splits_at_tariff_boundary() {
        // 00:00-01:00: 30 min high then 30 min low
        let profile = vec![2000.0; 60];
        let cost = placement_cost(&profile, dt(2024, 3, 1, 0, 0), &economy_7());
        let expected = 30.0 * (2000.0 / 60.0 / 1000.0) * 0.30
            + 30.0 * (2000.0 / 60.0 / 1000.0) * 0.15;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_seasonal_cost_crosses_midnight_into_new_month() {
        let json = r#"{
            "TOU_D": {"seasonal_rates": {
                "summer": {"time_blocks": [{"start": "00:00", "end": "00:00", "rate": 0.40}]},
                "winter": {"time_blocks": [{"start": "00:00", "end": "00:00", "rate": 0.20}]}
            }}
        }"#;
        let book = TariffBook::from_json_str(json).unwrap();
        let tariff = book.get("TOU_D").unwrap();

        // Oct 31 23:00 + 120 min: first hour summer, second hour winter
        let profile = vec![3000.0; 120];
        let cost = placement_cost(&profile, dt(2024, 10, 31, 23, 0), tariff);
        let expected = 60.0 * (3000.0 / 60.0 / 1000.0) * 0.40
            + 60.0 * (3000.0 / 60.0 / 1000.0) * 0.20;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_appliance_totals_grouping() {
        let costs = vec![
            EventCost {
                event_idx: 0,
                event_id: "a".into(),
                appliance_name: "Washing Machine".into(),
                status: Some(crate::models::ScheduleStatus::Success),
                migrated: true,
                orig_total_cost: 0.9,
                sched_total_cost: 0.45,
            },
            EventCost {
                event_idx: 1,
                event_id: "b".into(),
                appliance_name: "Washing Machine".into(),
                status: Some(crate::models::ScheduleStatus::Failed),
                migrated: false,
                orig_total_cost: 0.3,
                sched_total_cost: 0.3,
            },
            EventCost {
                event_idx: 2,
                event_id: "c".into(),
                appliance_name: "Fridge".into(),
                status: None,
                migrated: false,
                orig_total_cost: 0.1,
                sched_total_cost: 0.1,
            },
        ];

        let by_appliance = appliance_totals(&costs);
        assert_eq!(by_appliance["Washing Machine"], (1.2, 0.75));
        assert_eq!(by_appliance["Fridge"], (0.1, 0.1));
    }

    #[test]
    fn test_cost_recomputation_is_idempotent() {
        let profile = vec![1234.5; 75];
        let first = placement_cost(&profile, dt(2024, 3, 1, 6, 50), &economy_7());
        let second = placement_cost(&profile, dt(2024, 3, 1, 6, 50), &economy_7());
        assert!((first - second).abs() <= 1e-9 * first.abs());
    }
}
