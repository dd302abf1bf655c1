use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use log::info;
use serde::Serialize;
use crate::constraints::ConstraintBook;
use crate::errors::PipelineError;
use crate::models::{ApplianceLabel, Event, EventCost, ScheduleDecision};
use crate::pipeline::PipelineOutcome;
use crate::tariff::Season;
use crate::workspace::WorkingSpace;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes the segmented event table
///
/// # Arguments
///
/// * 'writer' - CSV byte sink
/// * 'events' - events to write
/// * 'labels' - appliance labels in power-column order
pub fn write_events_csv<W: io::Write>(
    writer: W,
    events: &[Event],
    labels: &[ApplianceLabel],
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "event_id",
        "appliance_id",
        "appliance_name",
        "shiftability",
        "start_time",
        "end_time",
        "duration_min",
        "energy_W",
        "is_reschedulable",
    ])?;

    for event in events {
        csv_writer.write_record([
            event.event_id.clone(),
            labels[event.appliance].id.clone(),
            event.appliance_name.clone(),
            event.shiftability.to_string(),
            event.start_time.format(TIME_FORMAT).to_string(),
            event.end_time.format(TIME_FORMAT).to_string(),
            event.duration_min.to_string(),
            format!("{:.1}", event.energy_wmin),
            event.is_reschedulable.to_string(),
        ])?;
    }
    csv_writer.flush()?;

    Ok(())
}

/// Writes the schedule decision table
pub fn write_scheduled_csv<W: io::Write>(
    writer: W,
    decisions: &[ScheduleDecision],
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "event_id",
        "appliance_name",
        "original_start_time",
        "original_end_time",
        "scheduled_start_time",
        "scheduled_end_time",
        "original_price_level",
        "scheduled_price_level",
        "optimization_score",
        "shift_minutes",
        "schedule_status",
        "failure_reason",
        "season",
    ])?;

    for decision in decisions {
        csv_writer.write_record([
            decision.event_id.clone(),
            decision.appliance_name.clone(),
            decision.original_start.format(TIME_FORMAT).to_string(),
            decision.original_end.format(TIME_FORMAT).to_string(),
            decision.scheduled_start.format(TIME_FORMAT).to_string(),
            decision.scheduled_end.format(TIME_FORMAT).to_string(),
            decision.original_level.to_string(),
            decision.scheduled_level.to_string(),
            format!("{}", decision.optimization_score),
            decision.shift_minutes.to_string(),
            decision.status.to_string(),
            decision.failure_reason.map(|r| r.to_string()).unwrap_or_default(),
            decision.season.map(|s| s.to_string()).unwrap_or_default(),
        ])?;
    }
    csv_writer.flush()?;

    Ok(())
}

/// Writes one side of the cost split
///
/// # Arguments
///
/// * 'writer' - CSV byte sink
/// * 'costs' - the full cost table
/// * 'migrated' - which side of the split to write
pub fn write_cost_csv<W: io::Write>(
    writer: W,
    costs: &[EventCost],
    migrated: bool,
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "event_id",
        "appliance_name",
        "schedule_status",
        "orig_total_cost",
        "sched_total_cost",
    ])?;

    for cost in costs.iter().filter(|c| c.migrated == migrated) {
        csv_writer.write_record([
            cost.event_id.clone(),
            cost.appliance_name.clone(),
            cost.status.map(|s| s.to_string()).unwrap_or_default(),
            format!("{:.6}", cost.orig_total_cost),
            format!("{:.6}", cost.sched_total_cost),
        ])?;
    }
    csv_writer.flush()?;

    Ok(())
}

#[derive(Serialize)]
struct ConstraintDump {
    forbidden_time: Vec<[String; 2]>,
    latest_finish: String,
    shift_rule: crate::models::ShiftRule,
    min_duration: u32,
}

#[derive(Serialize)]
struct SpaceDump {
    constraints: Option<ConstraintDump>,
    latest_finish_minutes: u32,
    forbidden_intervals: Vec<(u32, u32)>,
    available_intervals: Vec<(u32, u32)>,
    price_level_intervals: BTreeMap<String, Vec<(u32, u32)>>,
}

/// Serializes the working spaces of one run, keyed by appliance display name
/// with a season layer for seasonal tariffs
pub fn working_spaces_json(
    outcome: &PipelineOutcome,
    labels: &[ApplianceLabel],
    constraints: &ConstraintBook,
) -> Result<String, serde_json::Error> {
    let mut by_name: BTreeMap<String, serde_json::Value> = BTreeMap::new();

    let mut keys: Vec<&(usize, Option<Season>)> = outcome.spaces.keys().collect();
    keys.sort();
    for &(appliance, season) in keys {
        let space = &outcome.spaces[&(appliance, season)];
        let name = labels[appliance].name.clone();
        let dump = serde_json::to_value(space_dump(space, &name, constraints))?;

        match season {
            None => {
                by_name.insert(name, dump);
            }
            Some(season) => {
                let entry = by_name
                    .entry(name)
                    .or_insert_with(|| serde_json::Value::Object(Default::default()));
                entry
                    .as_object_mut()
                    .expect("season layer is an object")
                    .insert(season.to_string(), dump);
            }
        }
    }

    serde_json::to_string_pretty(&by_name)
}

fn space_dump(space: &WorkingSpace, name: &str, constraints: &ConstraintBook) -> SpaceDump {
    let constraint_dump = constraints.get(name).map(|c| ConstraintDump {
        forbidden_time: c
            .forbidden_time
            .iter()
            .map(|&(s, e)| [minutes_to_hhmm(s), minutes_to_hhmm(e)])
            .collect(),
        latest_finish: minutes_to_hhmm(c.latest_finish),
        shift_rule: c.shift_rule,
        min_duration: c.min_duration,
    });

    SpaceDump {
        constraints: constraint_dump,
        latest_finish_minutes: space.horizon,
        forbidden_intervals: space.forbidden_intervals.clone(),
        available_intervals: space.available_intervals.clone(),
        price_level_intervals: space
            .price_level_intervals
            .iter()
            .map(|(level, list)| (level.to_string(), list.clone()))
            .collect(),
    }
}

/// Minutes to "HH:MM", hours may exceed 23 for 48h deadlines
fn minutes_to_hhmm(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Writes all outputs of one (house, tariff) run under
/// `<output_dir>/<tariff>/<house>/`
///
/// # Arguments
///
/// * 'output_dir' - root output directory
/// * 'outcome' - the pipeline outcome
/// * 'labels' - appliance labels in power-column order
/// * 'constraints' - the house constraint book
pub fn save_outcome(
    output_dir: &str,
    outcome: &PipelineOutcome,
    labels: &[ApplianceLabel],
    constraints: &ConstraintBook,
) -> Result<(), PipelineError> {
    let dir = Path::new(output_dir).join(&outcome.tariff).join(&outcome.house);
    fs::create_dir_all(&dir)?;

    write_events_csv(fs::File::create(dir.join("events_with_ids.csv"))?, &outcome.events, labels)?;

    let reschedulable: Vec<Event> = outcome
        .events
        .iter()
        .filter(|e| e.is_reschedulable)
        .cloned()
        .collect();
    write_events_csv(
        fs::File::create(dir.join("reschedulable_events.csv"))?,
        &reschedulable,
        labels,
    )?;

    write_scheduled_csv(fs::File::create(dir.join("scheduled_events.csv"))?, &outcome.decisions)?;
    write_cost_csv(fs::File::create(dir.join("migrated_costs.csv"))?, &outcome.costs, true)?;
    write_cost_csv(fs::File::create(dir.join("non_migrated_costs.csv"))?, &outcome.costs, false)?;

    let spaces = working_spaces_json(outcome, labels, constraints)?;
    fs::write(dir.join("appliance_working_spaces.json"), spaces)?;

    info!("{} / {}: outputs saved to {}", outcome.house, outcome.tariff, dir.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::models::{ScheduleStatus, Shiftability};

    fn label(name: &str) -> ApplianceLabel {
        ApplianceLabel {
            id: "Appliance1".into(),
            name: name.into(),
            shiftability: Shiftability::Shiftable,
            pmin_w: None,
            tmin_min: None,
        }
    }

    fn sample_event() -> Event {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(22, 10, 0).unwrap();
        Event {
            event_id: "washing_machine_2024-03-01_01".into(),
            appliance: 0,
            appliance_name: "Washing Machine".into(),
            shiftability: Shiftability::Shiftable,
            start_time: start,
            end_time: start + chrono::Duration::minutes(90),
            duration_min: 90,
            energy_wmin: 180_000.0,
            col: 0,
            row: 1330,
            is_reschedulable: true,
            primary_price_level: Some(1),
        }
    }

    #[test]
    fn test_events_csv_shape() {
        let mut buffer: Vec<u8> = Vec::new();
        write_events_csv(&mut buffer, &[sample_event()], &[label("Washing Machine")]).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "event_id,appliance_id,appliance_name,shiftability,start_time,end_time,duration_min,energy_W,is_reschedulable"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("washing_machine_2024-03-01_01,Appliance1,Washing Machine,Shiftable,2024-03-01 22:10:00,2024-03-01 23:40:00,90,180000.0,true"));
    }

    #[test]
    fn test_cost_split_by_migration() {
        let costs = vec![
            EventCost {
                event_idx: 0,
                event_id: "a".into(),
                appliance_name: "Washing Machine".into(),
                status: Some(ScheduleStatus::Success),
                migrated: true,
                orig_total_cost: 0.9,
                sched_total_cost: 0.45,
            },
            EventCost {
                event_idx: 1,
                event_id: "b".into(),
                appliance_name: "Fridge".into(),
                status: None,
                migrated: false,
                orig_total_cost: 0.2,
                sched_total_cost: 0.2,
            },
        ];

        let mut migrated: Vec<u8> = Vec::new();
        write_cost_csv(&mut migrated, &costs, true).unwrap();
        let text = String::from_utf8(migrated).unwrap();
        assert!(text.contains("a,Washing Machine,SUCCESS,0.900000,0.450000"));
        assert!(!text.contains("\nb,"));

        let mut rest: Vec<u8> = Vec::new();
        write_cost_csv(&mut rest, &costs, false).unwrap();
        let text = String::from_utf8(rest).unwrap();
        assert!(text.contains("b,Fridge,,0.200000,0.200000"));
    }

    #[test]
    fn test_scheduled_csv_failure_row() {
        let event = sample_event();
        let decision = ScheduleDecision {
            event_idx: 0,
            event_id: event.event_id.clone(),
            appliance: 0,
            appliance_name: event.appliance_name.clone(),
            original_start: event.start_time,
            original_end: event.end_time,
            original_level: 1,
            scheduled_start: event.start_time,
            scheduled_end: event.end_time,
            scheduled_level: 1,
            status: ScheduleStatus::Failed,
            failure_reason: Some(crate::models::FailureReason::DeadlineUnreachable),
            shift_minutes: 0,
            optimization_score: 0.0,
            season: None,
        };

        let mut buffer: Vec<u8> = Vec::new();
        write_scheduled_csv(&mut buffer, &[decision]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("FAILED,DeadlineUnreachable,"));
    }

    #[test]
    fn test_minutes_to_hhmm_48h() {
        assert_eq!(minutes_to_hhmm(2280), "38:00");
        assert_eq!(minutes_to_hhmm(30), "00:30");
    }
}
