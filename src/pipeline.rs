use std::collections::{BTreeMap, HashMap, HashSet};
use chrono::Datelike;
use log::info;
use crate::appliance_index::ApplianceIndex;
use crate::collision;
use crate::constraints::ConstraintBook;
use crate::cost;
use crate::errors::PipelineError;
use crate::filter;
use crate::models::{abs_minute, Event, EventCost, ScheduleDecision, ScheduleStatus};
use crate::power_data::PowerMatrix;
use crate::scheduler;
use crate::segmenter::{self, SegmentationParams};
use crate::tariff::{Season, Tariff};
use crate::workspace::WorkingSpace;

/// Exit status of one (house, tariff) run
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PipelineStatus {
    /// At least one event was scheduled
    Success,
    /// Nothing to do: the filters left no reschedulable events
    NoReschedulableEvents,
    Failed(String),
}

/// Borrowed inputs of one house; the pipeline never touches the filesystem
pub struct HouseInputs<'a> {
    pub house: &'a str,
    pub matrix: &'a PowerMatrix,
    pub constraints: &'a ConstraintBook,
    pub segmentation: &'a SegmentationParams,
}

/// Everything one (house, tariff) run produces
pub struct PipelineOutcome {
    pub house: String,
    pub tariff: String,
    pub events: Vec<Event>,
    pub decisions: Vec<ScheduleDecision>,
    pub costs: Vec<EventCost>,
    pub spaces: HashMap<(usize, Option<Season>), WorkingSpace>,
    pub status: PipelineStatus,
    pub scheduled_count: usize,
    pub failed_count: usize,
}

impl PipelineOutcome {
    /// Failure reasons of the run, tallied for reporting
    pub fn failure_tally(&self) -> BTreeMap<String, usize> {
        let mut tally: BTreeMap<String, usize> = BTreeMap::new();
        for decision in self.decisions.iter() {
            if let Some(reason) = decision.failure_reason {
                *tally.entry(reason.to_string()).or_default() += 1;
            }
        }
        tally
    }
}

/// Runs the full pipeline for one house under one tariff.
///
/// Segmentation, the two reschedulability filters, working-space
/// construction, per-event scheduling, collision resolution and cost
/// accounting, in that order. The run is single-threaded and deterministic;
/// the only fatal outcomes are invariant violations, everything else is a
/// per-event value in the decision table.
///
/// # Arguments
///
/// * 'inputs' - the house inputs
/// * 'tariff' - target tariff scheme
pub fn process_house(
    inputs: &HouseInputs,
    tariff: &Tariff,
) -> Result<PipelineOutcome, PipelineError> {
    let index = ApplianceIndex::build(&inputs.matrix.labels, inputs.constraints);

    let mut events = segmenter::segment_events(inputs.matrix, inputs.segmentation);
    info!("{} / {}: segmented {} events", inputs.house, tariff.name, events.len());

    let pass_a = filter::apply_min_duration_filter(&mut events, &index, inputs.constraints);
    let pass_b = filter::apply_tou_filter(&mut events, tariff);
    let reschedulable = events.iter().filter(|e| e.is_reschedulable).count();
    info!(
        "{} / {}: {} reschedulable after filtering ({} below min duration, {} without savings potential)",
        inputs.house, tariff.name, reschedulable, pass_a, pass_b
    );

    let spaces = build_spaces(&events, &index, inputs.constraints, tariff)?;

    let (mut decisions, _taken) =
        scheduler::schedule_events(&events, &index, inputs.constraints, &spaces, tariff);

    let (resolved, downgraded) =
        collision::resolve_collisions(&events, &mut decisions, &index, inputs.constraints, &spaces);
    if resolved + downgraded > 0 {
        info!(
            "{} / {}: collision pass re-solved {} and reverted {} events",
            inputs.house, tariff.name, resolved, downgraded
        );
    }
    verify_schedule_disjoint(&decisions)?;

    let costs = cost::event_costs(&events, &decisions, inputs.matrix, tariff);

    let scheduled_count = decisions
        .iter()
        .filter(|d| d.status == ScheduleStatus::Success)
        .count();
    let failed_count = decisions.len() - scheduled_count;

    let status = if scheduled_count > 0 {
        PipelineStatus::Success
    } else if decisions.is_empty() {
        PipelineStatus::NoReschedulableEvents
    } else {
        PipelineStatus::Failed("no reschedulable event could be scheduled".into())
    };

    let (orig_total, sched_total) = cost::totals(&costs);
    info!(
        "{} / {}: scheduled {}/{} events, cost {:.4} -> {:.4}",
        inputs.house,
        tariff.name,
        scheduled_count,
        decisions.len(),
        orig_total,
        sched_total
    );

    Ok(PipelineOutcome {
        house: inputs.house.to_string(),
        tariff: tariff.name.clone(),
        events,
        decisions,
        costs,
        spaces,
        status,
        scheduled_count,
        failed_count,
    })
}

/// Builds the working spaces needed by the reschedulable events
fn build_spaces(
    events: &[Event],
    index: &ApplianceIndex,
    constraints: &ConstraintBook,
    tariff: &Tariff,
) -> Result<HashMap<(usize, Option<Season>), WorkingSpace>, PipelineError> {
    let mut wanted: HashSet<(usize, Option<Season>)> = HashSet::new();
    for event in events.iter().filter(|e| e.is_reschedulable) {
        wanted.insert((event.appliance, tariff.season_for_month(event.start_time.month())));
    }

    let mut spaces: HashMap<(usize, Option<Season>), WorkingSpace> = HashMap::new();
    for (appliance, season) in wanted {
        let Some(constraint) = index.constraint(appliance, constraints) else {
            continue;
        };
        spaces.insert(
            (appliance, season),
            WorkingSpace::build(constraint, tariff, season)?,
        );
    }

    Ok(spaces)
}

/// Post-resolution invariant: per-appliance scheduled ranges are disjoint
fn verify_schedule_disjoint(decisions: &[ScheduleDecision]) -> Result<(), PipelineError> {
    let mut by_appliance: HashMap<usize, Vec<(i64, i64)>> = HashMap::new();
    for decision in decisions.iter().filter(|d| d.status == ScheduleStatus::Success) {
        by_appliance.entry(decision.appliance).or_default().push((
            abs_minute(decision.scheduled_start),
            abs_minute(decision.scheduled_end),
        ));
    }

    for (appliance, mut ranges) in by_appliance {
        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            if pair[1].0 < pair[0].1 {
                return Err(PipelineError::InvariantViolation(format!(
                    "appliance {} has overlapping scheduled events after resolution",
                    appliance
                )));
            }
        }
    }

    Ok(())
}
