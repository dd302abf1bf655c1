use std::collections::BTreeMap;
use crate::constraints::ApplianceConstraint;
use crate::errors::PipelineError;
use crate::intervals::{self, Interval};
use crate::tariff::{Season, Tariff, MINUTES_PER_DAY};

/// Quantum of all internal time probing; schedulers only propose starts
/// stepped inside a probe of an available interval
pub const PROBE_STEP: u32 = 15;

/// The minute-indexed legal domain of one appliance under one tariff,
/// partitioned by price level over a horizon of at most 48 hours.
#[derive(Debug, Clone)]
pub struct WorkingSpace {
    pub horizon: u32,
    pub forbidden_intervals: Vec<Interval>,
    pub available_intervals: Vec<Interval>,
    pub price_level_intervals: BTreeMap<u8, Vec<Interval>>,
}

impl WorkingSpace {
    /// Builds and validates the working space
    ///
    /// # Arguments
    ///
    /// * 'constraint' - the appliance constraint record
    /// * 'tariff' - tariff scheme to partition against
    /// * 'season' - season variant for seasonal schemes
    pub fn build(
        constraint: &ApplianceConstraint,
        tariff: &Tariff,
        season: Option<Season>,
    ) -> Result<WorkingSpace, PipelineError> {
        let horizon = constraint.latest_finish;
        let forbidden_intervals = constraint.forbidden_intervals_in_48h();
        let available_intervals = intervals::subtract(&[(0, horizon)], &forbidden_intervals);

        let mut price_level_intervals: BTreeMap<u8, Vec<Interval>> = BTreeMap::new();
        for &(start, end) in available_intervals.iter() {
            // Walk the run in probe steps; each maximal constant-level
            // stretch becomes one interval of its level.
            let mut probe = start;
            while probe < end {
                let level = tariff.level_at(probe % MINUTES_PER_DAY, season);
                let run_start = probe;
                while probe < end && tariff.level_at(probe % MINUTES_PER_DAY, season) == level {
                    probe += PROBE_STEP;
                }
                let run_end = probe.min(end);

                let list = price_level_intervals.entry(level).or_default();
                match list.last_mut() {
                    Some(last) if last.1 == run_start => last.1 = run_end,
                    _ => list.push((run_start, run_end)),
                }
            }
        }

        let space = WorkingSpace {
            horizon,
            forbidden_intervals,
            available_intervals,
            price_level_intervals,
        };
        space.validate().map_err(PipelineError::InvariantViolation)?;

        Ok(space)
    }

    /// True when no minute of the horizon is legal
    pub fn is_empty(&self) -> bool {
        self.available_intervals.is_empty()
    }

    /// Price level of a legal minute, None outside every level interval
    pub fn level_at(&self, minute: u32) -> Option<u8> {
        for (level, list) in self.price_level_intervals.iter() {
            let idx = list.partition_point(|(s, _)| *s <= minute);
            if idx > 0 && minute < list[idx - 1].1 {
                return Some(*level);
            }
        }
        None
    }

    /// Checks the partition invariants; any violation is fatal for the pipeline
    fn validate(&self) -> Result<(), String> {
        let mut all: Vec<Interval> = Vec::new();

        for (level, list) in self.price_level_intervals.iter() {
            for pair in list.windows(2) {
                if pair[0].1 > pair[1].0 {
                    return Err(format!("level {} intervals overlap or are unsorted", level));
                }
            }
            for &(s, e) in list {
                if s >= e || e > self.horizon {
                    return Err(format!("level {} interval ({}, {}) out of bounds", level, s, e));
                }
            }
            all.extend_from_slice(list);
        }
        all.extend_from_slice(&self.forbidden_intervals);

        let covered = intervals::merge(&all);
        if intervals::covered_minutes(&covered) != self.horizon
            || covered != vec![(0, self.horizon)]
        {
            return Err(format!(
                "level and forbidden intervals do not partition [0, {})",
                self.horizon
            ));
        }

        Ok(())
    }
}
