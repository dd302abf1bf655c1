use std::collections::HashMap;
use log::warn;
use crate::appliance_index::ApplianceIndex;
use crate::constraints::ConstraintBook;
use crate::models::{abs_minute, Event, FailureReason, ScheduleDecision, ScheduleStatus};
use crate::scheduler;
use crate::tariff::Season;
use crate::workspace::WorkingSpace;

/// Reconciles residual overlaps across scheduled events.
///
/// Same-appliance overlaps cannot come out of the scheduler's own run, but
/// the relaxed tail rule or an upstream defect may leave some; this pass is
/// the safety net. Each appliance's successful placements are replayed in
/// original start order: the first event of an overlap group keeps its slot,
/// every trailing event is re-solved with the earlier intervals marked as
/// taken. An event that still cannot be placed is downgraded to FAILED with
/// CollisionUnresolved and reverts to its original times.
///
/// Returns (re-solved, downgraded) counts.
///
/// # Arguments
///
/// * 'events' - the full event table
/// * 'decisions' - schedule decisions, edited in place
/// * 'index' - appliance index of the house
/// * 'constraints' - the house constraint book
/// * 'spaces' - working spaces keyed by (appliance, season)
pub fn resolve_collisions(
    events: &[Event],
    decisions: &mut [ScheduleDecision],
    index: &ApplianceIndex,
    constraints: &ConstraintBook,
    spaces: &HashMap<(usize, Option<Season>), WorkingSpace>,
) -> (usize, usize) {
    let mut by_appliance: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, decision) in decisions.iter().enumerate() {
        if decision.status == ScheduleStatus::Success {
            by_appliance.entry(decision.appliance).or_default().push(i);
        }
    }

    let mut resolved = 0usize;
    let mut downgraded = 0usize;

    for (_, mut group) in by_appliance {
        group.sort_by_key(|&i| decisions[i].original_start);

        let mut fixed: Vec<(i64, i64)> = Vec::new();
        for decision_idx in group {
            let (abs_start, abs_end) = (
                abs_minute(decisions[decision_idx].scheduled_start),
                abs_minute(decisions[decision_idx].scheduled_end),
            );

            if !fixed.iter().any(|&(s, e)| abs_start < e && s < abs_end) {
                fixed.push((abs_start, abs_end));
                fixed.sort_unstable();
                continue;
            }

            // Trailing member of an overlap group: re-solve against the
            // intervals already pinned down.
            let event = &events[decisions[decision_idx].event_idx];
            let season = decisions[decision_idx].season;
            let replacement = match (
                index.constraint(event.appliance, constraints),
                spaces.get(&(event.appliance, season)),
            ) {
                (Some(constraint), Some(space)) => Some(scheduler::schedule_event(
                    event,
                    decisions[decision_idx].event_idx,
                    constraint,
                    space,
                    &fixed,
                    season,
                )),
                _ => None,
            };

            match replacement {
                Some(new_decision) if new_decision.status == ScheduleStatus::Success => {
                    fixed.push((
                        abs_minute(new_decision.scheduled_start),
                        abs_minute(new_decision.scheduled_end),
                    ));
                    fixed.sort_unstable();
                    decisions[decision_idx] = new_decision;
                    resolved += 1;
                }
                _ => {
                    warn!(
                        "collision on {} could not be re-solved, reverting to original placement",
                        decisions[decision_idx].event_id
                    );
                    let decision = &mut decisions[decision_idx];
                    decision.status = ScheduleStatus::Failed;
                    decision.failure_reason = Some(FailureReason::CollisionUnresolved);
                    decision.scheduled_start = decision.original_start;
                    decision.scheduled_end = decision.original_end;
                    decision.scheduled_level = decision.original_level;
                    decision.shift_minutes = 0;
                    decision.optimization_score = 0.0;
                    downgraded += 1;
                }
            }
        }
    }

    (resolved, downgraded)
}
