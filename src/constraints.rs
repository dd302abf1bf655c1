use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use serde::Deserialize;
use crate::errors::InputError;
use crate::intervals::{self, Interval};
use crate::models::ShiftRule;
use crate::tariff::{parse_hhmm, MINUTES_PER_DAY};

/// Deadlines may reach into the next day, up to 48:00
pub const HORIZON_MAX: u32 = 2 * MINUTES_PER_DAY;

/// Behavioral constraints of one appliance
#[derive(Clone, Debug)]
pub struct ApplianceConstraint {
    /// Raw daily forbidden windows in minutes of day, end <= start wraps midnight
    pub forbidden_time: Vec<(u32, u32)>,
    /// Minutes from midnight of the event day by which the event must finish
    pub latest_finish: u32,
    pub shift_rule: ShiftRule,
    pub min_duration: u32,
}

impl Default for ApplianceConstraint {
    fn default() -> ApplianceConstraint {
        ApplianceConstraint {
            forbidden_time: Vec::new(),
            latest_finish: MINUTES_PER_DAY,
            shift_rule: ShiftRule::OnlyDelay,
            min_duration: 0,
        }
    }
}

impl ApplianceConstraint {
    /// Materializes the forbidden windows over the 48h horizon.
    ///
    /// Wrapping windows split at midnight; when the deadline reaches past
    /// 24:00 every window is replicated on the second day and clipped to the
    /// deadline. The result is sorted, disjoint and within `[0, latest_finish)`.
    pub fn forbidden_intervals_in_48h(&self) -> Vec<Interval> {
        let mut pieces: Vec<Interval> = Vec::new();

        for &(start, end) in self.forbidden_time.iter() {
            if end <= start {
                pieces.push((start, MINUTES_PER_DAY));
                if self.latest_finish > MINUTES_PER_DAY && end > 0 {
                    pieces.push((MINUTES_PER_DAY, MINUTES_PER_DAY + end));
                }
            } else {
                pieces.push((start, end));
                if self.latest_finish > MINUTES_PER_DAY {
                    pieces.push((
                        MINUTES_PER_DAY + start,
                        (MINUTES_PER_DAY + end).min(self.latest_finish),
                    ));
                }
            }
        }

        intervals::clip(&intervals::merge(&pieces), self.latest_finish)
    }
}

#[derive(Deserialize, Debug)]
struct RawConstraint {
    forbidden_time: Option<Vec<[String; 2]>>,
    latest_finish: Option<String>,
    shift_rule: Option<ShiftRule>,
    min_duration: Option<u32>,
}

/// Per-house constraint records keyed by appliance name
#[derive(Debug, Default)]
pub struct ConstraintBook {
    constraints: BTreeMap<String, ApplianceConstraint>,
}

impl ConstraintBook {
    /// Loads a per-house constraint JSON file
    ///
    /// # Arguments
    ///
    /// * 'path' - path to the constraint file
    pub fn load(path: &str) -> Result<ConstraintBook, InputError> {
        if !Path::new(path).exists() {
            return Err(InputError::MissingInput(path.to_string()));
        }
        let json = fs::read_to_string(path)?;
        ConstraintBook::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<ConstraintBook, InputError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        // Some constraint files nest the records under an
        // appliance_constraints field.
        let body = value
            .get("appliance_constraints")
            .cloned()
            .unwrap_or(value);

        let raw: BTreeMap<String, RawConstraint> = serde_json::from_value(body)?;
        let mut constraints: BTreeMap<String, ApplianceConstraint> = BTreeMap::new();

        for (name, r) in raw {
            let constraint = build_constraint(&name, r)?;
            constraints.insert(name, constraint);
        }

        Ok(ConstraintBook { constraints })
    }

    pub fn insert(&mut self, name: &str, constraint: ApplianceConstraint) {
        self.constraints.insert(name.to_string(), constraint);
    }

    pub fn get(&self, name: &str) -> Option<&ApplianceConstraint> {
        self.constraints.get(name)
    }

    /// Keys in sorted order, the order name resolution ties break on
    pub fn keys(&self) -> Vec<&str> {
        self.constraints.keys().map(|k| k.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Validates one raw constraint record
///
/// # Arguments
///
/// * 'name' - appliance key the record is stored under
/// * 'raw' - deserialized record body
fn build_constraint(name: &str, raw: RawConstraint) -> Result<ApplianceConstraint, InputError> {
    let mut constraint = ApplianceConstraint::default();

    if let Some(finish) = raw.latest_finish {
        constraint.latest_finish = parse_hhmm(&finish, HORIZON_MAX)
            .map_err(|e| InputError::BadTime(format!("{}: {}", name, e)))?;
    }
    if let Some(windows) = raw.forbidden_time {
        for [start, end] in windows {
            let s = parse_hhmm(&start, MINUTES_PER_DAY)
                .map_err(|e| InputError::BadTime(format!("{}: {}", name, e)))?;
            let e = parse_hhmm(&end, MINUTES_PER_DAY)
                .map_err(|e| InputError::BadTime(format!("{}: {}", name, e)))?;
            constraint.forbidden_time.push((s, e));
        }
    }
    if let Some(rule) = raw.shift_rule {
        constraint.shift_rule = rule;
    }
    if let Some(min_duration) = raw.min_duration {
        constraint.min_duration = min_duration;
    }

    Ok(constraint)
}
