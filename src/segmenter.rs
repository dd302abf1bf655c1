use std::collections::HashMap;
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use crate::models::{Event, Shiftability};
use crate::power_data::PowerMatrix;

/// On-thresholds used when the appliance label does not override them
#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(default)]
pub struct SegmentationParams {
    pub pmin_w: f64,
    pub tmin_min: u32,
    pub base_pmin_w: f64,
    pub base_tmin_min: u32,
}

impl Default for SegmentationParams {
    fn default() -> SegmentationParams {
        SegmentationParams {
            pmin_w: 10.0,
            tmin_min: 5,
            base_pmin_w: 5.0,
            base_tmin_min: 10,
        }
    }
}

/// Segments the power matrix into events.
///
/// An event is a maximal run of minutes with power strictly above the
/// appliance's on-threshold, at least its minimum length. Runs are broken at
/// gaps in the minute grid so a skipped input row never merges two
/// operations. Events come out in ascending time per appliance.
///
/// # Arguments
///
/// * 'matrix' - per-minute power matrix
/// * 'params' - default thresholds per appliance class
pub fn segment_events(matrix: &PowerMatrix, params: &SegmentationParams) -> Vec<Event> {
    let mut events: Vec<Event> = Vec::new();
    let mut day_ordinals: HashMap<(usize, NaiveDate), u32> = HashMap::new();

    for (col, label) in matrix.labels.iter().enumerate() {
        let (default_pmin, default_tmin) = match label.shiftability {
            Shiftability::Base => (params.base_pmin_w, params.base_tmin_min),
            _ => (params.pmin_w, params.tmin_min),
        };
        let pmin = label.pmin_w.unwrap_or(default_pmin);
        let tmin = label.tmin_min.unwrap_or(default_tmin);

        let column = &matrix.columns[col];
        let mut row = 0usize;

        while row < column.len() {
            if column[row] <= pmin {
                row += 1;
                continue;
            }

            let mut end = row + 1;
            while end < column.len()
                && column[end] > pmin
                && matrix.timestamps[end] - matrix.timestamps[end - 1] == Duration::minutes(1)
            {
                end += 1;
            }

            let duration = (end - row) as u32;
            if duration >= tmin {
                let start_time = matrix.timestamps[row];
                let date = start_time.date();
                let ordinal = day_ordinals.entry((col, date)).or_insert(0);
                *ordinal += 1;

                events.push(Event {
                    event_id: format!(
                        "{}_{}_{:02}",
                        sanitize_name(&label.name),
                        date.format("%Y-%m-%d"),
                        ordinal
                    ),
                    appliance: col,
                    appliance_name: label.name.clone(),
                    shiftability: label.shiftability,
                    start_time,
                    end_time: start_time + Duration::minutes(duration as i64),
                    duration_min: duration,
                    energy_wmin: column[row..end].iter().sum(),
                    col,
                    row,
                    is_reschedulable: label.shiftability == Shiftability::Shiftable,
                    primary_price_level: None,
                });
            }

            row = end;
        }
    }

    events
}

/// Lowercases a display name into an id-safe token
fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
