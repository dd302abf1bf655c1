use std::fs::File;
use std::io;
use std::path::Path;
use chrono::NaiveDateTime;
use log::warn;
use serde::Deserialize;
use crate::errors::InputError;
use crate::models::{ApplianceLabel, Shiftability};

/// Per-minute multi-appliance power readings, column-major
#[derive(Debug)]
pub struct PowerMatrix {
    pub timestamps: Vec<NaiveDateTime>,
    /// One label per power column, resolved against the label CSV
    pub labels: Vec<ApplianceLabel>,
    /// Watts per minute, one vector per appliance column
    pub columns: Vec<Vec<f64>>,
    pub skipped_rows: usize,
}

impl PowerMatrix {
    pub fn rows(&self) -> usize {
        self.timestamps.len()
    }

    /// Power samples of one event run
    ///
    /// # Arguments
    ///
    /// * 'col' - appliance column
    /// * 'row' - first minute row of the run
    /// * 'duration' - run length in minutes
    pub fn profile(&self, col: usize, row: usize, duration: u32) -> &[f64] {
        &self.columns[col][row..row + duration as usize]
    }
}

#[derive(Deserialize, Debug)]
struct RawLabel {
    #[serde(rename = "ApplianceID")]
    id: String,
    #[serde(rename = "ApplianceName")]
    name: String,
    #[serde(rename = "Shiftability")]
    shiftability: String,
    #[serde(rename = "Pmin", default)]
    pmin: Option<f64>,
    #[serde(rename = "Tmin", default)]
    tmin: Option<u32>,
}

/// Reads the appliance label CSV
pub fn read_labels<R: io::Read>(reader: R) -> Result<Vec<ApplianceLabel>, InputError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut labels: Vec<ApplianceLabel> = Vec::new();

    for record in csv_reader.deserialize() {
        let raw: RawLabel = record?;
        let shiftability = match raw.shiftability.as_str() {
            "Base" => Shiftability::Base,
            "Shiftable" => Shiftability::Shiftable,
            "NonShiftable" => Shiftability::NonShiftable,
            other => {
                return Err(InputError::BadHeader(format!(
                    "unknown shiftability {} for {}",
                    other, raw.name
                )));
            }
        };
        labels.push(ApplianceLabel {
            id: raw.id,
            name: raw.name,
            shiftability,
            pmin_w: raw.pmin,
            tmin_min: raw.tmin,
        });
    }

    Ok(labels)
}

/// Loads the appliance label CSV from disk
///
/// # Arguments
///
/// * 'path' - path to the label file
pub fn load_labels(path: &str) -> Result<Vec<ApplianceLabel>, InputError> {
    if !Path::new(path).exists() {
        return Err(InputError::MissingInput(path.to_string()));
    }
    read_labels(File::open(path)?)
}

/// Reads the per-minute power CSV into a column-major matrix.
///
/// The first column must be `Time`; every other column is matched against the
/// labels by appliance id first, then by display name. Unmatched columns keep
/// their header as display name and are treated as non-shiftable. Missing
/// cells read as 0 W; rows with a malformed timestamp or a non-numeric power
/// cell are skipped and counted.
///
/// # Arguments
///
/// * 'reader' - CSV byte source
/// * 'labels' - appliance labels of the house
pub fn read_power_matrix<R: io::Read>(
    reader: R,
    labels: &[ApplianceLabel],
) -> Result<PowerMatrix, InputError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut iter = headers.iter();
    match iter.next() {
        Some("Time") => {}
        other => {
            return Err(InputError::BadHeader(format!(
                "first power column must be Time, got {:?}",
                other
            )));
        }
    }

    let column_labels: Vec<ApplianceLabel> = iter
        .map(|header| resolve_column_label(header, labels))
        .collect();
    if column_labels.is_empty() {
        return Err(InputError::BadHeader("power file has no appliance columns".into()));
    }

    let mut timestamps: Vec<NaiveDateTime> = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); column_labels.len()];
    let mut skipped_rows = 0usize;

    for record in csv_reader.records() {
        let record = record?;
        let Some(time_text) = record.get(0) else {
            skipped_rows += 1;
            continue;
        };
        let Some(timestamp) = parse_timestamp(time_text) else {
            skipped_rows += 1;
            continue;
        };
        // Rows must be strictly minute-increasing; anything else is a
        // malformed row, not a fatal error.
        if timestamps.last().is_some_and(|last| *last >= timestamp) {
            skipped_rows += 1;
            continue;
        }

        let mut watts: Vec<f64> = Vec::with_capacity(column_labels.len());
        let mut malformed = false;
        for col in 0..column_labels.len() {
            match record.get(col + 1) {
                None | Some("") => watts.push(0.0),
                Some(cell) => match cell.parse::<f64>() {
                    Ok(value) => watts.push(value),
                    Err(_) => {
                        malformed = true;
                        break;
                    }
                },
            }
        }
        if malformed {
            skipped_rows += 1;
            continue;
        }

        timestamps.push(timestamp);
        for (col, value) in watts.into_iter().enumerate() {
            columns[col].push(value);
        }
    }

    if skipped_rows > 0 {
        warn!("power matrix: skipped {} malformed rows", skipped_rows);
    }

    Ok(PowerMatrix {
        timestamps,
        labels: column_labels,
        columns,
        skipped_rows,
    })
}

/// Loads the power CSV from disk
///
/// # Arguments
///
/// * 'path' - path to the power file
/// * 'labels' - appliance labels of the house
pub fn load_power_matrix(path: &str, labels: &[ApplianceLabel]) -> Result<PowerMatrix, InputError> {
    if !Path::new(path).exists() {
        return Err(InputError::MissingInput(path.to_string()));
    }
    read_power_matrix(File::open(path)?, labels)
}

/// Matches one power column header to its label, id first then display name
fn resolve_column_label(header: &str, labels: &[ApplianceLabel]) -> ApplianceLabel {
    if let Some(label) = labels.iter().find(|l| l.id == header) {
        return label.clone();
    }
    if let Some(label) = labels.iter().find(|l| l.name == header) {
        return label.clone();
    }

    warn!("power column {} has no appliance label, treating as non-shiftable", header);
    ApplianceLabel {
        id: header.to_string(),
        name: header.to_string(),
        shiftability: Shiftability::NonShiftable,
        pmin_w: None,
        tmin_min: None,
    }
}

/// Parses a power timestamp, accepting the formats seen in exported data
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS_CSV: &str = "\
ApplianceID,ApplianceName,Shiftability,Pmin,Tmin
Appliance1,Washing Machine,Shiftable,10,5
Appliance2,Fridge,Base,5,10
Appliance3,Television,NonShiftable,,
";

    fn labels() -> Vec<ApplianceLabel> {
        read_labels(LABELS_CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_read_labels() {
        let labels = labels();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].name, "Washing Machine");
        assert_eq!(labels[0].shiftability, Shiftability::Shiftable);
        assert_eq!(labels[0].pmin_w, Some(10.0));
        assert_eq!(labels[1].tmin_min, Some(10));
        assert_eq!(labels[2].pmin_w, None);
    }

    #[test]
    fn test_read_power_matrix_by_id_header() {
        let csv = "\
Time,Appliance1,Appliance2
2024-03-01 00:00:00,0,62
2024-03-01 00:01:00,1500,61
2024-03-01 00:02:00,1480,
";
        let matrix = read_power_matrix(csv.as_bytes(), &labels()).unwrap();
        assert_eq!(matrix.rows(), 3);
        assert_eq!(matrix.labels[0].name, "Washing Machine");
        assert_eq!(matrix.columns[0], vec![0.0, 1500.0, 1480.0]);
        // Missing cell reads as 0 W
        assert_eq!(matrix.columns[1], vec![62.0, 61.0, 0.0]);
        assert_eq!(matrix.skipped_rows, 0);
    }

    #[test]
    fn test_malformed_rows_skipped_and_counted() {
        let csv = "\
Time,Appliance1
2024-03-01 00:00:00,100
2024-03-01 00:01:00,100
not-a-time,50
2024-03-01 00:03:00,broken
2024-03-01 00:01:00,70
2024-03-01 00:04:00,90
";
        let matrix = read_power_matrix(csv.as_bytes(), &labels()).unwrap();
        // bad timestamp, non-numeric power and non-increasing row all skip
        assert_eq!(matrix.rows(), 3);
        assert_eq!(matrix.skipped_rows, 3);
        assert_eq!(matrix.columns[0], vec![100.0, 100.0, 90.0]);
    }

    #[test]
    fn test_unknown_column_defaults_to_non_shiftable() {
        let csv = "Time,Mystery Box\n2024-03-01 00:00:00,5\n";
        let matrix = read_power_matrix(csv.as_bytes(), &labels()).unwrap();
        assert_eq!(matrix.labels[0].shiftability, Shiftability::NonShiftable);
        assert_eq!(matrix.labels[0].name, "Mystery Box");
    }

    #[test]
    fn test_missing_time_header_rejected() {
        let csv = "Date,Appliance1\n2024-03-01 00:00:00,5\n";
        assert!(read_power_matrix(csv.as_bytes(), &labels()).is_err());
    }

    #[test]
    fn test_profile_slice() {
        let csv = "\
Time,Appliance1
2024-03-01 00:00:00,0
2024-03-01 00:01:00,10
2024-03-01 00:02:00,20
2024-03-01 00:03:00,30
";
        let matrix = read_power_matrix(csv.as_bytes(), &labels()).unwrap();
        assert_eq!(matrix.profile(0, 1, 2), &[10.0, 20.0]);
    }
}
