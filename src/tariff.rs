use std::collections::BTreeMap;
use std::fs;
use serde::{Deserialize, Serialize};
use crate::errors::ConfigError;

pub const MINUTES_PER_DAY: u32 = 1440;

/// Season variant of a seasonal tariff scheme
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Summer,
    Winter,
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Season::Summer => write!(f, "summer"),
            Season::Winter => write!(f, "winter"),
        }
    }
}

/// Non-wrapping rate period inside one day, half-open minutes
#[derive(Clone, Debug)]
struct PeriodSpan {
    start: u32,
    end: u32,
    rate: f64,
}

/// Rates of one (possibly season-specific) scheme variant over the 24h day
#[derive(Clone, Debug)]
pub struct RateTable {
    spans: Vec<PeriodSpan>,
    default_rate: f64,
    distinct: Vec<f64>,
}

impl RateTable {
    /// Builds a table from ordered `[start, end)` periods.
    /// Wrap-around periods (end <= start) are split at midnight before lookup.
    fn from_periods(periods: &[RawPeriod]) -> Result<RateTable, ConfigError> {
        if periods.is_empty() {
            return Err(ConfigError::TariffError("scheme has no rate periods".into()));
        }

        let mut spans: Vec<PeriodSpan> = Vec::new();
        for p in periods {
            let start = parse_hhmm(&p.start, MINUTES_PER_DAY)
                .map_err(ConfigError::TariffError)?;
            let end = parse_hhmm(&p.end, MINUTES_PER_DAY)
                .map_err(ConfigError::TariffError)?;

            if end <= start {
                spans.push(PeriodSpan { start, end: MINUTES_PER_DAY, rate: p.rate });
                if end > 0 {
                    spans.push(PeriodSpan { start: 0, end, rate: p.rate });
                }
            } else {
                spans.push(PeriodSpan { start, end, rate: p.rate });
            }
        }
        spans.sort_by_key(|s| s.start);

        let mut distinct: Vec<f64> = periods.iter().map(|p| p.rate).collect();
        distinct.sort_by(|a, b| a.partial_cmp(b).unwrap());
        distinct.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

        Ok(RateTable {
            default_rate: periods[0].rate,
            spans,
            distinct,
        })
    }

    fn flat(rate: f64) -> RateTable {
        RateTable {
            spans: vec![PeriodSpan { start: 0, end: MINUTES_PER_DAY, rate }],
            default_rate: rate,
            distinct: vec![rate],
        }
    }

    /// Rate at a minute of day, binary search over sorted span starts
    fn rate_at(&self, minute_of_day: u32) -> f64 {
        let m = minute_of_day % MINUTES_PER_DAY;
        let idx = self.spans.partition_point(|s| s.start <= m);
        if idx > 0 {
            let span = &self.spans[idx - 1];
            if m < span.end {
                return span.rate;
            }
        }
        self.default_rate
    }

    /// Level is the index of the minute's rate in the sorted distinct rate list
    fn level_at(&self, minute_of_day: u32) -> u8 {
        let rate = self.rate_at(minute_of_day);
        match self.distinct.iter().position(|r| (r - rate).abs() < 1e-9) {
            Some(level) => level as u8,
            None => {
                // A rate outside the configured set maps to the first level at
                // or above it.
                self.distinct
                    .iter()
                    .position(|r| rate <= *r)
                    .unwrap_or(self.distinct.len() - 1) as u8
            }
        }
    }
}

/// A named tariff scheme
#[derive(Clone, Debug)]
pub struct Tariff {
    pub name: String,
    scheme: Scheme,
}

#[derive(Clone, Debug)]
enum Scheme {
    Flat(RateTable),
    TimeBased(RateTable),
    Seasonal {
        summer: RateTable,
        winter: RateTable,
        summer_months: Vec<u32>,
    },
}

impl Tariff {
    pub fn is_seasonal(&self) -> bool {
        matches!(self.scheme, Scheme::Seasonal { .. })
    }

    /// Season an event month selects, None for non-seasonal schemes
    ///
    /// # Arguments
    ///
    /// * 'month' - calendar month 1-12
    pub fn season_for_month(&self, month: u32) -> Option<Season> {
        match &self.scheme {
            Scheme::Seasonal { summer_months, .. } => {
                if summer_months.contains(&month) {
                    Some(Season::Summer)
                } else {
                    Some(Season::Winter)
                }
            }
            _ => None,
        }
    }

    fn table(&self, season: Option<Season>) -> &RateTable {
        match &self.scheme {
            Scheme::Flat(t) | Scheme::TimeBased(t) => t,
            Scheme::Seasonal { summer, winter, .. } => match season {
                Some(Season::Winter) => winter,
                // A seasonal scheme queried without a season falls back to the
                // summer variant, which carries the wider rate spread.
                _ => summer,
            },
        }
    }

    /// Rate in currency per kWh at a minute of day
    pub fn rate_at(&self, minute_of_day: u32, season: Option<Season>) -> f64 {
        self.table(season).rate_at(minute_of_day)
    }

    /// Integer price level at a minute of day, 0 = cheapest.
    /// Seasonal schemes rank against the season's own rate set so levels stay
    /// intra-season comparable.
    pub fn level_at(&self, minute_of_day: u32, season: Option<Season>) -> u8 {
        self.table(season).level_at(minute_of_day)
    }

    /// Distinct rates sorted ascending
    pub fn distinct_rates(&self, season: Option<Season>) -> &[f64] {
        &self.table(season).distinct
    }

    pub fn level_count(&self, season: Option<Season>) -> usize {
        self.table(season).distinct.len()
    }
}

#[derive(Deserialize, Debug)]
struct RawPeriod {
    start: String,
    end: String,
    rate: f64,
}

#[derive(Deserialize, Debug)]
struct RawSeasonBlocks {
    time_blocks: Vec<RawPeriod>,
}

#[derive(Deserialize, Debug)]
struct RawScheme {
    #[serde(rename = "type")]
    kind: Option<String>,
    periods: Option<Vec<RawPeriod>>,
    rate: Option<f64>,
    seasonal_rates: Option<BTreeMap<String, RawSeasonBlocks>>,
    summer_months: Option<Vec<u32>>,
}

/// Summer is May through October unless the scheme overrides it
const DEFAULT_SUMMER_MONTHS: [u32; 6] = [5, 6, 7, 8, 9, 10];

/// All named tariff schemes of one run
#[derive(Debug)]
pub struct TariffBook {
    tariffs: BTreeMap<String, Tariff>,
}

impl TariffBook {
    /// Loads the tariff scheme configuration file
    ///
    /// # Arguments
    ///
    /// * 'path' - path to the tariff JSON
    pub fn load(path: &str) -> Result<TariffBook, ConfigError> {
        let json = fs::read_to_string(path)?;
        TariffBook::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<TariffBook, ConfigError> {
        let raw: BTreeMap<String, RawScheme> = serde_json::from_str(json)?;

        let mut tariffs: BTreeMap<String, Tariff> = BTreeMap::new();
        for (name, scheme) in raw {
            let tariff = build_tariff(&name, scheme)?;
            tariffs.insert(name, tariff);
        }

        Ok(TariffBook { tariffs })
    }

    pub fn get(&self, name: &str) -> Option<&Tariff> {
        self.tariffs.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tariffs.keys().map(|n| n.as_str()).collect()
    }
}

/// Validates one raw scheme into a Tariff
///
/// # Arguments
///
/// * 'name' - scheme name from the config
/// * 'raw' - deserialized scheme body
fn build_tariff(name: &str, raw: RawScheme) -> Result<Tariff, ConfigError> {
    if let Some(seasonal) = &raw.seasonal_rates {
        let summer = seasonal
            .get("summer")
            .ok_or_else(|| ConfigError::TariffError(format!("{}: missing summer rates", name)))?;
        let winter = seasonal
            .get("winter")
            .ok_or_else(|| ConfigError::TariffError(format!("{}: missing winter rates", name)))?;

        return Ok(Tariff {
            name: name.to_string(),
            scheme: Scheme::Seasonal {
                summer: RateTable::from_periods(&summer.time_blocks)?,
                winter: RateTable::from_periods(&winter.time_blocks)?,
                summer_months: raw
                    .summer_months
                    .unwrap_or_else(|| DEFAULT_SUMMER_MONTHS.to_vec()),
            },
        });
    }

    match raw.kind.as_deref() {
        Some("flat") => {
            let rate = raw
                .rate
                .ok_or_else(|| ConfigError::TariffError(format!("{}: flat scheme without rate", name)))?;
            Ok(Tariff {
                name: name.to_string(),
                scheme: Scheme::Flat(RateTable::flat(rate)),
            })
        }
        Some("time_based") => {
            let periods = raw
                .periods
                .ok_or_else(|| ConfigError::TariffError(format!("{}: time_based scheme without periods", name)))?;
            Ok(Tariff {
                name: name.to_string(),
                scheme: Scheme::TimeBased(RateTable::from_periods(&periods)?),
            })
        }
        other => Err(ConfigError::TariffError(format!(
            "{}: unsupported scheme type {:?}",
            name, other
        ))),
    }
}

/// Parses an "HH:MM" string into minutes, bounded by `max_minutes`
///
/// # Arguments
///
/// * 'text' - time text, hours may exceed 23 up to the bound
/// * 'max_minutes' - largest accepted value (1440 for tariffs, 2880 for deadlines)
pub fn parse_hhmm(text: &str, max_minutes: u32) -> Result<u32, String> {
    let (h, m) = text
        .split_once(':')
        .ok_or_else(|| format!("bad time text: {}", text))?;
    let hours: u32 = h.trim().parse().map_err(|_| format!("bad hours in: {}", text))?;
    let minutes: u32 = m.trim().parse().map_err(|_| format!("bad minutes in: {}", text))?;

    if minutes > 59 {
        return Err(format!("minutes out of range in: {}", text));
    }
    let total = hours * 60 + minutes;
    if total > max_minutes {
        return Err(format!("time beyond bound in: {}", text));
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_time_based_rates_and_levels() {
        let tariff = economy_7();
        assert_eq!(tariff.rate_at(45, None), 0.15);
        assert_eq!(tariff.rate_at(600, None), 0.30);
        assert_eq!(tariff.level_at(45, None), 0);
        assert_eq!(tariff.level_at(600, None), 1);
        assert_eq!(tariff.distinct_rates(None), &[0.15, 0.30]);
    }

    #[test]
    fn test_wrap_around_period_split_at_midnight() {
        let tariff = economy_7();
        // 07:30-00:30 wraps; both sides of midnight carry the high rate
        assert_eq!(tariff.rate_at(1439, None), 0.30);
        assert_eq!(tariff.rate_at(0, None), 0.30);
        assert_eq!(tariff.rate_at(29, None), 0.30);
        assert_eq!(tariff.rate_at(30, None), 0.15);
    }

    #[test]
    fn test_flat_scheme() {
        let json = r#"{"Standard": {"type": "flat", "rate": 0.30}}"#;
        let book = TariffBook::from_json_str(json).unwrap();
        let tariff = book.get("Standard").unwrap();
        assert_eq!(tariff.rate_at(0, None), 0.30);
        assert_eq!(tariff.level_count(None), 1);
        assert_eq!(tariff.level_at(720, None), 0);
        assert!(!tariff.is_seasonal());
    }

    #[test]
    fn test_seasonal_scheme_levels_are_intra_season() {
        let json = r#"{
            "TOU_D": {"seasonal_rates": {
                "summer": {"time_blocks": [
                    {"start": "00:00", "end": "14:00", "rate": 0.40},
                    {"start": "14:00", "end": "17:00", "rate": 0.48},
                    {"start": "17:00", "end": "20:00", "rate": 0.60},
                    {"start": "20:00", "end": "00:00", "rate": 0.48}
                ]},
                "winter": {"time_blocks": [
                    {"start": "00:00", "end": "17:00", "rate": 0.43},
                    {"start": "17:00", "end": "20:00", "rate": 0.51},
                    {"start": "20:00", "end": "22:00", "rate": 0.46},
                    {"start": "22:00", "end": "00:00", "rate": 0.43}
                ]}
            }}
        }"#;
        let book = TariffBook::from_json_str(json).unwrap();
        let tariff = book.get("TOU_D").unwrap();

        assert!(tariff.is_seasonal());
        assert_eq!(tariff.season_for_month(7), Some(Season::Summer));
        assert_eq!(tariff.season_for_month(12), Some(Season::Winter));
        assert_eq!(tariff.season_for_month(5), Some(Season::Summer));

        // Summer has 3 distinct rates, winter 3 of its own
        assert_eq!(tariff.level_count(Some(Season::Summer)), 3);
        assert_eq!(tariff.level_at(18 * 60, Some(Season::Summer)), 2);
        assert_eq!(tariff.level_at(18 * 60, Some(Season::Winter)), 2);
        assert_eq!(tariff.level_at(10 * 60, Some(Season::Winter)), 0);
        assert_eq!(tariff.rate_at(21 * 60, Some(Season::Winter)), 0.46);
    }

    #[test]
    fn test_non_seasonal_has_no_season() {
        assert_eq!(economy_7().season_for_month(7), None);
    }

    #[test]
    fn test_parse_hhmm_bounds() {
        assert_eq!(parse_hhmm("00:30", 1440).unwrap(), 30);
        assert_eq!(parse_hhmm("38:00", 2880).unwrap(), 2280);
        assert!(parse_hhmm("25:00", 1440).is_err());
        assert!(parse_hhmm("12:75", 2880).is_err());
        assert!(parse_hhmm("noon", 1440).is_err());
    }

    #[test]
    fn test_unknown_scheme_type_rejected() {
        let json = r#"{"Odd": {"type": "hourly", "rate": 0.1}}"#;
        assert!(TariffBook::from_json_str(json).is_err());
    }
}
