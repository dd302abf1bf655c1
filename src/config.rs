use std::fs;
use log::LevelFilter;
use serde::Deserialize;
use crate::errors::ConfigError;
use crate::segmenter::SegmentationParams;

#[derive(Deserialize)]
pub struct Files {
    /// Directory with `<house>_power.csv` files
    pub power_dir: String,
    /// Directory with `<house>_labels.csv` files
    pub labels_dir: String,
    /// Directory with `<house>_constraints.json` files
    pub constraints_dir: String,
    pub tariff_config: String,
    pub output_dir: String,
}

#[derive(Deserialize)]
pub struct General {
    pub log_path: String,
    pub log_level: LevelFilter,
    pub log_to_stdout: bool,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct Run {
    /// Worker threads of the batch pool, rayon default when absent
    pub worker_threads: Option<usize>,
    /// Restrict the run to these houses, all discovered houses when absent
    pub houses: Option<Vec<String>>,
    /// Restrict the run to these tariff schemes, all configured when absent
    pub tariffs: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct Config {
    pub files: Files,
    pub general: General,
    #[serde(default)]
    pub segmentation: SegmentationParams,
    #[serde(default)]
    pub run: Run,
}

/// Loads the configuration file and returns a struct with all configuration items
///
/// # Arguments
///
/// * 'config_path' - path to the configuration file
pub fn load_config(config_path: &str) -> Result<Config, ConfigError> {
    let toml = fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&toml)?;

    Ok(config)
}
