use std::env;
use log::info;
use anyhow::Result;
use crate::config::{load_config, Config};
use crate::logging::setup_logger;
use crate::tariff::TariffBook;

pub struct Mgr {
    pub tariffs: TariffBook,
}

/// Initializes and returns configuration and a Mgr struct holding the shared
/// read-only tariff book
///
pub fn init() -> Result<(Config, Mgr)> {
    let args: Vec<String> = env::args().collect();
    let config_path = args
        .iter()
        .find(|p| p.starts_with("--config="))
        .expect("config file argument should be present");
    let config_path = config_path
        .split_once('=')
        .expect("config file argument should be correct")
        .1;

    // Load configuration
    let config = load_config(config_path)?;

    // Setup logging
    let _ = setup_logger(
        &config.general.log_path,
        config.general.log_level,
        config.general.log_to_stdout,
    )?;

    // Print version
    info!("starting loadshift scheduler version: {}", env!("CARGO_PKG_VERSION"));

    // Load the tariff schemes shared by every pipeline
    let tariffs = TariffBook::load(&config.files.tariff_config)?;
    info!("loaded tariff schemes: {}", tariffs.names().join(", "));

    let mgr = Mgr { tariffs };

    Ok((config, mgr))
}
