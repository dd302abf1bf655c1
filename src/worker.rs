use glob::glob;
use log::{error, info};
use rayon::prelude::*;
use crate::config::Config;
use crate::constraints::ConstraintBook;
use crate::errors::PipelineError;
use crate::initialization::Mgr;
use crate::outputs;
use crate::pipeline::{self, HouseInputs, PipelineStatus};
use crate::power_data;

/// Result line of one (house, tariff) pipeline for the summary table
struct RunSummary {
    house: String,
    tariff: String,
    reschedulable: usize,
    scheduled: usize,
    failed: usize,
    status: String,
}

/// Runs every (house, tariff) pipeline of the batch
///
/// Each pipeline owns an isolated view of its inputs and writes to a
/// disjoint output directory, so the fan-out shares nothing mutable.
///
/// # Arguments
///
/// * 'config' - application configuration
/// * 'mgr' - struct with configured managers
pub fn run(config: &Config, mgr: &Mgr) -> anyhow::Result<()> {
    let houses = match &config.run.houses {
        Some(houses) => houses.clone(),
        None => discover_houses(&config.files.power_dir)?,
    };
    if houses.is_empty() {
        return Err(anyhow::anyhow!("no houses found in {}", config.files.power_dir));
    }

    let tariffs: Vec<String> = match &config.run.tariffs {
        Some(tariffs) => tariffs.clone(),
        None => mgr.tariffs.names().iter().map(|n| n.to_string()).collect(),
    };

    let jobs: Vec<(String, String)> = houses
        .iter()
        .flat_map(|house| tariffs.iter().map(|t| (house.clone(), t.clone())))
        .collect();
    info!("starting batch: {} houses x {} tariffs", houses.len(), tariffs.len());

    let summaries: Vec<RunSummary> = jobs
        .par_iter()
        .map(|(house, tariff)| run_single(config, mgr, house, tariff))
        .collect();

    log_summary_table(&summaries);

    Ok(())
}

/// Runs one (house, tariff) pipeline and folds any error into its summary line
fn run_single(config: &Config, mgr: &Mgr, house: &str, tariff_name: &str) -> RunSummary {
    match process(config, mgr, house, tariff_name) {
        Ok(summary) => summary,
        Err(e) => {
            error!("{} / {}: pipeline failed: {}", house, tariff_name, e);
            RunSummary {
                house: house.to_string(),
                tariff: tariff_name.to_string(),
                reschedulable: 0,
                scheduled: 0,
                failed: 0,
                status: format!("failed: {}", e),
            }
        }
    }
}

fn process(
    config: &Config,
    mgr: &Mgr,
    house: &str,
    tariff_name: &str,
) -> Result<RunSummary, PipelineError> {
    let tariff = mgr
        .tariffs
        .get(tariff_name)
        .ok_or_else(|| PipelineError::UnknownTariff(tariff_name.to_string()))?;

    let labels = power_data::load_labels(&format!("{}{}_labels.csv", config.files.labels_dir, house))?;
    let matrix = power_data::load_power_matrix(
        &format!("{}{}_power.csv", config.files.power_dir, house),
        &labels,
    )?;
    let constraints =
        ConstraintBook::load(&format!("{}{}_constraints.json", config.files.constraints_dir, house))?;

    let inputs = HouseInputs {
        house,
        matrix: &matrix,
        constraints: &constraints,
        segmentation: &config.segmentation,
    };
    let outcome = pipeline::process_house(&inputs, tariff)?;

    outputs::save_outcome(&config.files.output_dir, &outcome, &matrix.labels, &constraints)?;

    for (reason, count) in outcome.failure_tally() {
        info!("{} / {}: {} x {}", house, tariff_name, count, reason);
    }
    for (appliance, (orig, sched)) in crate::cost::appliance_totals(&outcome.costs) {
        let saving = if orig > 0.0 { (orig - sched) / orig * 100.0 } else { 0.0 };
        info!(
            "{} / {}: {} cost {:.4} -> {:.4} ({:.1}% saved)",
            house, tariff_name, appliance, orig, sched, saving
        );
    }

    let status = match &outcome.status {
        PipelineStatus::Success => "success".to_string(),
        PipelineStatus::NoReschedulableEvents => "no reschedulable events".to_string(),
        PipelineStatus::Failed(reason) => format!("failed: {}", reason),
    };

    Ok(RunSummary {
        house: house.to_string(),
        tariff: tariff_name.to_string(),
        reschedulable: outcome.decisions.len(),
        scheduled: outcome.scheduled_count,
        failed: outcome.failed_count,
        status,
    })
}

/// Discovers house ids from `<house>_power.csv` files in the power directory
///
/// # Arguments
///
/// * 'power_dir' - directory holding the power files
pub fn discover_houses(power_dir: &str) -> anyhow::Result<Vec<String>> {
    let mut houses: Vec<String> = Vec::new();

    for entry in glob(&format!("{}*_power.csv", power_dir))? {
        if let Ok(path) = entry {
            if let Some(stem) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(house) = stem.strip_suffix("_power.csv") {
                    houses.push(house.to_string());
                }
            }
        }
    }
    houses.sort();

    Ok(houses)
}

/// Logs the per-house scheduling summary table
fn log_summary_table(summaries: &[RunSummary]) {
    info!("{:<12} {:<18} {:>13} {:>10} {:>7}  status", "house", "tariff", "reschedulable", "scheduled", "failed");

    let mut total_reschedulable = 0usize;
    let mut total_scheduled = 0usize;
    let mut total_failed = 0usize;

    for s in summaries {
        info!(
            "{:<12} {:<18} {:>13} {:>10} {:>7}  {}",
            s.house, s.tariff, s.reschedulable, s.scheduled, s.failed, s.status
        );
        total_reschedulable += s.reschedulable;
        total_scheduled += s.scheduled;
        total_failed += s.failed;
    }

    let rate = if total_reschedulable > 0 {
        total_scheduled as f64 / total_reschedulable as f64 * 100.0
    } else {
        0.0
    };
    info!(
        "total: {} reschedulable, {} scheduled, {} failed ({:.1}% success)",
        total_reschedulable, total_scheduled, total_failed, rate
    );
}
