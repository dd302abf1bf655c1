use rayon::ThreadPoolBuilder;
use anyhow::Result;
use log::{error, info};
use crate::initialization::init;
use crate::worker::run;

mod appliance_index;
mod collision;
mod config;
mod constraints;
mod cost;
mod errors;
mod filter;
mod initialization;
mod intervals;
mod logging;
pub mod models;
mod outputs;
mod pipeline;
mod power_data;
mod scheduler;
mod segmenter;
mod tariff;
mod worker;
mod workspace;

fn main() -> Result<()> {
    // Load config and set up logging and the tariff book. If initialization
    // fails, we are pretty much out of luck and can't even log.
    let (config, mgr) = match init() {
        Ok((c, m)) => (c, m),
        Err(e) => {
            return Err(anyhow::anyhow!("Initialization failed: {}", e));
        }
    };

    ThreadPoolBuilder::new()
        .num_threads(config.run.worker_threads.unwrap_or(2))
        .build_global()?;

    // Run all (house, tariff) pipelines
    match run(&config, &mgr) {
        Ok(_) => {
            info!("batch run finished");
        }
        Err(e) => {
            error!("Run failed: {}", e);
            return Err(e)?;
        }
    }

    Ok(())
}
