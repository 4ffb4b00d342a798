use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use synthseg_bids::{process_dataset, Args};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("Starting SynthSeg batch segmentation...");

    match process_dataset(&args) {
        Ok(stats) => {
            info!(
                "Finished: {} of {} images segmented",
                stats.processed, stats.total_images
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
