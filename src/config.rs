use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Batch interface for brain segmentation of BIDS datasets with SynthSeg.
///
/// Requires a container runtime (singularity by default) on PATH.
#[derive(Parser, Debug, Clone)]
#[command(name = "synthseg-bids", version, long_about = None)]
pub struct Args {
    /// Path to the container to run
    #[arg(long = "container")]
    pub container: PathBuf,

    /// Input BIDS dataset dir, containing the source images
    #[arg(long = "input-dataset")]
    pub input_dataset: PathBuf,

    /// Mask BIDS dataset dir, containing the brain mask images
    #[arg(long = "mask-dataset")]
    pub mask_dataset: PathBuf,

    /// Output BIDS dataset dir
    #[arg(long = "output-dataset")]
    pub output_dataset: PathBuf,

    /// File listing anatomical images relative to the input dataset, or a comma-separated list
    #[arg(long = "anatomical-images", required = true, use_value_delimiter = true)]
    pub anatomical_images: Vec<String>,

    /// Use GPU
    #[arg(long = "gpu")]
    pub gpu: bool,

    /// Output posteriors
    #[arg(long = "posteriors")]
    pub posteriors: bool,

    /// Output the six-class antsct segmentation
    #[arg(long = "antsct")]
    pub antsct: bool,

    /// Label tables without the CSF label (older SynthSeg models)
    #[arg(long = "no-csf-label")]
    pub no_csf_label: bool,

    /// Container runtime executable
    #[arg(long = "runtime", default_value = "singularity")]
    pub runtime: String,

    /// Root for the per-job scratch directory
    #[arg(long = "scratch-dir", env = "SYNTHSEG_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Job identifier used to name the scratch directory
    #[arg(long = "job-id", env = "LSB_JOBID")]
    pub job_id: Option<String>,

    /// Seconds to wait for the dataset_description.json lock
    #[arg(long = "lock-timeout", default_value_t = 60, value_parser = validate_timeout)]
    pub lock_timeout: u64,
}

impl Args {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout)
    }

    pub fn job_id(&self) -> String {
        self.job_id
            .clone()
            .unwrap_or_else(|| std::process::id().to_string())
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Options forwarded to the container on each invocation
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            gpu: self.gpu,
            posteriors: self.posteriors,
            antsct: self.antsct,
        }
    }

    /// Options controlling which container outputs are mapped, and how
    pub fn mapping_options(&self) -> MappingOptions {
        MappingOptions {
            posteriors: self.posteriors,
            antsct: self.antsct,
            include_csf: !self.no_csf_label,
        }
    }
}

/// Flags passed through to the segmentation container
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub gpu: bool,
    pub posteriors: bool,
    pub antsct: bool,
}

/// Selects the optional parts of an output bundle
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MappingOptions {
    pub posteriors: bool,
    pub antsct: bool,
    pub include_csf: bool,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            posteriors: false,
            antsct: false,
            include_csf: true,
        }
    }
}

// Lock timeout must be a positive number of seconds
fn validate_timeout(s: &str) -> Result<u64, String> {
    match u64::from_str(s) {
        Ok(val) if val > 0 => Ok(val),
        _ => Err("TIMEOUT must be a positive number of seconds".to_string()),
    }
}
