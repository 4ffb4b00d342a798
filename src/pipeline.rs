use log::{error, info, warn};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{Args, MappingOptions};
use crate::container::{
    find_runtime, run_segmentation, ContainerInfo, RuntimeEnv, SegmentationRequest,
};
use crate::dataset::update_output_description;
use crate::error::{Error, Result};
use crate::outputs::map_outputs;
use crate::resolver::{resolve_work_item, Resolution};
use crate::types::ProcessingStats;
use crate::utils::{create_progress_bar, ensure_output_directory, read_image_list};

/// Per-job scratch directory that SynthSeg writes into, removed on drop
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn create(root: &Path, job_id: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        // Bound into the container, so it has to be absolute
        let root = root.canonicalize()?;
        let dir = tempfile::Builder::new()
            .suffix(&format!(".synthseg.{}", job_id))
            .tempdir_in(&root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

// Absolute paths for the bind mounts
fn absolute(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .map_err(|e| Error::InvalidArgument(format!("{}: {}", path.display(), e)))
}

/// Segment every requested image and map the results into the output dataset.
///
/// Fails only on pre-flight problems; per-image problems are logged, counted
/// and skipped.
pub fn process_dataset(args: &Args) -> Result<ProcessingStats> {
    let runtime = find_runtime(&args.runtime)?;
    let images = read_image_list(&args.anatomical_images)?;
    info!("Processing {} images", images.len());

    ensure_output_directory(&args.output_dataset)?;
    let input_root = absolute(&args.input_dataset)?;
    let mask_root = absolute(&args.mask_dataset)?;
    let output_root = absolute(&args.output_dataset)?;
    let container = absolute(&args.container)?;

    let container_info = ContainerInfo::inspect(&runtime, &container);
    update_output_description(
        &output_root,
        &input_root,
        &container_info,
        args.lock_timeout(),
    )?;

    let scratch = ScratchDir::create(&args.scratch_root(), &args.job_id())?;
    info!("Working directory: {}", scratch.path().display());

    let runtime_env = RuntimeEnv::default();
    let runtime_options = args.runtime_options();
    let mapping_options = args.mapping_options();

    let mut stats = ProcessingStats::new();
    let pb = create_progress_bar(images.len() as u64, "SynthSeg");

    for image in &images {
        stats.increment_total();

        let item = match resolve_work_item(&input_root, &mask_root, &output_root, image) {
            Ok(Resolution::Ready(item)) => item,
            Ok(Resolution::Skip(reason)) => {
                warn!("Skipping {}: {}", image, reason);
                stats.record_skip(&reason);
                pb.inc(1);
                continue;
            }
            Err(e) => {
                error!("Failed to resolve {}: {}", image, e);
                stats.increment_failed();
                pb.inc(1);
                continue;
            }
        };

        let request = SegmentationRequest {
            container: &container,
            input_dataset: &input_root,
            mask_dataset: &mask_root,
            scratch: scratch.path(),
            item: &item,
            options: runtime_options,
        };
        let result = segment_and_map(
            &runtime,
            &request,
            &runtime_env,
            &output_root,
            &mapping_options,
        );
        match result {
            Ok(()) => stats.increment_processed(),
            Err(e) => {
                error!("Failed to process {}: {}", image, e);
                stats.increment_failed();
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("SynthSeg processing complete");
    stats.print_summary();
    Ok(stats)
}

fn segment_and_map(
    runtime: &Path,
    request: &SegmentationRequest,
    env: &RuntimeEnv,
    output_root: &Path,
    mapping_options: &MappingOptions,
) -> Result<()> {
    let item = request.item;
    let status = run_segmentation(runtime, request, env)?;
    if !status.success() {
        warn!("SynthSeg exited with {} for {}", status, item.image);
    }
    let bundle = map_outputs(item, request.scratch, output_root, mapping_options)?;
    info!("Wrote {} files for {}", bundle.actions.len(), item.image);
    Ok(())
}
