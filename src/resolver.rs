//! Turning a requested anatomical image into a work item

use glob::glob;
use log::warn;
use std::path::{Path, PathBuf};

use crate::bids::{mask_pattern, nifti_path, split_anatomical, DerivativeNames};
use crate::error::Result;
use crate::types::{SkipReason, WorkItem};

/// Outcome of a brain mask lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskMatch {
    /// Path relative to the mask dataset
    Found(PathBuf),
    NotFound,
    Ambiguous(Vec<PathBuf>),
}

/// Look for `{prefix}*_desc-brain_mask.nii.gz` under `mask_root`
pub fn resolve_mask(mask_root: &Path, prefix: &str) -> Result<MaskMatch> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&mask_root.to_string_lossy()),
        mask_pattern(prefix)
    );
    let mut matches: Vec<PathBuf> = glob(&pattern)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Unreadable path while looking for masks: {}", e);
                None
            }
        })
        .map(|path| {
            let relative = path.strip_prefix(mask_root).map(Path::to_path_buf);
            relative.unwrap_or(path)
        })
        .collect();

    Ok(match matches.len() {
        0 => MaskMatch::NotFound,
        1 => MaskMatch::Found(matches.remove(0)),
        _ => MaskMatch::Ambiguous(matches),
    })
}

/// A requested image either becomes a work item or is skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(WorkItem),
    Skip(SkipReason),
}

/// Resolve one requested image into a work item, or say why it is skipped.
///
/// Checks run in order: input exists, name parses, output not already present,
/// exactly one mask.
pub fn resolve_work_item(
    input_root: &Path,
    mask_root: &Path,
    output_root: &Path,
    image: &str,
) -> Result<Resolution> {
    if !input_root.join(image).is_file() {
        return Ok(Resolution::Skip(SkipReason::InputNotFound));
    }

    let Some((prefix, suffix)) = split_anatomical(image) else {
        return Ok(Resolution::Skip(SkipReason::UnrecognizedName));
    };

    let marker = nifti_path(output_root, &DerivativeNames::new(&prefix, &suffix).dseg());
    if marker.exists() {
        return Ok(Resolution::Skip(SkipReason::AlreadyProcessed(marker)));
    }

    let mask = match resolve_mask(mask_root, &prefix)? {
        MaskMatch::Found(mask) => mask,
        MaskMatch::NotFound => return Ok(Resolution::Skip(SkipReason::MaskNotFound)),
        MaskMatch::Ambiguous(candidates) => {
            for candidate in &candidates {
                warn!("Candidate mask for {}: {}", image, candidate.display());
            }
            return Ok(Resolution::Skip(SkipReason::MaskAmbiguous(candidates.len())));
        }
    };

    Ok(Resolution::Ready(WorkItem {
        image: image.to_string(),
        prefix,
        suffix,
        mask,
    }))
}
