//! BIDS file naming for anatomical inputs and SynthSeg derivatives.

use std::path::{Path, PathBuf};

const NIFTI_GZ: &str = ".nii.gz";

/// Split `{prefix}_{suffix}.nii.gz` on the last underscore.
///
/// The suffix must be a non-empty run of word characters; the prefix keeps any
/// leading directories. Returns `None` for names that do not fit.
pub fn split_anatomical(rel_path: &str) -> Option<(String, String)> {
    let stem = rel_path.strip_suffix(NIFTI_GZ)?;
    let (prefix, suffix) = stem.rsplit_once('_')?;
    if suffix.is_empty() || !suffix.chars().all(char::is_alphanumeric) {
        return None;
    }
    Some((prefix.to_string(), suffix.to_string()))
}

/// Glob pattern (relative to the mask dataset) for brain masks of `prefix`
pub fn mask_pattern(prefix: &str) -> String {
    format!("{}*_desc-brain_mask{}", glob::Pattern::escape(prefix), NIFTI_GZ)
}

/// Output file names for one anatomical prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeNames<'a> {
    prefix: &'a str,
    suffix: &'a str,
}

impl<'a> DerivativeNames<'a> {
    pub fn new(prefix: &'a str, suffix: &'a str) -> Self {
        Self { prefix, suffix }
    }

    /// Segmentation in SynthSeg space; its presence marks the item as done
    pub fn dseg(&self) -> String {
        format!("{}_space-SynthSeg_dseg", self.prefix)
    }

    pub fn dseg_orig(&self) -> String {
        format!("{}_space-orig_dseg", self.prefix)
    }

    /// The input image resampled into segmentation space
    pub fn resampled_input(&self) -> String {
        format!("{}_space-SynthSeg_{}", self.prefix, self.suffix)
    }

    pub fn qc(&self) -> String {
        format!("{}_desc-qc", self.prefix)
    }

    pub fn volumes(&self) -> String {
        format!("{}_desc-volumes", self.prefix)
    }

    pub fn probseg(&self) -> String {
        format!("{}_space-SynthSeg_probseg", self.prefix)
    }

    pub fn probseg_orig(&self) -> String {
        format!("{}_space-orig_probseg", self.prefix)
    }

    pub fn antsct_dseg(&self) -> String {
        format!("{}_space-orig_seg-antsct_dseg", self.prefix)
    }

    pub fn antsct_probseg(&self, code: &str) -> String {
        format!("{}_space-orig_seg-antsct_label-{}_probseg", self.prefix, code)
    }
}

/// `{root}/{stem}.nii.gz`
pub fn nifti_path(root: &Path, stem: &str) -> PathBuf {
    root.join(format!("{}{}", stem, NIFTI_GZ))
}

/// `{root}/{stem}.{ext}`
pub fn sidecar_path(root: &Path, stem: &str, ext: &str) -> PathBuf {
    root.join(format!("{}.{}", stem, ext))
}
