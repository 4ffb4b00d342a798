use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

// Fixed fields written into a new derivatives dataset
pub const BIDS_VERSION: &str = "1.8.0";
pub const DERIVATIVE_DATASET_TYPE: &str = "derivative";
pub const GENERATOR_NAME: &str = "SynthSeg";

// The dataset_description.json of a BIDS dataset
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DatasetDescription {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "BIDSVersion", skip_serializing_if = "Option::is_none")]
    pub bids_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_by: Vec<GeneratedBy>,
    // Keys this tool does not manage are carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DatasetDescription {
    /// A fresh derivatives descriptor with a single generator
    pub fn derivative(name: String, generator: GeneratedBy) -> Self {
        Self {
            name,
            bids_version: Some(BIDS_VERSION.to_string()),
            dataset_type: Some(DERIVATIVE_DATASET_TYPE.to_string()),
            generated_by: vec![generator],
            extra: Map::new(),
        }
    }

    /// Append `generator` unless an entry with the same name and container tag
    /// is already listed. Returns whether the list grew.
    pub fn add_generator(&mut self, generator: GeneratedBy) -> bool {
        if self.generated_by.iter().any(|g| g.same_identity(&generator)) {
            return false;
        }
        self.generated_by.push(generator);
        true
    }
}

// One provenance entry in GeneratedBy
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GeneratedBy {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "CodeURL", default, skip_serializing_if = "Option::is_none")]
    pub code_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerRef>,
    // Description, CodeURL variants and the like from other tools
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GeneratedBy {
    fn container_tag(&self) -> Option<&str> {
        self.container.as_ref().and_then(|c| c.tag.as_deref())
    }

    pub fn same_identity(&self, other: &GeneratedBy) -> bool {
        self.name == other.name && self.container_tag() == other.container_tag()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerRef {
    // Recommended, not required, by BIDS
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// One anatomical image and the mask it was matched with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Image path relative to the input dataset
    pub image: String,
    /// Everything before the final `_<suffix>.nii.gz`, including directories
    pub prefix: String,
    /// Modality suffix, eg T1w
    pub suffix: String,
    /// Mask path relative to the mask dataset
    pub mask: PathBuf,
}

// Why an image was left out of the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InputNotFound,
    UnrecognizedName,
    AlreadyProcessed(PathBuf),
    MaskNotFound,
    MaskAmbiguous(usize),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InputNotFound => write!(f, "anatomical input file not found"),
            SkipReason::UnrecognizedName => {
                write!(f, "file name does not end in _<suffix>.nii.gz")
            }
            SkipReason::AlreadyProcessed(path) => {
                write!(f, "output already exists: {}", path.display())
            }
            SkipReason::MaskNotFound => write!(f, "no brain mask found"),
            SkipReason::MaskAmbiguous(n) => write!(f, "{} candidate brain masks found", n),
        }
    }
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total_images: usize,
    pub processed: usize,
    pub skipped_input_missing: usize,
    pub skipped_unrecognized: usize,
    pub skipped_existing: usize,
    pub skipped_mask_missing: usize,
    pub skipped_mask_ambiguous: usize,
    pub failed: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_total(&mut self) {
        self.total_images += 1;
    }

    pub fn increment_processed(&mut self) {
        self.processed += 1;
    }

    pub fn increment_failed(&mut self) {
        self.failed += 1;
    }

    pub fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::InputNotFound => self.skipped_input_missing += 1,
            SkipReason::UnrecognizedName => self.skipped_unrecognized += 1,
            SkipReason::AlreadyProcessed(_) => self.skipped_existing += 1,
            SkipReason::MaskNotFound => self.skipped_mask_missing += 1,
            SkipReason::MaskAmbiguous(_) => self.skipped_mask_ambiguous += 1,
        }
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped_input_missing
            + self.skipped_unrecognized
            + self.skipped_existing
            + self.skipped_mask_missing
            + self.skipped_mask_ambiguous
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Total images: {}", self.total_images);
        log::info!("Segmented: {}", self.processed);
        log::info!("Skipped (already processed): {}", self.skipped_existing);
        log::info!("Failed: {}", self.failed);

        let problems = self.total_skipped() - self.skipped_existing;
        if problems > 0 {
            log::warn!(
                "Skipped images: {} (input missing: {}, bad name: {}, no mask: {}, ambiguous mask: {})",
                problems,
                self.skipped_input_missing,
                self.skipped_unrecognized,
                self.skipped_mask_missing,
                self.skipped_mask_ambiguous
            );
        }
    }
}
