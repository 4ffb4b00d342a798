//! Batch SynthSeg segmentation of BIDS datasets
//!
//! This library runs the SynthSeg container over a list of anatomical images
//! and renames its outputs into a BIDS derivatives dataset.

pub mod bids;
pub mod config;
pub mod container;
pub mod dataset;
pub mod error;
pub mod labels;
pub mod lock;
pub mod outputs;
pub mod pipeline;
pub mod resolver;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{Args, MappingOptions, RuntimeOptions};
pub use dataset::update_output_description;
pub use error::{Error, Result};
pub use outputs::{csv_to_bids_tsv, map_outputs, OutputBundle};
pub use pipeline::process_dataset;
pub use resolver::{resolve_mask, resolve_work_item, MaskMatch, Resolution};
pub use types::{DatasetDescription, GeneratedBy, ProcessingStats, SkipReason, WorkItem};
