use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Expand the `--anatomical-images` values into image paths.
///
/// A single value naming an existing file is read as a list, one image per
/// line; anything else is taken as the images themselves.
pub fn read_image_list(values: &[String]) -> std::io::Result<Vec<String>> {
    if let [single] = values {
        let path = Path::new(single);
        if path.is_file() {
            let content = fs::read_to_string(path)?;
            return Ok(content
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect());
        }
        if !single.trim().ends_with(".nii.gz") {
            warn!(
                "{} is not an existing list file, treating it as a single image",
                single
            );
        }
    }
    Ok(values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect())
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Create the output dataset directory if it is not there yet.
/// Existing content is kept; reruns add to it.
pub fn ensure_output_directory(path: &Path) -> std::io::Result<()> {
    if !path.is_dir() {
        info!("Creating output dataset {}", path.display());
        fs::create_dir_all(path)?;
    }
    Ok(())
}
