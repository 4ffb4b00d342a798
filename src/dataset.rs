//! dataset_description.json handling for input and output datasets

use log::{debug, info};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::container::ContainerInfo;
use crate::error::{Error, Result};
use crate::lock::DescriptionLock;
use crate::types::DatasetDescription;

pub const DESCRIPTION_FILE: &str = "dataset_description.json";

/// Suffix appended to the input dataset name for the derivatives dataset
pub const OUTPUT_NAME_SUFFIX: &str = "_synthseg";

pub fn description_path(dataset_dir: &Path) -> PathBuf {
    dataset_dir.join(DESCRIPTION_FILE)
}

/// Parse a dataset_description.json, requiring a non-empty Name
pub fn read_description(path: &Path) -> Result<DatasetDescription> {
    if !path.is_file() {
        return Err(Error::MissingDescription(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let description: DatasetDescription = serde_json::from_reader(BufReader::new(file))?;
    if description.name.trim().is_empty() {
        return Err(Error::MissingName(path.to_path_buf()));
    }
    Ok(description)
}

pub fn write_description(path: &Path, description: &DatasetDescription) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, description)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Name of the input dataset, from its descriptor
pub fn input_dataset_name(input_dir: &Path) -> Result<String> {
    read_description(&description_path(input_dir)).map(|d| d.name)
}

/// Make sure the output descriptor exists and lists `container` as a generator.
///
/// The whole read-modify-write runs under [`DescriptionLock`]. Returns whether
/// the descriptor was written.
pub fn update_output_description(
    output_dir: &Path,
    input_dir: &Path,
    container: &ContainerInfo,
    lock_timeout: Duration,
) -> Result<bool> {
    let input_name = input_dataset_name(input_dir)?;
    fs::create_dir_all(output_dir)?;

    let path = description_path(output_dir);
    let _lock = DescriptionLock::acquire(&path, lock_timeout)?;
    let generator = container.generated_by();

    if !path.exists() {
        let name = format!("{}{}", input_name, OUTPUT_NAME_SUFFIX);
        info!("Creating {} for dataset {}", path.display(), name);
        write_description(&path, &DatasetDescription::derivative(name, generator))?;
        return Ok(true);
    }

    let mut description = read_description(&path)?;
    if description.add_generator(generator) {
        info!(
            "Adding container {} to GeneratedBy in {}",
            container.tag,
            path.display()
        );
        write_description(&path, &description)?;
        Ok(true)
    } else {
        debug!("{} already lists container {}", path.display(), container.tag);
        Ok(false)
    }
}
