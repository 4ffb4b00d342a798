//! Mapping SynthSeg scratch outputs into BIDS derivatives names

use log::debug;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::bids::{nifti_path, sidecar_path, DerivativeNames};
use crate::config::MappingOptions;
use crate::error::Result;
use crate::labels::{LabelTable, ANTSCT_POSTERIOR_CODES};
use crate::types::WorkItem;

/// Convert a SynthSeg CSV report into a BIDS TSV sidecar.
///
/// Header spaces become underscores, commas become tabs everywhere, trailing
/// whitespace is dropped from each line.
pub fn csv_to_bids_tsv(input: &Path, output: &Path) -> std::io::Result<()> {
    let reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let mut line = line.trim_end().replace(',', "\t");
        if i == 0 {
            line = line.replace(' ', "_");
        }
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

pub fn write_label_table(path: &Path, table: &LabelTable) -> std::io::Result<()> {
    fs::write(path, table.to_tsv())
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LabelMapSidecar<'a> {
    label_map: Vec<&'a str>,
}

/// Probseg sidecar listing label names in volume order
pub fn write_label_map(path: &Path, names: &[&str]) -> Result<()> {
    let sidecar = LabelMapSidecar {
        label_map: names.to_vec(),
    };
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &sidecar)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// One file written into the output dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputAction {
    Copy { from: PathBuf, to: PathBuf },
    CsvToTsv { from: PathBuf, to: PathBuf },
    LabelTable { table: LabelTable, to: PathBuf },
    LabelMap { names: Vec<&'static str>, to: PathBuf },
}

impl OutputAction {
    pub fn destination(&self) -> &Path {
        match self {
            OutputAction::Copy { to, .. }
            | OutputAction::CsvToTsv { to, .. }
            | OutputAction::LabelTable { to, .. }
            | OutputAction::LabelMap { to, .. } => to,
        }
    }

    fn apply(&self) -> Result<()> {
        match self {
            OutputAction::Copy { from, to } => {
                fs::copy(from, to).map_err(|e| with_path(e, from))?;
            }
            OutputAction::CsvToTsv { from, to } => {
                csv_to_bids_tsv(from, to).map_err(|e| with_path(e, from))?;
            }
            OutputAction::LabelTable { table, to } => write_label_table(to, table)?,
            OutputAction::LabelMap { names, to } => write_label_map(to, names)?,
        }
        Ok(())
    }
}

// Keep the missing scratch file's name in the error
fn with_path(e: std::io::Error, path: &Path) -> std::io::Error {
    std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
}

/// Every file produced for one work item, in write order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBundle {
    pub actions: Vec<OutputAction>,
}

impl OutputBundle {
    pub fn plan(
        item: &WorkItem,
        scratch: &Path,
        output_root: &Path,
        options: &MappingOptions,
    ) -> Self {
        // SynthSeg names its outputs {prefix}<Name>
        let scratch_file = |name: &str| scratch.join(format!("{}{}", item.prefix, name));
        let names = DerivativeNames::new(&item.prefix, &item.suffix);
        let labels = LabelTable::synthseg(options.include_csf);
        let mut actions = Vec::new();

        // The SynthSeg-space dseg marks the item as done, so its image is
        // copied only after everything else has been written
        let marker = OutputAction::Copy {
            from: scratch_file("SynthSeg.nii.gz"),
            to: nifti_path(output_root, &names.dseg()),
        };
        actions.push(OutputAction::LabelTable {
            table: labels.clone(),
            to: sidecar_path(output_root, &names.dseg(), "tsv"),
        });
        actions.push(OutputAction::Copy {
            from: scratch_file("SynthSegOrig.nii.gz"),
            to: nifti_path(output_root, &names.dseg_orig()),
        });
        actions.push(OutputAction::LabelTable {
            table: labels.clone(),
            to: sidecar_path(output_root, &names.dseg_orig(), "tsv"),
        });

        actions.push(OutputAction::Copy {
            from: scratch_file("SynthSegInput.nii.gz"),
            to: nifti_path(output_root, &names.resampled_input()),
        });
        actions.push(OutputAction::CsvToTsv {
            from: scratch_file("SynthSegQC.csv"),
            to: sidecar_path(output_root, &names.qc(), "tsv"),
        });
        actions.push(OutputAction::CsvToTsv {
            from: scratch_file("Volumes.csv"),
            to: sidecar_path(output_root, &names.volumes(), "tsv"),
        });

        if options.posteriors {
            for (source, stem) in [
                ("Posteriors.nii.gz", names.probseg()),
                ("PosteriorsOrig.nii.gz", names.probseg_orig()),
            ] {
                actions.push(OutputAction::Copy {
                    from: scratch_file(source),
                    to: nifti_path(output_root, &stem),
                });
                actions.push(OutputAction::LabelMap {
                    names: labels.names(),
                    to: sidecar_path(output_root, &stem, "json"),
                });
            }
        }

        if options.antsct {
            let stem = names.antsct_dseg();
            actions.push(OutputAction::Copy {
                from: scratch_file("AntsctSeg.nii.gz"),
                to: nifti_path(output_root, &stem),
            });
            actions.push(OutputAction::LabelTable {
                table: LabelTable::antsct(),
                to: sidecar_path(output_root, &stem, "tsv"),
            });

            if options.posteriors {
                for code in ANTSCT_POSTERIOR_CODES {
                    actions.push(OutputAction::Copy {
                        from: scratch_file(&format!("AntsctPosteriors{}.nii.gz", code)),
                        to: nifti_path(output_root, &names.antsct_probseg(code)),
                    });
                }
            }
        }

        actions.push(marker);
        Self { actions }
    }

    /// Write the bundle, creating output directories as needed. Stops at the
    /// first missing scratch file, in which case the completion marker has not
    /// been written.
    pub fn write(&self) -> Result<()> {
        for action in &self.actions {
            if let Some(parent) = action.destination().parent() {
                fs::create_dir_all(parent)?;
            }
            debug!("Writing {}", action.destination().display());
            action.apply()?;
        }
        Ok(())
    }
}

/// Plan and write the output bundle for `item`
pub fn map_outputs(
    item: &WorkItem,
    scratch: &Path,
    output_root: &Path,
    options: &MappingOptions,
) -> Result<OutputBundle> {
    let bundle = OutputBundle::plan(item, scratch, output_root, options);
    bundle.write()?;
    Ok(bundle)
}
