//! Running the SynthSeg container through singularity (or a compatible runtime).

use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::config::RuntimeOptions;
use crate::error::{Error, Result};
use crate::types::{ContainerRef, GeneratedBy, WorkItem, GENERATOR_NAME};

// Mount points inside the container
const INPUT_MOUNT: &str = "/input";
const MASK_MOUNT: &str = "/masks";
const OUTPUT_MOUNT: &str = "/output";

const LABEL_VERSION: &str = "org.opencontainers.image.version";
const LABEL_SOURCE: &str = "org.opencontainers.image.source";
const LABEL_REF_NAME: &str = "org.opencontainers.image.ref.name";

/// Find `name` on PATH, failing the run if it is not there
pub fn find_runtime(name: &str) -> Result<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(Error::RuntimeNotFound(name.to_string()))
        };
    }

    let path_var =
        std::env::var_os("PATH").ok_or_else(|| Error::RuntimeNotFound(name.to_string()))?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| Error::RuntimeNotFound(name.to_string()))
}

/// Environment handed to the runtime process.
///
/// Thread counts are pinned to one and Python output is unbuffered so logs
/// interleave sensibly on batch systems. The parent environment is never
/// modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEnv {
    vars: Vec<(String, String)>,
}

impl Default for RuntimeEnv {
    fn default() -> Self {
        let vars = [
            ("SINGULARITYENV_OMP_NUM_THREADS", "1"),
            ("SINGULARITYENV_ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS", "1"),
            ("SINGULARITYENV_PYTHONUNBUFFERED", "1"),
            ("PYTHONUNBUFFERED", "1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { vars }
    }
}

impl RuntimeEnv {
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }
}

/// Identity of the container, recorded in GeneratedBy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub runtime: String,
    pub tag: String,
    pub version: Option<String>,
    pub source: Option<String>,
}

impl ContainerInfo {
    /// Identity from the container file name alone
    pub fn from_path(runtime: &str, container: &Path) -> Self {
        let tag = container
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| container.display().to_string());
        Self {
            runtime: runtime_kind(runtime),
            tag,
            version: None,
            source: None,
        }
    }

    /// Fill in version, source and tag from `inspect --json` output
    pub fn with_inspect_json(mut self, json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let labels = value
            .pointer("/data/attributes/labels")
            .or_else(|| value.get("labels"))
            .and_then(Value::as_object);

        if let Some(labels) = labels {
            let label = |key: &str| {
                labels
                    .get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            self.version = label(LABEL_VERSION).or(self.version);
            self.source = label(LABEL_SOURCE).or(self.source);
            if let Some(tag) = label(LABEL_REF_NAME) {
                self.tag = tag;
            }
        }
        Ok(self)
    }

    /// Ask the runtime for container labels; falls back to the file name on failure
    pub fn inspect(runtime: &Path, container: &Path) -> Self {
        let runtime_name = runtime
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let info = Self::from_path(&runtime_name, container);

        let output = Command::new(runtime)
            .arg("inspect")
            .arg("--json")
            .arg(container)
            .output();
        match output {
            Ok(out) if out.status.success() => {
                let text = String::from_utf8_lossy(&out.stdout);
                match info.clone().with_inspect_json(&text) {
                    Ok(inspected) => inspected,
                    Err(e) => {
                        warn!("Could not parse container metadata: {}", e);
                        info
                    }
                }
            }
            Ok(out) => {
                warn!(
                    "Container inspect exited with {}, using file name as tag",
                    out.status
                );
                info
            }
            Err(e) => {
                warn!("Failed to run container inspect: {}", e);
                info
            }
        }
    }

    pub fn generated_by(&self) -> GeneratedBy {
        GeneratedBy {
            name: GENERATOR_NAME.to_string(),
            version: self.version.clone(),
            code_url: self.source.clone(),
            container: Some(ContainerRef {
                kind: Some(self.runtime.clone()),
                tag: Some(self.tag.clone()),
                extra: Map::new(),
            }),
            extra: Map::new(),
        }
    }
}

// apptainer is singularity for GeneratedBy purposes
fn runtime_kind(runtime: &str) -> String {
    match runtime {
        "" | "apptainer" => "singularity".to_string(),
        other => other.to_string(),
    }
}

/// One container invocation for one work item
#[derive(Debug, Clone)]
pub struct SegmentationRequest<'a> {
    pub container: &'a Path,
    pub input_dataset: &'a Path,
    pub mask_dataset: &'a Path,
    pub scratch: &'a Path,
    pub item: &'a WorkItem,
    pub options: RuntimeOptions,
}

impl SegmentationRequest<'_> {
    /// Arguments after the runtime executable. Disabled flags are left out
    /// entirely rather than passed as empty strings.
    pub fn command_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["run".into(), "--cleanenv".into()];
        if self.options.gpu {
            args.push("--nv".into());
        }

        let binds = format!(
            "{}:{},{}:{},{}:{}",
            self.input_dataset.display(),
            INPUT_MOUNT,
            self.mask_dataset.display(),
            MASK_MOUNT,
            self.scratch.display(),
            OUTPUT_MOUNT
        );
        args.push("-B".into());
        args.push(binds.into());
        args.push(self.container.as_os_str().to_os_string());

        args.push("--input".into());
        args.push(format!("{}/{}", INPUT_MOUNT, self.item.image).into());
        args.push("--mask".into());
        args.push(format!("{}/{}", MASK_MOUNT, self.item.mask.display()).into());
        args.push("--output".into());
        args.push(format!("{}/{}", OUTPUT_MOUNT, self.item.prefix).into());
        for flag in ["--qc", "--volumes", "--resample-orig"] {
            args.push(flag.into());
        }
        if self.options.posteriors {
            args.push("--posteriors".into());
        }
        if self.options.antsct {
            args.push("--antsct".into());
        }
        args
    }
}

/// Run the container and wait for it. Only a failure to start is an error;
/// the exit status is returned for the caller to report.
pub fn run_segmentation(
    runtime: &Path,
    request: &SegmentationRequest,
    env: &RuntimeEnv,
) -> std::io::Result<ExitStatus> {
    // SynthSeg writes {prefix}<name> files, so the prefix directories must exist
    let prefix_dir = request.scratch.join(&request.item.prefix);
    if let Some(parent) = prefix_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let args = request.command_args();
    debug!("Running {} {:?}", runtime.display(), args);
    info!("Segmenting {}", request.item.image);

    Command::new(runtime)
        .args(&args)
        .envs(env.vars().iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .status()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> WorkItem {
        WorkItem {
            image: "sub-01/anat/sub-01_T1w.nii.gz".to_string(),
            prefix: "sub-01/anat/sub-01".to_string(),
            suffix: "T1w".to_string(),
            mask: PathBuf::from("sub-01/anat/sub-01_space-T1w_desc-brain_mask.nii.gz"),
        }
    }

    fn args_as_strings(request: &SegmentationRequest) -> Vec<String> {
        request
            .command_args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_command_args_default() {
        let item = item();
        let request = SegmentationRequest {
            container: Path::new("/images/synthseg.sif"),
            input_dataset: Path::new("/data/in"),
            mask_dataset: Path::new("/data/masks"),
            scratch: Path::new("/scratch/job"),
            item: &item,
            options: RuntimeOptions::default(),
        };
        let args = args_as_strings(&request);
        assert_eq!(
            args,
            vec![
                "run",
                "--cleanenv",
                "-B",
                "/data/in:/input,/data/masks:/masks,/scratch/job:/output",
                "/images/synthseg.sif",
                "--input",
                "/input/sub-01/anat/sub-01_T1w.nii.gz",
                "--mask",
                "/masks/sub-01/anat/sub-01_space-T1w_desc-brain_mask.nii.gz",
                "--output",
                "/output/sub-01/anat/sub-01",
                "--qc",
                "--volumes",
                "--resample-orig",
            ]
        );
    }

    #[test]
    fn test_command_args_flags() {
        let item = item();
        let request = SegmentationRequest {
            container: Path::new("c.sif"),
            input_dataset: Path::new("in"),
            mask_dataset: Path::new("masks"),
            scratch: Path::new("work"),
            item: &item,
            options: RuntimeOptions {
                gpu: true,
                posteriors: true,
                antsct: true,
            },
        };
        let args = args_as_strings(&request);
        assert_eq!(args[2], "--nv");
        assert!(args.contains(&"--posteriors".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--antsct"));
        assert!(args.iter().all(|a| !a.is_empty()));
    }

    #[test]
    fn test_runtime_env_pins_threads() {
        let env = RuntimeEnv::default();
        assert!(env
            .vars()
            .contains(&("SINGULARITYENV_OMP_NUM_THREADS".to_string(), "1".to_string())));
        assert!(env.vars().iter().any(|(k, _)| k == "PYTHONUNBUFFERED"));
    }

    #[test]
    fn test_container_info_from_inspect() {
        let json = r#"{"data": {"attributes": {"labels": {
            "org.opencontainers.image.version": "2.0",
            "org.opencontainers.image.source": "https://github.com/BBillot/SynthSeg",
            "org.opencontainers.image.ref.name": "synthseg:2.0"
        }}}, "type": "container"}"#;
        let info = ContainerInfo::from_path("singularity", Path::new("/c/synthseg_2.0.sif"))
            .with_inspect_json(json)
            .unwrap();
        assert_eq!(info.tag, "synthseg:2.0");
        assert_eq!(info.version.as_deref(), Some("2.0"));

        let generated_by = info.generated_by();
        assert_eq!(generated_by.name, "SynthSeg");
        assert_eq!(
            generated_by.code_url.as_deref(),
            Some("https://github.com/BBillot/SynthSeg")
        );
    }

    #[test]
    fn test_container_info_without_labels() {
        let info = ContainerInfo::from_path("apptainer", Path::new("/c/synthseg_2.0.sif"))
            .with_inspect_json(r#"{"data": {"attributes": {}}}"#)
            .unwrap();
        assert_eq!(info.tag, "synthseg_2.0.sif");
        assert_eq!(info.runtime, "singularity");
        assert!(info.version.is_none());
    }

    #[test]
    fn test_find_runtime_missing() {
        let result = find_runtime("surely-not-a-container-runtime-xyz");
        assert!(matches!(result, Err(Error::RuntimeNotFound(_))));
    }
}
