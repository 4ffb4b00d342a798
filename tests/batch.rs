use std::fs;
use std::path::{Path, PathBuf};

use synthseg_bids::{process_dataset, Args, Error};

// Stands in for singularity: answers `inspect` and writes SynthSeg-named
// outputs under the scratch bind mount on `run`. Every run appends its
// --input to runs.log next to the script. Inputs with acq-crash write their
// outputs then exit 3; inputs with acq-broken exit 1 without writing.
#[cfg(unix)]
const FAKE_RUNTIME: &str = r#"#!/bin/sh
if [ "$1" = "inspect" ]; then
    echo '{"data": {"attributes": {"labels": {"org.opencontainers.image.version": "2.0"}}}}'
    exit 0
fi
binds=""
out=""
image=""
while [ $# -gt 0 ]; do
    case "$1" in
        -B) binds="$2"; shift ;;
        --input) image="$2"; shift ;;
        --output) out="$2"; shift ;;
    esac
    shift
done
echo "$image" >> "$(dirname "$0")/runs.log"
case "$image" in
    *acq-broken*) exit 1 ;;
esac
scratch=$(echo "$binds" | tr ',' '\n' | grep ':/output$' | sed 's#:/output$##')
prefix="$scratch${out#/output}"
mkdir -p "$(dirname "$prefix")"
for f in SynthSeg.nii.gz SynthSegInput.nii.gz SynthSegOrig.nii.gz; do
    echo nii > "$prefix$f"
done
printf 'subject,general white matter\nsub,0.9\n' > "${prefix}SynthSegQC.csv"
printf 'subject,total intracranial\nsub,1500\n' > "${prefix}Volumes.csv"
case "$image" in
    *acq-crash*) exit 3 ;;
esac
"#;

struct Fixture {
    _root: tempfile::TempDir,
    input: PathBuf,
    masks: PathBuf,
    output: PathBuf,
    scratch: PathBuf,
    container: PathBuf,
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"nii").unwrap();
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("rawdata");
    let masks = root.path().join("masks");
    let output = root.path().join("derivatives/synthseg");
    let scratch = root.path().join("scratch");
    let container = root.path().join("synthseg_2.0.sif");

    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("dataset_description.json"), r#"{"Name": "study"}"#).unwrap();
    touch(&input.join("sub-01/anat/sub-01_T1w.nii.gz"));
    touch(&input.join("sub-02/anat/sub-02_T1w.nii.gz"));
    touch(&masks.join("sub-01/anat/sub-01_space-T1w_desc-brain_mask.nii.gz"));
    touch(&container);

    Fixture {
        _root: root,
        input,
        masks,
        output,
        scratch,
        container,
    }
}

fn args(fixture: &Fixture, runtime: String, images: Vec<String>) -> Args {
    Args {
        container: fixture.container.clone(),
        input_dataset: fixture.input.clone(),
        mask_dataset: fixture.masks.clone(),
        output_dataset: fixture.output.clone(),
        anatomical_images: images,
        gpu: false,
        posteriors: false,
        antsct: false,
        no_csf_label: false,
        runtime,
        scratch_dir: Some(fixture.scratch.clone()),
        job_id: Some("1234".to_string()),
        lock_timeout: 5,
    }
}

#[test]
fn test_missing_runtime_is_fatal() {
    let fixture = fixture();
    let args = args(
        &fixture,
        "no-such-container-runtime".to_string(),
        vec!["sub-01/anat/sub-01_T1w.nii.gz".to_string()],
    );

    let result = process_dataset(&args);
    assert!(matches!(result, Err(Error::RuntimeNotFound(_))));
    assert!(!fixture.output.exists());
}

#[cfg(unix)]
#[test]
fn test_batch_segments_and_skips() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = fixture();
    let runtime = fixture.scratch.with_file_name("fake-singularity");
    fs::write(&runtime, FAKE_RUNTIME).unwrap();
    fs::set_permissions(&runtime, fs::Permissions::from_mode(0o755)).unwrap();

    let runs_log = runtime.with_file_name("runs.log");
    let runs = || -> Vec<String> {
        fs::read_to_string(&runs_log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    };

    // sub-04 has two candidate masks
    touch(&fixture.input.join("sub-04/anat/sub-04_T1w.nii.gz"));
    touch(&fixture.masks.join("sub-04/anat/sub-04_space-T1w_desc-brain_mask.nii.gz"));
    touch(&fixture.masks.join("sub-04/anat/sub-04_space-MNI_desc-brain_mask.nii.gz"));
    for name in ["sub-05_acq-crash", "sub-06_acq-broken"] {
        let subject = &name[..6];
        touch(&fixture.input.join(format!("{}/anat/{}_T1w.nii.gz", subject, name)));
        touch(&fixture.masks.join(format!(
            "{}/anat/{}_space-T1w_desc-brain_mask.nii.gz",
            subject, name
        )));
    }

    let images = vec![
        "sub-01/anat/sub-01_T1w.nii.gz".to_string(),
        "sub-02/anat/sub-02_T1w.nii.gz".to_string(),
        "sub-03/anat/sub-03_T1w.nii.gz".to_string(),
        "sub-04/anat/sub-04_T1w.nii.gz".to_string(),
        "sub-05/anat/sub-05_acq-crash_T1w.nii.gz".to_string(),
        "sub-06/anat/sub-06_acq-broken_T1w.nii.gz".to_string(),
    ];
    let args = args(&fixture, runtime.to_string_lossy().into_owned(), images);

    let stats = process_dataset(&args).unwrap();
    assert_eq!(stats.total_images, 6);
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.skipped_mask_missing, 1);
    assert_eq!(stats.skipped_input_missing, 1);
    assert_eq!(stats.skipped_mask_ambiguous, 1);
    assert_eq!(stats.failed, 1);

    // Skipped images never reach the container
    assert_eq!(
        runs(),
        vec![
            "/input/sub-01/anat/sub-01_T1w.nii.gz",
            "/input/sub-05/anat/sub-05_acq-crash_T1w.nii.gz",
            "/input/sub-06/anat/sub-06_acq-broken_T1w.nii.gz",
        ]
    );

    // A non-zero exit with complete outputs is still mapped
    let crashed = fixture.output.join("sub-05/anat");
    assert!(crashed.join("sub-05_acq-crash_space-SynthSeg_dseg.nii.gz").is_file());
    assert!(crashed.join("sub-05_acq-crash_desc-volumes.tsv").is_file());

    // Without outputs nothing marks the image as done
    assert!(!fixture
        .output
        .join("sub-06/anat/sub-06_acq-broken_space-SynthSeg_dseg.nii.gz")
        .exists());

    let anat = fixture.output.join("sub-01/anat");
    for name in [
        "sub-01_space-SynthSeg_dseg.nii.gz",
        "sub-01_space-SynthSeg_dseg.tsv",
        "sub-01_space-SynthSeg_T1w.nii.gz",
        "sub-01_space-orig_dseg.nii.gz",
        "sub-01_space-orig_dseg.tsv",
        "sub-01_desc-qc.tsv",
        "sub-01_desc-volumes.tsv",
    ] {
        assert!(anat.join(name).is_file(), "missing {}", name);
    }
    assert_eq!(
        fs::read_to_string(anat.join("sub-01_desc-qc.tsv")).unwrap(),
        "subject\tgeneral_white_matter\nsub\t0.9\n"
    );

    let description: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(fixture.output.join("dataset_description.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(description["Name"], "study_synthseg");
    assert_eq!(description["GeneratedBy"][0]["Version"], "2.0");
    assert_eq!(description["GeneratedBy"][0]["Container"]["Tag"], "synthseg_2.0.sif");

    // Scratch directory is cleaned up when the batch ends
    assert_eq!(fs::read_dir(&fixture.scratch).unwrap().count(), 0);

    // A rerun leaves finished images alone and does not grow GeneratedBy
    let stats = process_dataset(&args).unwrap();
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.skipped_existing, 2);
    assert_eq!(stats.failed, 1);
    let reruns = runs();
    assert_eq!(reruns.len(), 4);
    assert_eq!(reruns[3], "/input/sub-06/anat/sub-06_acq-broken_T1w.nii.gz");

    let description: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(fixture.output.join("dataset_description.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(description["GeneratedBy"].as_array().unwrap().len(), 1);
}
