//! End-to-end verification runs over synthetic conversion outputs.
//!
//! Each test writes a directory of `DWI_*` artifacts the way a correct (or
//! deliberately broken) converter would, then runs the full pipeline on it.

use std::fs;
use std::path::Path;

use dwimeta::nifti::{save_header, NiftiHeader};
use dwimeta::verify::MismatchDetail;
use dwimeta::{
    verify_directory, AcquisitionId, AcquisitionSpace, CanonicalFrame, FailureClass, FileFormat,
    HeaderTransformSource, MismatchCategory, OrientationTransform, Plane, VerifyConfig,
    FILE_FORMATS,
};
use serde_json::json;
use tempfile::TempDir;

/// How image axes are laid out relative to the acquisition.
#[derive(Clone, Copy)]
enum Layout {
    /// Third voxel axis along the plane normal, as dcm2niix writes.
    SliceAligned,
    /// Like `SliceAligned` with the first voxel axis reversed.
    Flipped,
}

#[derive(Clone, Copy, Default)]
struct Corruption {
    omit_slice_code: bool,
    reverse_phase: bool,
    negate_gradients: bool,
}

fn frame() -> &'static CanonicalFrame {
    CanonicalFrame::standard()
}

fn transform_for(acquisition: &AcquisitionId, layout: Layout) -> OrientationTransform {
    let mut rows = match acquisition.plane {
        Plane::Tra => [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
        Plane::Cor => [[1, 0, 0], [0, 0, -1], [0, 1, 0]],
        Plane::Sag => [[0, 0, -1], [1, 0, 0], [0, 1, 0]],
    };
    if let Layout::Flipped = layout {
        for row in rows.iter_mut() {
            row[0] = -row[0];
        }
    }
    OrientationTransform::from_rows(rows).unwrap()
}

/// Voxel-space direction for an anatomical one (inverse of a signed permutation).
fn to_voxel(t: &OrientationTransform, anatomical: [i32; 3]) -> [i32; 3] {
    let r = t.rows();
    [0, 1, 2].map(|j| (0..3).map(|i| r[i][j] * anatomical[i]).sum())
}

/// Voxel vector as FSL stores it.
fn to_fsl(t: &OrientationTransform, voxel: [i32; 3]) -> [i32; 3] {
    let mut v = voxel;
    if t.determinant() > 0 {
        v[0] = -v[0];
    }
    v
}

fn axis_code(voxel: [i32; 3]) -> &'static str {
    match voxel {
        [1, 0, 0] => "i",
        [-1, 0, 0] => "i-",
        [0, 1, 0] => "j",
        [0, -1, 0] => "j-",
        [0, 0, 1] => "k",
        [0, 0, -1] => "k-",
        other => panic!("not an axis: {other:?}"),
    }
}

fn join(v: &[i32]) -> String {
    v.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
}

fn write_nifti(path: &Path, t: &OrientationTransform) {
    let mut affine = [[0.0; 4]; 4];
    for (i, row) in t.rows().iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            affine[i][j] = 2.0 * f64::from(v);
        }
    }
    affine[0][3] = -96.0;
    affine[1][3] = 120.0;
    affine[2][3] = -60.0;
    affine[3][3] = 1.0;
    save_header(&NiftiHeader::with_affine(affine), path).unwrap();
}

fn mrtrix_header(t: &OrientationTransform, extra: &[String]) -> String {
    let mut text = String::from("mrtrix image\ndim: 96,96,60,4\nvox: 2,2,2,1\n");
    for (row, offset) in t.rows().iter().zip([-96, 120, -60]) {
        text.push_str(&format!("transform: {},{},{},{}\n", row[0], row[1], row[2], offset));
    }
    for line in extra {
        text.push_str(line);
        text.push('\n');
    }
    text.push_str("file: DWI.dat\nEND\n");
    text
}

/// Write every artifact `format` stores for `acquisition`.
fn write_acquisition(
    dir: &Path,
    format: &FileFormat,
    acquisition: &AcquisitionId,
    layout: Layout,
    corruption: Corruption,
) {
    let t = transform_for(acquisition, layout);
    let path = |ext: &str| acquisition.artifact_path(dir, ext);

    let mut pe_anatomical = acquisition.expected_phase_encoding(frame());
    if corruption.reverse_phase {
        pe_anatomical = pe_anatomical.map(|c| -c);
    }
    let pe_voxel = to_voxel(&t, pe_anatomical);

    // Third voxel axis is the positive plane normal; descending order shows in the timing.
    let timing: Vec<f64> = match acquisition.slice_order {
        dwimeta::SliceOrder::Asc => vec![0.0, 0.5, 1.0, 1.5],
        dwimeta::SliceOrder::Des => vec![1.5, 1.0, 0.5, 0.0],
    };

    let sign = if corruption.negate_gradients { -1 } else { 1 };
    let fiducials = frame().fiducials().map(|row| row.map(|c| c * sign));
    let bmatrix: Vec<String> = std::iter::once([0, 0, 0, 0])
        .chain(fiducials.iter().map(|f| [f[0], f[1], f[2], 1000]))
        .map(|row| join(&row))
        .collect();

    let sidecar = || {
        let mut value = json!({
            "PhaseEncodingDirection": axis_code(pe_voxel),
            "SliceTiming": timing,
            "EchoTime": 0.09,
        });
        if !corruption.omit_slice_code {
            value["SliceEncodingDirection"] = json!("k");
        }
        fs::write(path("json"), value.to_string()).unwrap();
    };

    match format.symbolic_name {
        "niibvecbvaljson" => {
            write_nifti(&path("nii"), &t);
            sidecar();
            let stored: Vec<[i32; 3]> = fiducials.iter().map(|f| to_fsl(&t, to_voxel(&t, *f))).collect();
            let bvec: Vec<String> = (0..3)
                .map(|axis| {
                    let mut row = vec![0];
                    row.extend(stored.iter().map(|v| v[axis]));
                    join(&row)
                })
                .collect();
            fs::write(path("bvec"), bvec.join("\n") + "\n").unwrap();
            fs::write(path("bval"), "0 1000 1000 1000\n").unwrap();
        }
        "niieddy" => {
            write_nifti(&path("nii"), &t);
            let row = to_fsl(&t, pe_voxel);
            fs::write(path("eddycfg"), format!("{} 0.1\n", join(&row))).unwrap();
            fs::write(path("eddyidx"), "1 1 1 1\n").unwrap();
        }
        "niitopup" => {
            write_nifti(&path("nii"), &t);
            let row = format!("{} 0.1\n", join(&to_fsl(&t, pe_voxel)));
            fs::write(path("topup"), row.repeat(4)).unwrap();
        }
        "mih" => {
            let mut extra = vec![
                format!("PhaseEncodingDirection: {}", axis_code(pe_voxel)),
                format!(
                    "SliceTiming: {}",
                    timing.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
                ),
            ];
            if !corruption.omit_slice_code {
                extra.push("SliceEncodingDirection: k".to_string());
            }
            extra.extend(bmatrix.iter().map(|row| format!("dw_scheme: {}", row.replace(' ', ","))));
            fs::write(path("mih"), mrtrix_header(&t, &extra)).unwrap();
        }
        "mifjsongrad" => {
            fs::write(path("mif"), mrtrix_header(&t, &[])).unwrap();
            sidecar();
            let grad = format!("# command_history: mrconvert\n{}\n", bmatrix.join("\n"));
            fs::write(path("grad"), grad).unwrap();
        }
        "mifpetable" => {
            fs::write(path("mif"), mrtrix_header(&t, &[])).unwrap();
            let row = format!("{} 0.1\n", join(&pe_voxel));
            fs::write(path("petable"), row.repeat(4)).unwrap();
        }
        other => panic!("unhandled format {other}"),
    }
}

fn populate(format: &FileFormat, layout: Layout, corruption: Corruption) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for acquisition in &AcquisitionSpace::generate(frame()) {
        write_acquisition(dir.path(), format, acquisition, layout, corruption);
    }
    dir
}

fn format(name: &str) -> FileFormat {
    FileFormat::by_name(name).unwrap()
}

#[test]
fn test_correct_outputs_verify_clean_in_every_format() {
    for layout in [Layout::SliceAligned, Layout::Flipped] {
        for format in FILE_FORMATS {
            let dir = populate(&format, layout, Corruption::default());
            let report = verify_directory(
                format.symbolic_name,
                dir.path(),
                &format,
                &VerifyConfig::default(),
                &HeaderTransformSource,
            )
            .unwrap();
            assert_eq!(report.acquisitions, 24);
            assert!(report.is_clean(), "{}", report);
        }
    }
}

#[test]
fn test_parallel_matches_sequential() {
    let format = format("niibvecbvaljson");
    let corruption = Corruption {
        reverse_phase: true,
        ..Default::default()
    };
    let dir = populate(&format, Layout::Flipped, corruption);
    let sequential = VerifyConfig::default();
    let parallel = VerifyConfig::default().parallel(true);

    let a = verify_directory("t", dir.path(), &format, &sequential, &HeaderTransformSource).unwrap();
    let b = verify_directory("t", dir.path(), &format, &parallel, &HeaderTransformSource).unwrap();
    let c = verify_directory("t", dir.path(), &format, &sequential, &HeaderTransformSource).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert_eq!(a.mismatches(MismatchCategory::PhaseEncoding).len(), 24);
}

#[test]
fn test_reversed_phase_encoding_is_reported() {
    for name in ["niitopup", "niieddy", "mifpetable", "mih"] {
        let format = format(name);
        let corruption = Corruption {
            reverse_phase: true,
            ..Default::default()
        };
        let dir = populate(&format, Layout::SliceAligned, corruption);
        let report = verify_directory(
            name,
            dir.path(),
            &format,
            &VerifyConfig::default(),
            &HeaderTransformSource,
        )
        .unwrap();
        let mismatches = report.mismatches(MismatchCategory::PhaseEncoding);
        assert_eq!(mismatches.len(), 24, "{}", name);
        for m in mismatches {
            match &m.detail {
                MismatchDetail::PhaseEncoding { observed, expected, .. } => {
                    assert_eq!(observed.map(|c| -c), *expected);
                }
                other => panic!("unexpected detail {other:?}"),
            }
        }
        assert!(report.failures().is_empty());
    }
}

#[test]
fn test_negated_gradients_are_antipodal() {
    for name in ["niibvecbvaljson", "mifjsongrad", "mih"] {
        let format = format(name);
        let corruption = Corruption {
            negate_gradients: true,
            ..Default::default()
        };
        let dir = populate(&format, Layout::Flipped, corruption);
        let report = verify_directory(
            name,
            dir.path(),
            &format,
            &VerifyConfig::default(),
            &HeaderTransformSource,
        )
        .unwrap();
        assert_eq!(report.mismatches(MismatchCategory::GradientTable).len(), 24);
        assert_eq!(report.antipodal_count(), 24);
        assert!(report.to_string().contains("ANTIPODAL"));
        assert!(report.mismatches(MismatchCategory::PhaseEncoding).is_empty());
    }
}

#[test]
fn test_missing_artifact_does_not_abort_run() {
    let format = format("niibvecbvaljson");
    let dir = populate(&format, Layout::SliceAligned, Corruption::default());
    let victim = AcquisitionSpace::generate(frame()).as_slice()[5];
    fs::remove_file(victim.artifact_path(dir.path(), "bvec")).unwrap();

    let report = verify_directory(
        "missing",
        dir.path(),
        &format,
        &VerifyConfig::default(),
        &HeaderTransformSource,
    )
    .unwrap();
    assert_eq!(report.total_mismatches(), 0);
    assert_eq!(report.failures().len(), 1);
    let failure = &report.failures()[0];
    assert_eq!(failure.acquisition, victim);
    assert_eq!(failure.class, FailureClass::NotFound);
    assert!(failure.message.contains("FSL bvecs"));
}

#[test]
fn test_missing_image_is_not_found() {
    let format = format("niitopup");
    let dir = populate(&format, Layout::SliceAligned, Corruption::default());
    let victim = AcquisitionSpace::generate(frame()).as_slice()[0];
    fs::remove_file(victim.artifact_path(dir.path(), "nii")).unwrap();

    let report = verify_directory(
        "missing",
        dir.path(),
        &format,
        &VerifyConfig::default(),
        &HeaderTransformSource,
    )
    .unwrap();
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].class, FailureClass::NotFound);
}

#[test]
fn test_failures_name_the_offending_file() {
    let format = format("niibvecbvaljson");
    let dir = populate(&format, Layout::SliceAligned, Corruption::default());
    let space = AcquisitionSpace::generate(frame());
    let (oblique, bad_code) = (space.as_slice()[0], space.as_slice()[1]);

    let image = oblique.artifact_path(dir.path(), "nii");
    let s = std::f64::consts::FRAC_1_SQRT_2;
    let affine = [
        [2.0 * s, -2.0 * s, 0.0, 0.0],
        [2.0 * s, 2.0 * s, 0.0, 0.0],
        [0.0, 0.0, 2.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
    save_header(&NiftiHeader::with_affine(affine), &image).unwrap();

    let sidecar = bad_code.artifact_path(dir.path(), "json");
    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&sidecar).unwrap()).unwrap();
    value["PhaseEncodingDirection"] = json!("x+");
    fs::write(&sidecar, value.to_string()).unwrap();

    let report = verify_directory(
        "paths",
        dir.path(),
        &format,
        &VerifyConfig::default(),
        &HeaderTransformSource,
    )
    .unwrap();
    assert_eq!(report.failures().len(), 2);
    let failure = |acquisition| {
        report
            .failures()
            .iter()
            .find(|f| f.acquisition == acquisition)
            .unwrap()
    };

    let f = failure(oblique);
    assert_eq!(f.class, FailureClass::Decode);
    assert!(f.message.contains("signed permutation"), "{}", f.message);
    assert!(f.message.contains(&image.display().to_string()), "{}", f.message);

    let f = failure(bad_code);
    assert_eq!(f.class, FailureClass::Decode);
    assert!(f.message.contains("\"x+\""), "{}", f.message);
    assert!(f.message.contains(&sidecar.display().to_string()), "{}", f.message);
}

#[test]
fn test_inconsistent_petable_is_invariant_failure() {
    let format = format("mifpetable");
    let dir = populate(&format, Layout::SliceAligned, Corruption::default());
    let victim = AcquisitionSpace::generate(frame()).as_slice()[10];
    fs::write(
        victim.artifact_path(dir.path(), "petable"),
        "0 1 0 0.1\n0 -1 0 0.1\n",
    )
    .unwrap();

    let report = verify_directory(
        "petable",
        dir.path(),
        &format,
        &VerifyConfig::default(),
        &HeaderTransformSource,
    )
    .unwrap();
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].class, FailureClass::Invariant);
    assert_eq!(report.total_mismatches(), 0);
}

#[test]
fn test_omitted_slice_code_needs_default() {
    let format = format("niibvecbvaljson");
    let corruption = Corruption {
        omit_slice_code: true,
        ..Default::default()
    };
    let dir = populate(&format, Layout::SliceAligned, corruption);

    let strict = verify_directory(
        "dcm2niix",
        dir.path(),
        &format,
        &VerifyConfig::default(),
        &HeaderTransformSource,
    )
    .unwrap();
    assert_eq!(strict.failures().len(), 24);
    assert!(strict.failures().iter().all(|f| f.class == FailureClass::Decode));

    let lenient = verify_directory(
        "dcm2niix",
        dir.path(),
        &format,
        &VerifyConfig::default().default_slice_encoding("k"),
        &HeaderTransformSource,
    )
    .unwrap();
    assert!(lenient.is_clean(), "{}", lenient);
}

#[test]
fn test_report_serializes_to_json() {
    let format = format("mih");
    let corruption = Corruption {
        negate_gradients: true,
        ..Default::default()
    };
    let dir = populate(&format, Layout::SliceAligned, corruption);
    let report = verify_directory(
        "mrconvert",
        dir.path(),
        &format,
        &VerifyConfig::default().skip_phase_encoding().skip_slice_encoding(),
        &HeaderTransformSource,
    )
    .unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["format"], "mih");
    assert_eq!(value["tests"]["phase_encoding"], false);
    assert_eq!(value["gradient_table"].as_array().unwrap().len(), 24);
    assert_eq!(value["gradient_table"][0]["antipodal"], true);
}
