mod common;

use std::io::Write;

use common::DicomSpec;
use flate2::Compression;
use flate2::write::GzEncoder;
use medgif::{
    ConvertError, ExtractOptions, FileType, InputFile, Interpolation, LoadOptions, Mode,
    Orientation, SortBy, VolumeLoader,
};
use ndarray::{Array3, Array4};

/// value = 100*z + 10*y + x over (x, y, z) = (4, 3, 2)
fn coded_nifti_array() -> Array3<f32> {
    Array3::from_shape_fn((4, 3, 2), |(x, y, z)| (100 * z + 10 * y + x) as f32)
}

#[test]
fn test_nifti_axial_plane_has_anterior_on_top() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_nifti(
        dir.path(),
        "coded.nii",
        &common::plain_header(),
        &coded_nifti_array().into_dyn(),
    );
    let volume = VolumeLoader::load_from_file_paths(&[&path], &LoadOptions::default()).unwrap();

    assert_eq!(volume.dim(), (1, 2, 3, 4));
    assert_eq!(volume.info().file_type, FileType::Nifti);
    assert!(!volume.info().reoriented);

    let plane = volume.get_slice_from_axis(0, 1, &Orientation::Axial).unwrap();
    assert_eq!(plane[[0, 0]], 120.0);
    assert_eq!(plane[[2, 3]], 103.0);
}

#[test]
fn test_gzipped_nifti_loads_like_plain() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_nifti(
        dir.path(),
        "coded.nii",
        &common::plain_header(),
        &coded_nifti_array().into_dyn(),
    );
    let plain = std::fs::read(&path).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&plain).unwrap();
    let gz = encoder.finish().unwrap();

    let a = VolumeLoader::load(&[InputFile::new("a.nii", plain)], &LoadOptions::default()).unwrap();
    let b = VolumeLoader::load(&[InputFile::new("a.nii.gz", gz)], &LoadOptions::default()).unwrap();
    assert_eq!(a.data(), b.data());
}

#[test]
fn test_flipped_sform_is_reoriented_to_ras() {
    let dir = tempfile::tempdir().unwrap();
    let mut header = common::plain_header();
    header.sform_code = 1;
    header.srow_x = [-1.0, 0.0, 0.0, 0.0];
    header.srow_y = [0.0, 1.0, 0.0, 0.0];
    header.srow_z = [0.0, 0.0, 1.0, 0.0];
    let path = common::write_nifti(dir.path(), "las.nii", &header, &coded_nifti_array().into_dyn());

    let volume = VolumeLoader::load_from_file_paths(&[&path], &LoadOptions::default()).unwrap();
    assert!(volume.info().reoriented);
    let plane = volume.get_slice_from_axis(0, 1, &Orientation::Axial).unwrap();
    // the stored x axis ran right to left; column 0 is now patient left
    assert_eq!(plane[[0, 0]], 123.0);
}

#[test]
fn test_thick_slices_are_corrected_in_coronal_view() {
    let dir = tempfile::tempdir().unwrap();
    let mut header = common::plain_header();
    header.pixdim[3] = 3.0;
    let path = common::write_nifti(dir.path(), "thick.nii", &header, &coded_nifti_array().into_dyn());
    let volume = VolumeLoader::load_from_file_paths(&[&path], &LoadOptions::default()).unwrap();

    let corrected = volume.extract_slices(&ExtractOptions {
        orientation: Orientation::Coronal,
        ..Default::default()
    });
    assert_eq!(corrected.len(), 3);
    assert_eq!(corrected[0].data.dim(), (6, 4));

    let raw = volume.extract_slices(&ExtractOptions {
        orientation: Orientation::Coronal,
        interpolation: Interpolation::None,
        ..Default::default()
    });
    assert_eq!(raw[0].data.dim(), (2, 4));
}

#[test]
fn test_4d_series_plays_one_plane_over_time() {
    let dir = tempfile::tempdir().unwrap();
    let data = Array4::from_shape_fn((2, 2, 3, 5), |(x, y, z, t)| {
        (1000 * t + 100 * z + 10 * y + x) as f32
    });
    let path = common::write_nifti(dir.path(), "fmri.nii", &common::plain_header(), &data.into_dyn());
    let volume = VolumeLoader::load_from_file_paths(&[&path], &LoadOptions::default()).unwrap();
    assert_eq!(volume.timepoints(), 5);

    let series = volume.extract_slices(&ExtractOptions {
        mode: Mode::Series,
        ..Default::default()
    });
    assert_eq!(series.len(), 5);
    for (t, slice) in series.iter().enumerate() {
        // middle plane z = 1, top-left is y = 1 (anterior), x = 0
        assert_eq!(slice.data[[0, 0]], (1000 * t + 110) as f32);
    }

    let volume_mode = volume.extract_slices(&ExtractOptions::default());
    assert_eq!(volume_mode.len(), 3);
    assert_eq!(volume_mode[2].data[[0, 0]], 210.0);
}

#[test]
fn test_voxel_limit_fails_before_decoding() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_nifti(
        dir.path(),
        "coded.nii",
        &common::plain_header(),
        &coded_nifti_array().into_dyn(),
    );
    let options = LoadOptions {
        max_voxels: 10,
        ..Default::default()
    };
    let err = VolumeLoader::load_from_file_paths(&[&path], &options).unwrap_err();
    assert!(matches!(
        err,
        ConvertError::ResourceExceeded {
            actual: 24,
            limit: 10,
            ..
        }
    ));
}

fn slice_file(dir: &std::path::Path, name: &str, value: u16, instance: i32, z: f64) -> InputFile {
    let pixels = [value; 6];
    let bytes = common::dicom_bytes(
        dir,
        name,
        &DicomSpec {
            rows: 2,
            columns: 3,
            pixels: &pixels,
            frames: 1,
            instance_number: Some(instance),
            position_z: Some(z),
            series_uid: None,
        },
    );
    InputFile::new(name, bytes)
}

#[test]
fn test_dicom_series_sorted_along_slice_normal() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        slice_file(dir.path(), "a.dcm", 101, 1, 10.0),
        slice_file(dir.path(), "b.dcm", 1, 2, 0.0),
        slice_file(dir.path(), "c.dcm", 51, 3, 5.0),
    ];
    let volume = VolumeLoader::load(&files, &LoadOptions::default()).unwrap();

    assert_eq!(volume.dim(), (1, 3, 2, 3));
    assert_eq!(volume.info().file_type, FileType::Dicom);
    assert_eq!(volume.info().modality.as_deref(), Some("CT"));
    let firsts: Vec<f32> = (0..3).map(|z| volume.data()[[0, z, 0, 0]]).collect();
    assert_eq!(firsts, vec![1.0, 51.0, 101.0]);

    let (sx, sy, sz) = volume.spacing();
    assert!((sx - 0.5).abs() < 1e-6 && (sy - 0.5).abs() < 1e-6);
    assert!((sz - 5.0).abs() < 1e-6);
}

#[test]
fn test_dicom_series_sorted_by_instance_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        slice_file(dir.path(), "a.dcm", 101, 1, 10.0),
        slice_file(dir.path(), "b.dcm", 1, 2, 0.0),
        slice_file(dir.path(), "c.dcm", 51, 3, 5.0),
    ];
    let options = LoadOptions {
        sort_by: SortBy::InstanceNumber,
        ..Default::default()
    };
    let volume = VolumeLoader::load(&files, &options).unwrap();
    let firsts: Vec<f32> = (0..3).map(|z| volume.data()[[0, z, 0, 0]]).collect();
    assert_eq!(firsts, vec![101.0, 1.0, 51.0]);
}

#[test]
fn test_same_position_series_falls_back_to_instance_order() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        slice_file(dir.path(), "c.dcm", 300, 3, 0.0),
        slice_file(dir.path(), "a.dcm", 100, 1, 0.0),
        slice_file(dir.path(), "b.dcm", 200, 2, 0.0),
    ];

    for sort_by in [SortBy::Auto, SortBy::ImagePositionPatient] {
        let options = LoadOptions {
            sort_by,
            ..Default::default()
        };
        let volume = VolumeLoader::load(&files, &options).unwrap();
        let firsts: Vec<f32> = (0..3).map(|z| volume.data()[[0, z, 0, 0]]).collect();
        assert_eq!(firsts, vec![100.0, 200.0, 300.0], "{sort_by:?}");
    }
}

#[test]
fn test_multiframe_dicom_keeps_frame_order() {
    let dir = tempfile::tempdir().unwrap();
    let pixels: Vec<u16> = (0..4u16).flat_map(|f| [f * 10; 4]).collect();
    let bytes = common::dicom_bytes(
        dir.path(),
        "cine.dcm",
        &DicomSpec {
            rows: 2,
            columns: 2,
            pixels: &pixels,
            frames: 4,
            instance_number: None,
            position_z: None,
            series_uid: None,
        },
    );
    let volume = VolumeLoader::load(&[InputFile::new("cine.dcm", bytes)], &LoadOptions::default()).unwrap();

    assert_eq!(volume.info().file_type, FileType::DicomMultiframe);
    let series = volume.extract_slices(&ExtractOptions {
        mode: Mode::Series,
        ..Default::default()
    });
    let firsts: Vec<f32> = series.iter().map(|s| s.data[[0, 0]]).collect();
    assert_eq!(firsts, vec![0.0, 10.0, 20.0, 30.0]);
}

#[test]
fn test_largest_series_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let slice = |name: &str, value: u16, z: f64, series: &str| {
        let pixels = [value; 4];
        let bytes = common::dicom_bytes(
            dir.path(),
            name,
            &DicomSpec {
                rows: 2,
                columns: 2,
                pixels: &pixels,
                frames: 1,
                instance_number: Some(1),
                position_z: Some(z),
                series_uid: Some(series),
            },
        );
        InputFile::new(name, bytes)
    };
    let files = vec![
        slice("scout.dcm", 999, 0.0, "1.2.3.1"),
        slice("b.dcm", 20, 2.0, "1.2.3.2"),
        slice("a.dcm", 10, 1.0, "1.2.3.2"),
    ];
    let volume = VolumeLoader::load(&files, &LoadOptions::default()).unwrap();

    assert_eq!(volume.dim(), (1, 2, 2, 2));
    let firsts: Vec<f32> = (0..2).map(|z| volume.data()[[0, z, 0, 0]]).collect();
    assert_eq!(firsts, vec![10.0, 20.0]);
}

#[test]
fn test_mismatched_dicom_sizes_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let small = common::dicom_bytes(
        dir.path(),
        "small.dcm",
        &DicomSpec {
            rows: 2,
            columns: 2,
            pixels: &[0; 4],
            frames: 1,
            instance_number: Some(1),
            position_z: Some(0.0),
            series_uid: None,
        },
    );
    let large = common::dicom_bytes(
        dir.path(),
        "large.dcm",
        &DicomSpec {
            rows: 3,
            columns: 2,
            pixels: &[0; 6],
            frames: 1,
            instance_number: Some(2),
            position_z: Some(1.0),
            series_uid: None,
        },
    );
    let files = [InputFile::new("small.dcm", small), InputFile::new("large.dcm", large)];
    let err = VolumeLoader::load(&files, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::InconsistentGeometry { .. }));
}

#[test]
fn test_nifti_mixed_with_dicom_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_nifti(
        dir.path(),
        "coded.nii",
        &common::plain_header(),
        &coded_nifti_array().into_dyn(),
    );
    let files = [
        common::input_from_path(&path),
        slice_file(dir.path(), "a.dcm", 1, 1, 0.0),
    ];
    let err = VolumeLoader::load(&files, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedFormat(_)));
}
