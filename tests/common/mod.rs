#![allow(dead_code)]

use std::path::{Path, PathBuf};

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, uids};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use medgif::{FileType, InputFile, Volume, VolumeInfo};
use ndarray::{Array4, ArrayD};
use nifti::NiftiHeader;
use nifti::writer::WriterOptions;

/// Volume of `depth` slices of `size`x`size` pixels where every voxel of
/// slice z has intensity z.
pub fn ramp_volume(depth: usize, size: usize) -> Volume {
    let data = Array4::from_shape_fn((1, depth, size, size), |(_, z, _, _)| z as f32);
    Volume::new(data, (1.0, 1.0, 1.0), info(FileType::Nifti))
}

/// Volume whose voxel value encodes its position: 100*z + 10*y + x.
pub fn coded_volume(depth: usize, height: usize, width: usize) -> Volume {
    let data = Array4::from_shape_fn((1, depth, height, width), |(_, z, y, x)| {
        (100 * z + 10 * y + x) as f32
    });
    Volume::new(data, (1.0, 1.0, 1.0), info(FileType::Nifti))
}

pub fn info(file_type: FileType) -> VolumeInfo {
    VolumeInfo {
        file_type,
        modality: None,
        reoriented: false,
    }
}

/// Header with unit spacing and no orientation matrices.
pub fn plain_header() -> NiftiHeader {
    NiftiHeader {
        pixdim: [1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
        scl_slope: 1.0,
        scl_inter: 0.0,
        sform_code: 0,
        qform_code: 0,
        ..NiftiHeader::default()
    }
}

/// Write a NIfTI-1 file with the given header and array.
pub fn write_nifti(dir: &Path, name: &str, header: &NiftiHeader, data: &ArrayD<f32>) -> PathBuf {
    let path = dir.join(name);
    WriterOptions::new(&path)
        .reference_header(header)
        .write_nifti(data)
        .unwrap();
    path
}

pub fn input_from_path(path: &Path) -> InputFile {
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    InputFile::new(name, std::fs::read(path).unwrap())
}

/// Minimal single-frame or multi-frame CT image, 16-bit unsigned.
pub struct DicomSpec<'a> {
    pub rows: u16,
    pub columns: u16,
    /// Pixel values, frame after frame, row-major.
    pub pixels: &'a [u16],
    pub frames: u16,
    pub instance_number: Option<i32>,
    pub position_z: Option<f64>,
    pub series_uid: Option<&'a str>,
}

/// Write a DICOM file and return its bytes.
pub fn dicom_bytes(dir: &Path, name: &str, spec: &DicomSpec) -> Vec<u8> {
    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(uids::CT_IMAGE_STORAGE)));
    obj.put(DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from("1.2.826.0.1.3680043.2.1125.1")));
    obj.put(DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")));
    obj.put(DataElement::new(
        tags::PHOTOMETRIC_INTERPRETATION,
        VR::CS,
        PrimitiveValue::from("MONOCHROME2"),
    ));
    obj.put(DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)));
    obj.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(spec.rows)));
    obj.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(spec.columns)));
    obj.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16)));
    obj.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(16_u16)));
    obj.put(DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(15_u16)));
    obj.put(DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0_u16)));
    obj.put(DataElement::new(tags::PIXEL_SPACING, VR::DS, PrimitiveValue::from("0.5\\0.5")));
    if spec.frames > 1 {
        obj.put(DataElement::new(
            tags::NUMBER_OF_FRAMES,
            VR::IS,
            PrimitiveValue::from(spec.frames.to_string()),
        ));
    }
    if let Some(n) = spec.instance_number {
        obj.put(DataElement::new(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from(n.to_string())));
    }
    if let Some(uid) = spec.series_uid {
        obj.put(DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, PrimitiveValue::from(uid)));
    }
    if let Some(z) = spec.position_z {
        obj.put(DataElement::new(
            tags::IMAGE_POSITION_PATIENT,
            VR::DS,
            PrimitiveValue::from(format!("0\\0\\{z}")),
        ));
        obj.put(DataElement::new(
            tags::IMAGE_ORIENTATION_PATIENT,
            VR::DS,
            PrimitiveValue::from("1\\0\\0\\0\\1\\0"),
        ));
    }
    let bytes: Vec<u8> = spec.pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
    obj.put(DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::from(bytes)));

    let file = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.1"),
        )
        .unwrap();
    let path = dir.join(name);
    file.write_to_file(&path).unwrap();
    std::fs::read(&path).unwrap()
}
