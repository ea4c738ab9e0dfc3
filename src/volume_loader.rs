use crate::enums::{FileType, SortBy};
use crate::error::{ConvertError, Result};
use crate::volume::{Volume, VolumeInfo};

use dicom::{
    object::{DefaultDicomObject, OpenFileOptions, file::ReadPreamble},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use flate2::read::GzDecoder;
use ndarray::{Array2, Array3, Array4, ArrayD, Axis, Ix4, IxDyn, s};
use nifti::{InMemNiftiObject, IntoNdArray, NiftiHeader, NiftiObject};
use std::{fs, io::Cursor, path::Path};
use tracing::{debug, info, warn};

const NIFTI1_HEADER_SIZE: i32 = 348;
const DICOM_MAGIC_OFFSET: usize = 128;
/// Direction cosines closer than this are the same orientation.
const ORIENTATION_TOLERANCE: f64 = 0.01;

/// One uploaded file: a display name and its raw bytes.
#[derive(Clone, Debug)]
pub struct InputFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    Nifti,
    NiftiGz,
    Dicom,
}

/// Guard rails applied while loading.
#[derive(Clone, Copy, Debug)]
pub struct LoadOptions {
    /// Maximum voxel count of the decoded volume, 0 for no limit.
    pub max_voxels: usize,
    /// Maximum number of input files, 0 for no limit.
    pub max_files: usize,
    pub sort_by: SortBy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_voxels: 0,
            max_files: 1000,
            sort_by: SortBy::Auto,
        }
    }
}

impl LoadOptions {
    fn check_voxels(&self, voxels: usize) -> Result<()> {
        if self.max_voxels > 0 && voxels > self.max_voxels {
            return Err(ConvertError::ResourceExceeded {
                what: "voxel count",
                actual: voxels,
                limit: self.max_voxels,
            });
        }
        Ok(())
    }
}

/// Recognise an input by its leading bytes.
pub fn detect_format(bytes: &[u8]) -> Option<InputFormat> {
    if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
        return Some(InputFormat::NiftiGz);
    }
    if bytes.len() >= DICOM_MAGIC_OFFSET + 4
        && &bytes[DICOM_MAGIC_OFFSET..DICOM_MAGIC_OFFSET + 4] == b"DICM"
    {
        return Some(InputFormat::Dicom);
    }
    if bytes.len() >= NIFTI1_HEADER_SIZE as usize {
        let size_le = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let size_be = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let magic = &bytes[344..347];
        if (size_le == NIFTI1_HEADER_SIZE || size_be == NIFTI1_HEADER_SIZE)
            && (magic == b"n+1" || magic == b"ni1")
        {
            return Some(InputFormat::Nifti);
        }
    }
    None
}

/// Ordering information read from one DICOM object.
#[derive(Clone, Debug, Default)]
struct DicomSortInfo {
    instance_number: Option<i32>,
    position: Option<[f64; 3]>,
    orientation: Option<[f64; 6]>,
    slice_location: Option<f64>,
}

impl DicomSortInfo {
    fn read(obj: &DefaultDicomObject) -> Self {
        let position = obj
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()
            .and_then(|e| e.to_multi_float64().ok())
            .and_then(|v| <[f64; 3]>::try_from(v.as_slice()).ok());
        let orientation = obj
            .element(tags::IMAGE_ORIENTATION_PATIENT)
            .ok()
            .and_then(|e| e.to_multi_float64().ok())
            .and_then(|v| <[f64; 6]>::try_from(v.as_slice()).ok());
        Self {
            instance_number: obj
                .element(tags::INSTANCE_NUMBER)
                .ok()
                .and_then(|e| e.to_int::<i32>().ok()),
            position,
            orientation,
            slice_location: obj
                .element(tags::SLICE_LOCATION)
                .ok()
                .and_then(|e| e.to_float64().ok()),
        }
    }

    /// Position projected on the slice normal, falling back to SliceLocation.
    fn normal_position(&self) -> Option<f64> {
        match (self.position, self.orientation) {
            (Some(pos), Some(o)) => {
                let row = [o[0], o[1], o[2]];
                let col = [o[3], o[4], o[5]];
                let normal = [
                    row[1] * col[2] - row[2] * col[1],
                    row[2] * col[0] - row[0] * col[2],
                    row[0] * col[1] - row[1] * col[0],
                ];
                Some(pos[0] * normal[0] + pos[1] * normal[1] + pos[2] * normal[2])
            }
            _ => self.slice_location,
        }
    }
}

/// A decoded DICOM object waiting to be stacked.
struct DicomImage {
    order: DicomSortInfo,
    frames: Array3<f32>,
    input_index: usize,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from a set of uploaded files.
    ///
    /// A single NIfTI file, or one or more DICOM files forming a series.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` for unrecognised or mixed inputs,
    /// `InconsistentGeometry` for DICOM slices of different sizes and
    /// `ResourceExceeded` when the options' limits are crossed.
    pub fn load(files: &[InputFile], options: &LoadOptions) -> Result<Volume> {
        if files.is_empty() {
            return Err(ConvertError::UnsupportedFormat("no files provided".into()));
        }
        if options.max_files > 0 && files.len() > options.max_files {
            return Err(ConvertError::ResourceExceeded {
                what: "file count",
                actual: files.len(),
                limit: options.max_files,
            });
        }

        let formats = files
            .iter()
            .enumerate()
            .map(|(i, f)| {
                detect_format(&f.data).ok_or_else(|| {
                    ConvertError::UnsupportedFormat(format!(
                        "input #{} is neither NIfTI nor DICOM",
                        i + 1
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let niftis = formats
            .iter()
            .filter(|f| matches!(f, InputFormat::Nifti | InputFormat::NiftiGz))
            .count();
        match (niftis, files.len()) {
            (0, _) => Self::load_dicom_bytes(files, options),
            (1, 1) => Self::load_nifti_bytes(&files[0].data, options),
            _ => Err(ConvertError::UnsupportedFormat(
                "a NIfTI volume must be uploaded on its own".into(),
            )),
        }
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        options: &LoadOptions,
    ) -> Result<Volume> {
        let files = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(InputFile::new(name, fs::read(path)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::load(&files, options)
    }

    /// Load every regular file of a directory, in file name order.
    pub fn load_from_directory(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Volume> {
        let mut paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(ConvertError::UnsupportedFormat("directory is empty".into()));
        }

        Self::load_from_file_paths(&paths, options)
    }

    // ------------------------------------------------------------------
    // NIfTI
    // ------------------------------------------------------------------

    pub fn load_nifti_bytes(bytes: &[u8], options: &LoadOptions) -> Result<Volume> {
        let gz = matches!(detect_format(bytes), Some(InputFormat::NiftiGz));

        let header = if gz {
            NiftiHeader::from_reader(GzDecoder::new(Cursor::new(bytes)))?
        } else {
            NiftiHeader::from_reader(Cursor::new(bytes))?
        };
        let ndim = header.dim[0] as usize;
        if !(2..=4).contains(&ndim) {
            return Err(ConvertError::UnsupportedFormat(format!(
                "NIfTI with {ndim} dimensions"
            )));
        }
        let voxels: usize = header.dim[1..=ndim]
            .iter()
            .map(|&d| d.max(1) as usize)
            .product();
        options.check_voxels(voxels)?;

        let obj = if gz {
            InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes)))?
        } else {
            InMemNiftiObject::from_reader(Cursor::new(bytes))?
        };
        let header = obj.header().clone();
        let array: ArrayD<f32> = obj.into_volume().into_ndarray::<f32>()?;
        Self::build_nifti_volume(array, &header)
    }

    fn build_nifti_volume(mut array: ArrayD<f32>, header: &NiftiHeader) -> Result<Volume> {
        while array.ndim() < 4 {
            let axis = array.ndim();
            array = array.insert_axis(Axis(axis));
        }
        let pixdim = [header.pixdim[1], header.pixdim[2], header.pixdim[3]];

        let (array, spacing, reoriented) = match Self::axis_codes(header) {
            Some(codes) => {
                let (array, spacing) = Self::reorient_to_ras(array, pixdim, codes);
                (array, spacing, codes != IDENTITY_CODES)
            }
            None => {
                warn!("NIfTI orientation is ambiguous, keeping stored axes");
                (array, pixdim, false)
            }
        };

        // (x, y, z, t) in RAS+ to (t, z, rows, columns) with anterior on row 0
        let mut array = array.permuted_axes(IxDyn(&[3, 2, 1, 0]));
        array.invert_axis(Axis(2));
        let data: Array4<f32> = array
            .into_dimensionality::<Ix4>()
            .map_err(|e| ConvertError::UnsupportedFormat(format!("NIfTI shape: {e}")))?
            .as_standard_layout()
            .into_owned();

        info!(shape = ?data.dim(), reoriented, "NIfTI volume loaded");
        Ok(Volume::new(
            data,
            (spacing[0].abs(), spacing[1].abs(), spacing[2].abs()),
            VolumeInfo {
                file_type: FileType::Nifti,
                modality: None,
                reoriented,
            },
        ))
    }

    /// Voxel-to-world direction matrix (columns are voxel axes).
    fn direction_matrix(header: &NiftiHeader) -> Option<[[f64; 3]; 3]> {
        if header.sform_code > 0 {
            let rows = [header.srow_x, header.srow_y, header.srow_z];
            let mut m = [[0.0; 3]; 3];
            for (r, row) in rows.iter().enumerate() {
                for c in 0..3 {
                    m[r][c] = row[c] as f64;
                }
            }
            return Some(m);
        }
        if header.qform_code > 0 {
            let (b, c, d) = (
                header.quatern_b as f64,
                header.quatern_c as f64,
                header.quatern_d as f64,
            );
            let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
            let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
            return Some([
                [
                    a * a + b * b - c * c - d * d,
                    2.0 * (b * c - a * d),
                    qfac * 2.0 * (b * d + a * c),
                ],
                [
                    2.0 * (b * c + a * d),
                    a * a + c * c - b * b - d * d,
                    qfac * 2.0 * (c * d - a * b),
                ],
                [
                    2.0 * (b * d - a * c),
                    2.0 * (c * d + a * b),
                    qfac * (a * a + d * d - b * b - c * c),
                ],
            ]);
        }
        None
    }

    /// For each voxel axis, the world axis it runs along and its sign.
    fn axis_codes(header: &NiftiHeader) -> Option<[(usize, bool); 3]> {
        let Some(m) = Self::direction_matrix(header) else {
            return Some(IDENTITY_CODES);
        };
        let mut codes = [(0, false); 3];
        let mut used = [false; 3];
        for (c, code) in codes.iter_mut().enumerate() {
            let world = (0..3).max_by(|&a, &b| m[a][c].abs().total_cmp(&m[b][c].abs()))?;
            if used[world] || m[world][c] == 0.0 {
                return None;
            }
            used[world] = true;
            *code = (world, m[world][c] < 0.0);
        }
        Some(codes)
    }

    fn reorient_to_ras(
        array: ArrayD<f32>,
        pixdim: [f32; 3],
        codes: [(usize, bool); 3],
    ) -> (ArrayD<f32>, [f32; 3]) {
        let mut order = [0usize; 3];
        let mut spacing = [1.0f32; 3];
        for (voxel_axis, &(world, _)) in codes.iter().enumerate() {
            order[world] = voxel_axis;
            spacing[world] = pixdim[voxel_axis];
        }
        let mut array = array.permuted_axes(IxDyn(&[order[0], order[1], order[2], 3]));
        for (world, &voxel_axis) in order.iter().enumerate() {
            if codes[voxel_axis].1 {
                array.invert_axis(Axis(world));
            }
        }
        (array, spacing)
    }

    // ------------------------------------------------------------------
    // DICOM
    // ------------------------------------------------------------------

    fn load_dicom_bytes(files: &[InputFile], options: &LoadOptions) -> Result<Volume> {
        let mut objects = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            match Self::read_dicom_object(&file.data) {
                Ok(obj) => objects.push(obj),
                Err(e) if files.len() > 1 => {
                    warn!(input = i + 1, error = %e, "Skipping unreadable DICOM file");
                }
                Err(e) => return Err(e),
            }
        }
        Self::load_from_dicom_objects(&objects, options)
    }

    fn read_dicom_object(bytes: &[u8]) -> Result<DefaultDicomObject> {
        Ok(OpenFileOptions::new()
            .read_preamble(ReadPreamble::Always)
            .from_reader(bytes)?)
    }

    /// Load a volume from DICOM objects
    ///
    /// Only the largest series is kept when objects from several series are
    /// given. A single multi-frame object yields its frames in stored order.
    /// Several objects are sorted per `options.sort_by` and stacked, using
    /// the first frame of each.
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[DefaultDicomObject],
        options: &LoadOptions,
    ) -> Result<Volume> {
        if dicom_objects.is_empty() {
            return Err(ConvertError::UnsupportedFormat(
                "no readable DICOM images".into(),
            ));
        }
        let series = Self::select_series(dicom_objects);
        Self::check_dicom_voxels(&series, options)?;

        let multiframe = series.len() == 1;
        let mut images = Vec::with_capacity(series.len());
        for (input_index, obj) in series.iter().enumerate() {
            match Self::decode_image(obj) {
                Ok(frames) => images.push(DicomImage {
                    order: DicomSortInfo::read(obj),
                    frames,
                    input_index,
                }),
                Err(e) if !multiframe => {
                    warn!(input = input_index + 1, error = %e, "Skipping undecodable DICOM image");
                }
                Err(e) => return Err(e),
            }
        }
        if images.is_empty() {
            return Err(ConvertError::UnsupportedFormat(
                "no decodable DICOM images".into(),
            ));
        }

        Self::sort_images(&mut images, options.sort_by);
        let planes: Vec<Array2<f32>> = if multiframe {
            images[0].frames.outer_iter().map(|f| f.to_owned()).collect()
        } else {
            images
                .iter()
                .map(|img| img.frames.index_axis(Axis(0), 0).to_owned())
                .collect()
        };

        Self::validate_dimensions(&planes)?;
        let volume_array = Self::build_volume_array(&planes);

        let reference = series[images[0].input_index];
        let spacing = Self::get_spacing(reference, &images);
        let modality = reference
            .element(tags::MODALITY)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim().to_string());
        let file_type = if multiframe {
            FileType::DicomMultiframe
        } else {
            FileType::Dicom
        };

        info!(shape = ?volume_array.dim(), ?file_type, "DICOM volume loaded");
        Ok(Volume::new(
            volume_array,
            spacing,
            VolumeInfo {
                file_type,
                modality,
                reoriented: false,
            },
        ))
    }

    /// Objects of the series with the most files. Objects without a
    /// SeriesInstanceUID stay with whichever series is chosen.
    fn select_series(objects: &[DefaultDicomObject]) -> Vec<&DefaultDicomObject> {
        let uids: Vec<Option<String>> = objects
            .iter()
            .map(|obj| {
                obj.element(tags::SERIES_INSTANCE_UID)
                    .ok()
                    .and_then(|e| e.to_str().ok())
                    .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
            })
            .collect();

        let mut counts: Vec<(&str, usize)> = Vec::new();
        for uid in uids.iter().flatten() {
            match counts.iter_mut().find(|(u, _)| *u == uid.as_str()) {
                Some((_, n)) => *n += 1,
                None => counts.push((uid.as_str(), 1)),
            }
        }
        // ties go to the series uploaded first
        let Some(&(chosen, kept)) = counts.iter().rev().max_by_key(|(_, n)| *n) else {
            return objects.iter().collect();
        };
        if counts.len() > 1 {
            warn!(series = counts.len(), kept, "Several DICOM series uploaded, keeping the largest");
        }
        objects
            .iter()
            .zip(&uids)
            .filter(|(_, uid)| uid.as_deref().is_none_or(|u| u == chosen))
            .map(|(obj, _)| obj)
            .collect()
    }

    fn check_dicom_voxels(objects: &[&DefaultDicomObject], options: &LoadOptions) -> Result<()> {
        let int_of = |obj: &DefaultDicomObject, tag| {
            obj.element(tag)
                .ok()
                .and_then(|e| e.to_int::<u32>().ok())
                .map(|v| v as usize)
        };
        let voxels: usize = if objects.len() == 1 {
            let obj = objects[0];
            int_of(obj, tags::ROWS).unwrap_or(0)
                * int_of(obj, tags::COLUMNS).unwrap_or(0)
                * int_of(obj, tags::NUMBER_OF_FRAMES).unwrap_or(1).max(1)
        } else {
            objects
                .iter()
                .map(|&obj| int_of(obj, tags::ROWS).unwrap_or(0) * int_of(obj, tags::COLUMNS).unwrap_or(0))
                .sum()
        };
        options.check_voxels(voxels)
    }

    /// Decode all frames as (frames, rows, columns) with the modality LUT
    /// applied and no VOI LUT.
    fn decode_image(dicom_object: &DefaultDicomObject) -> Result<Array3<f32>> {
        let pixel_data = dicom_object
            .decode_pixel_data()
            .map_err(|e| ConvertError::PixelData(e.to_string()))?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        let array = pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .map_err(|e| ConvertError::PixelData(e.to_string()))?;
        let array = array
            .into_dimensionality::<Ix4>()
            .map_err(|e| ConvertError::PixelData(e.to_string()))?;
        Ok(array.slice_move(s![.., .., .., 0]))
    }

    fn sort_images(images: &mut [DicomImage], sort_by: SortBy) {
        let all_positioned = images.iter().all(|img| img.order.normal_position().is_some());
        let all_numbered = images
            .iter()
            .all(|img| img.order.instance_number.is_some_and(|n| n > 0));
        let consistent_orientation = images.iter().all(|img| {
            match (img.order.orientation, images[0].order.orientation) {
                (Some(a), Some(b)) => a
                    .iter()
                    .zip(b.iter())
                    .all(|(x, y)| (x - y).abs() < ORIENTATION_TOLERANCE),
                _ => false,
            }
        });

        let by_instance = |a: &DicomImage, b: &DicomImage| {
            a.order
                .instance_number
                .unwrap_or(0)
                .cmp(&b.order.instance_number.unwrap_or(0))
        };
        // slices sharing a position (one frame per file cine) keep acquisition order
        let by_position = |a: &DicomImage, b: &DicomImage| {
            let pa = a.order.normal_position().unwrap_or(0.0);
            let pb = b.order.normal_position().unwrap_or(0.0);
            pa.total_cmp(&pb)
                .then_with(|| by_instance(a, b))
                .then_with(|| a.input_index.cmp(&b.input_index))
        };

        match sort_by {
            SortBy::None => {}
            SortBy::ImagePositionPatient => images.sort_by(by_position),
            SortBy::InstanceNumber => images.sort_by(by_instance),
            SortBy::Auto if all_positioned && consistent_orientation && images.len() > 1 => {
                debug!("Sorting DICOM series by position along slice normal");
                images.sort_by(by_position);
            }
            SortBy::Auto if all_numbered => {
                debug!("Sorting DICOM series by instance number");
                images.sort_by(by_instance);
            }
            SortBy::Auto => images.sort_by(by_position),
        }
    }

    fn validate_dimensions(images: &[Array2<f32>]) -> Result<()> {
        let expected = images[0].dim();
        if let Some(img) = images.iter().find(|img| img.dim() != expected) {
            return Err(ConvertError::InconsistentGeometry {
                expected,
                found: img.dim(),
            });
        }
        Ok(())
    }

    fn build_volume_array(images: &[Array2<f32>]) -> Array4<f32> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array4::<f32>::zeros((1, depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![0, i, .., ..]).assign(image);
        }

        volume
    }

    /// Spacing along (columns, rows, slices) in mm.
    fn get_spacing(reference: &DefaultDicomObject, images: &[DicomImage]) -> (f32, f32, f32) {
        let float_of = |tag| {
            reference
                .element(tag)
                .ok()
                .and_then(|e| e.to_float32().ok())
                .filter(|v| *v > 0.0)
        };
        let (row_spacing, col_spacing) = reference
            .element(tags::PIXEL_SPACING)
            .ok()
            .and_then(|e| e.to_multi_float32().ok())
            .filter(|v| v.len() >= 2)
            .map(|v| (v[0], v[1]))
            .unwrap_or((1.0, 1.0));

        let from_positions = match (
            images.first().and_then(|i| i.order.normal_position()),
            images.get(1).and_then(|i| i.order.normal_position()),
        ) {
            (Some(a), Some(b)) if (a - b).abs() > f64::EPSILON => Some((a - b).abs() as f32),
            _ => None,
        };
        let slice_spacing = from_positions
            .or_else(|| float_of(tags::SPACING_BETWEEN_SLICES))
            .or_else(|| float_of(tags::SLICE_THICKNESS))
            .unwrap_or(1.0);

        (col_spacing, row_spacing, slice_spacing)
    }
}

const IDENTITY_CODES: [(usize, bool); 3] = [(0, false), (1, false), (2, false)];
