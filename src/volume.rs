use crate::enums::{FileType, Interpolation, Mode, Orientation};
use crate::interpolator::Interpolator;

use ndarray::{Array2, Array4, ArrayView2, Axis, s};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

/// Descriptive data carried alongside a loaded volume.
#[derive(Clone, Debug, Serialize)]
pub struct VolumeInfo {
    pub file_type: FileType,
    pub modality: Option<String>,
    /// Whether the voxel grid was reoriented from its stored axes.
    pub reoriented: bool,
}

/// An intensity volume laid out as (time, depth, height, width).
///
/// Axial planes (`data[[t, z, .., ..]]`) are stored in display orientation:
/// depth grows towards superior, row 0 is anterior. Immutable once built.
///
/// Left and right depend on the source. NIfTI data is reoriented to RAS+,
/// so column 0 is patient left (neurological view). DICOM stacks keep their
/// stored columns, which for the usual LPS row direction puts patient right
/// in column 0 (radiological view).
#[derive(Clone, Debug)]
pub struct Volume {
    data: Array4<f32>,
    /// Voxel spacing in mm along (width, height, depth).
    spacing: (f32, f32, f32),
    info: VolumeInfo,
}

/// One 2D plane taken from a volume.
#[derive(Clone, Debug)]
pub struct Slice {
    pub data: Array2<f32>,
    /// Position of the plane along the extraction axis.
    pub index: usize,
    pub total: usize,
}

impl Slice {
    pub fn new(data: Array2<f32>, index: usize, total: usize) -> Self {
        Self { data, index, total }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ExtractOptions {
    pub mode: Mode,
    pub orientation: Orientation,
    /// Plane used in series mode on 4D data; middle when `None`.
    pub slice_index: Option<usize>,
    pub interpolation: Interpolation,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Volume,
            orientation: Orientation::Axial,
            slice_index: None,
            interpolation: Interpolation::Bilinear,
        }
    }
}

impl Volume {
    pub fn new(data: Array4<f32>, spacing: (f32, f32, f32), info: VolumeInfo) -> Self {
        Self {
            data,
            spacing,
            info,
        }
    }

    /// Get the dimensions of the volume (time, depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn spacing(&self) -> (f32, f32, f32) {
        self.spacing
    }

    pub fn info(&self) -> &VolumeInfo {
        &self.info
    }

    pub fn timepoints(&self) -> usize {
        self.data.dim().0
    }

    pub fn voxel_count(&self) -> usize {
        self.data.len()
    }

    /// Number of planes `extract_slices` yields for these options.
    pub fn frame_count(&self, options: &ExtractOptions) -> usize {
        let (t, depth, height, width) = self.dim();
        match options.mode {
            Mode::Series if t > 1 => t,
            Mode::Series => depth,
            Mode::Volume => match options.orientation {
                Orientation::Axial => depth,
                Orientation::Coronal => height,
                Orientation::Sagittal => width,
            },
        }
    }

    /// Plane at `index` along `orientation` from timepoint `t`, in display
    /// orientation, with `index` counted in ascending physical order.
    pub fn get_slice_from_axis(
        &self,
        t: usize,
        index: usize,
        orientation: &Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) || t >= self.timepoints() {
            return None;
        }
        let (_, _, height, _) = self.dim();
        let frame = self.data.index_axis(Axis(0), t);
        let slice_result = match orientation {
            Orientation::Axial => frame.slice_move(s![index, .., ..]),
            // rows run superior to inferior, index runs posterior to anterior
            Orientation::Coronal => frame.slice_move(s![..;-1, height - 1 - index, ..]),
            // rows superior to inferior, columns posterior to anterior
            Orientation::Sagittal => frame.slice_move(s![..;-1, ..;-1, index]),
        };
        Some(slice_result)
    }

    /// In-plane (horizontal, vertical) spacing for an orientation.
    fn plane_spacing(&self, orientation: &Orientation) -> (f32, f32) {
        let (x, y, z) = self.spacing;
        match orientation {
            Orientation::Axial => (x, y),
            Orientation::Coronal => (x, z),
            Orientation::Sagittal => (y, z),
        }
    }

    /// Produce the ordered plane sequence for the given options.
    ///
    /// Volume mode reslices the first timepoint along the requested axis.
    /// Series mode never reslices: 4D data yields one stored axial plane
    /// across all timepoints, 3D data yields the stored planes in order.
    pub fn extract_slices(&self, options: &ExtractOptions) -> Vec<Slice> {
        let (t, depth, _, _) = self.dim();
        let slices: Vec<Slice> = match options.mode {
            Mode::Series if t > 1 => {
                let index = options
                    .slice_index
                    .unwrap_or(depth / 2)
                    .min(depth.saturating_sub(1));
                debug!(timepoints = t, slice_index = index, "Extracting series over time");
                (0..t)
                    .into_par_iter()
                    .map(|ti| {
                        let plane = self.data.slice(s![ti, index, .., ..]).to_owned();
                        Slice::new(plane, ti, t)
                    })
                    .collect()
            }
            Mode::Series => {
                debug!(frames = depth, "Extracting series in stored order");
                (0..depth)
                    .into_par_iter()
                    .map(|z| Slice::new(self.data.slice(s![0, z, .., ..]).to_owned(), z, depth))
                    .collect()
            }
            Mode::Volume => {
                let orientation = options.orientation;
                let total = self.frame_count(options);
                let target = match options.interpolation {
                    Interpolation::Bilinear => {
                        let (_, depth, height, width) = self.dim();
                        let plane_dim = match orientation {
                            Orientation::Axial => (height, width),
                            Orientation::Coronal => (depth, width),
                            Orientation::Sagittal => (depth, height),
                        };
                        Interpolator::get_isotropic_dimensions(
                            self.plane_spacing(&orientation),
                            plane_dim,
                        )
                    }
                    Interpolation::None => None,
                };
                debug!(%orientation, total, resampled_to = ?target, "Reslicing volume");
                (0..total)
                    .into_par_iter()
                    .filter_map(|i| {
                        let view = self.get_slice_from_axis(0, i, &orientation)?;
                        let plane = match target {
                            Some((h, w)) => Interpolator::resample_plane(&view, h, w),
                            None => view.to_owned(),
                        };
                        Some(Slice::new(plane, i, total))
                    })
                    .collect()
            }
        };
        slices
    }

    fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        let (_, depth, height, width) = self.dim();
        let max_index = match orientation {
            Orientation::Axial => depth,
            Orientation::Coronal => height,
            Orientation::Sagittal => width,
        };
        index < max_index
    }
}
