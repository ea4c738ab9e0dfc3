//! Service limits and request parameters.
//!
//! Limits are read from TOML; request structs come in from callers and are
//! clamped into range by `validated` before anything touches pixel data.

use crate::colormap::Colormap;
use crate::enums::{Interpolation, Mode, Orientation, SortBy, WindowMode};
use crate::error::{ConvertError, Result};
use crate::sequencer::SliceRange;
use crate::transform::TransformSpec;
use crate::volume::ExtractOptions;
use crate::volume_loader::LoadOptions;
use crate::window::WindowSpec;

use serde::{Deserialize, Serialize};
use std::path::Path;

const MIB: usize = 1024 * 1024;

pub const MIN_GIF_SIZE: u32 = 64;
pub const MIN_PREVIEW_SIZE: u32 = 64;
pub const MAX_FPS: u32 = 30;

/// Resource ceilings for one deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Voxels in the decoded volume, 0 for no limit.
    pub max_voxels: usize,
    pub max_files: usize,
    /// Size of any single input file in bytes.
    pub max_file_bytes: usize,
    /// Size of the encoded GIF in bytes, 0 for no limit.
    pub max_artifact_bytes: usize,
    pub max_gif_size: u32,
    pub max_frames: usize,
    pub max_preview_frames: usize,
    pub max_preview_size: u32,
    pub preview_thumbnails: usize,
    pub thumbnail_size: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_voxels: 0,
            max_files: 1000,
            max_file_bytes: 500 * MIB,
            max_artifact_bytes: 256 * MIB,
            max_gif_size: 2048,
            max_frames: 1000,
            max_preview_frames: 500,
            max_preview_size: 512,
            preview_thumbnails: 5,
            thumbnail_size: 256,
        }
    }
}

impl Limits {
    /// Tighter profile for memory-constrained hosted deployments.
    pub fn cloud() -> Self {
        Self {
            max_voxels: 15 * MIB,
            max_file_bytes: 100 * MIB,
            max_artifact_bytes: 32 * MIB,
            max_gif_size: 320,
            max_preview_frames: 50,
            max_preview_size: 256,
            ..Self::default()
        }
    }

    /// Parse limits from TOML; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ConvertError::InvalidParameter(format!("invalid limits: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConvertError::InvalidParameter(format!("cannot serialize limits: {e}")))
    }

    pub fn load_options(&self, sort_by: SortBy) -> LoadOptions {
        LoadOptions {
            max_voxels: self.max_voxels,
            max_files: self.max_files,
            sort_by,
        }
    }
}

/// Force `end > start` inside 0..=100.
fn clamp_range(start: u32, end: u32) -> SliceRange {
    let start = start.min(100);
    let mut end = end.min(100);
    if end <= start {
        end = (start + 1).min(100);
    }
    SliceRange::new(start, end)
}

/// Parameters of a full conversion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertRequest {
    pub mode: Mode,
    pub orientation: Orientation,
    pub fps: u32,
    pub colormap: Colormap,
    pub slice_start: u32,
    pub slice_end: u32,
    pub window_mode: WindowMode,
    /// Percentile band in auto mode, intensity units in manual mode.
    pub window_width: f64,
    pub window_level: f64,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub rotate90: i32,
    pub reverse_slices: bool,
    pub max_gif_size: u32,
    /// 0 keeps every selected frame.
    pub max_frames: usize,
    pub sort_by: SortBy,
    /// Plane used in series mode on 4D data.
    pub slice_index: Option<usize>,
    pub correct_aspect: bool,
}

impl Default for ConvertRequest {
    fn default() -> Self {
        Self {
            mode: Mode::Volume,
            orientation: Orientation::Axial,
            fps: 10,
            colormap: Colormap::Gray,
            slice_start: 0,
            slice_end: 100,
            window_mode: WindowMode::Auto,
            window_width: 98.0,
            window_level: 50.0,
            flip_horizontal: false,
            flip_vertical: false,
            rotate90: 0,
            reverse_slices: false,
            max_gif_size: 512,
            max_frames: 0,
            sort_by: SortBy::Auto,
            slice_index: None,
            correct_aspect: true,
        }
    }
}

impl ConvertRequest {
    /// Clamp every parameter into its allowed range.
    pub fn validated(mut self, limits: &Limits) -> Self {
        let range = clamp_range(self.slice_start, self.slice_end);
        self.slice_start = range.start;
        self.slice_end = range.end;
        self.rotate90 = self.rotate90.rem_euclid(4);
        self.fps = self.fps.clamp(1, MAX_FPS);
        self.max_gif_size = self
            .max_gif_size
            .clamp(MIN_GIF_SIZE, limits.max_gif_size.max(MIN_GIF_SIZE));
        self.max_frames = self.max_frames.min(limits.max_frames);
        if !self.window_width.is_finite() || !self.window_level.is_finite() {
            let defaults = Self::default();
            self.window_width = defaults.window_width;
            self.window_level = defaults.window_level;
        }
        self
    }

    pub fn range(&self) -> SliceRange {
        clamp_range(self.slice_start, self.slice_end)
    }

    pub fn window(&self) -> WindowSpec {
        WindowSpec::from_width_level(self.window_mode, self.window_width, self.window_level)
    }

    pub fn transform(&self) -> TransformSpec {
        TransformSpec {
            flip_horizontal: self.flip_horizontal,
            flip_vertical: self.flip_vertical,
            rotate90: self.rotate90.rem_euclid(4) as u8,
            reverse_slices: self.reverse_slices,
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        extract_options(self.mode, self.orientation, self.slice_index, self.correct_aspect)
    }
}

/// Parameters of a preview. Colormap, range and transforms are applied by
/// the preview renderer and are not part of the request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewRequest {
    pub mode: Mode,
    pub orientation: Orientation,
    pub window_mode: WindowMode,
    pub window_width: f64,
    pub window_level: f64,
    pub preview_size: u32,
    pub sort_by: SortBy,
    pub slice_index: Option<usize>,
    pub correct_aspect: bool,
}

impl Default for PreviewRequest {
    fn default() -> Self {
        Self {
            mode: Mode::Volume,
            orientation: Orientation::Axial,
            window_mode: WindowMode::Auto,
            window_width: 98.0,
            window_level: 50.0,
            preview_size: 256,
            sort_by: SortBy::Auto,
            slice_index: None,
            correct_aspect: true,
        }
    }
}

impl PreviewRequest {
    pub fn validated(mut self, limits: &Limits) -> Self {
        self.preview_size = self
            .preview_size
            .clamp(MIN_PREVIEW_SIZE, limits.max_preview_size.max(MIN_PREVIEW_SIZE));
        if !self.window_width.is_finite() || !self.window_level.is_finite() {
            let defaults = Self::default();
            self.window_width = defaults.window_width;
            self.window_level = defaults.window_level;
        }
        self
    }

    pub fn window(&self) -> WindowSpec {
        WindowSpec::from_width_level(self.window_mode, self.window_width, self.window_level)
    }

    pub fn extract_options(&self) -> ExtractOptions {
        extract_options(self.mode, self.orientation, self.slice_index, self.correct_aspect)
    }
}

fn extract_options(
    mode: Mode,
    orientation: Orientation,
    slice_index: Option<usize>,
    correct_aspect: bool,
) -> ExtractOptions {
    ExtractOptions {
        mode,
        orientation,
        slice_index,
        interpolation: if correct_aspect {
            Interpolation::Bilinear
        } else {
            Interpolation::None
        },
    }
}
