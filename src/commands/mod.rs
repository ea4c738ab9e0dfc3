pub mod config;
pub mod convert;
pub mod info;
pub mod preview;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use medgif::{Colormap, InputFile, Limits, Mode, Orientation, SortBy, WindowMode};

#[derive(Clone, Copy, ValueEnum)]
pub enum OrientationArg {
    Axial,
    Coronal,
    Sagittal,
}

impl From<OrientationArg> for Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Axial => Orientation::Axial,
            OrientationArg::Coronal => Orientation::Coronal,
            OrientationArg::Sagittal => Orientation::Sagittal,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Volume,
    Series,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Volume => Mode::Volume,
            ModeArg::Series => Mode::Series,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum WindowModeArg {
    Auto,
    Manual,
}

impl From<WindowModeArg> for WindowMode {
    fn from(arg: WindowModeArg) -> Self {
        match arg {
            WindowModeArg::Auto => WindowMode::Auto,
            WindowModeArg::Manual => WindowMode::Manual,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColormapArg {
    Gray,
    Viridis,
    Plasma,
    Hot,
    Bone,
    Jet,
}

impl From<ColormapArg> for Colormap {
    fn from(arg: ColormapArg) -> Self {
        match arg {
            ColormapArg::Gray => Colormap::Gray,
            ColormapArg::Viridis => Colormap::Viridis,
            ColormapArg::Plasma => Colormap::Plasma,
            ColormapArg::Hot => Colormap::Hot,
            ColormapArg::Bone => Colormap::Bone,
            ColormapArg::Jet => Colormap::Jet,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortByArg {
    Auto,
    Position,
    Instance,
    None,
}

impl From<SortByArg> for SortBy {
    fn from(arg: SortByArg) -> Self {
        match arg {
            SortByArg::Auto => SortBy::Auto,
            SortByArg::Position => SortBy::ImagePositionPatient,
            SortByArg::Instance => SortBy::InstanceNumber,
            SortByArg::None => SortBy::None,
        }
    }
}

/// Input files and the limits they are processed under.
#[derive(Args)]
pub struct InputArgs {
    /// NIfTI file, DICOM files, or a directory of DICOM files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Limits file (TOML); see `medgif config`
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Use the hosted deployment limits
    #[arg(long, conflicts_with = "config")]
    pub cloud: bool,

    /// How DICOM files are ordered into a stack
    #[arg(long, value_enum, default_value = "auto")]
    pub sort_by: SortByArg,
}

impl InputArgs {
    pub fn limits(&self) -> Result<Limits> {
        if let Some(ref path) = self.config {
            return Limits::load(path)
                .with_context(|| format!("Failed to load limits from {}", path.display()));
        }
        Ok(if self.cloud {
            Limits::cloud()
        } else {
            Limits::default()
        })
    }

    /// Read every input, expanding directories to their files in name order.
    pub fn read_files(&self) -> Result<Vec<InputFile>> {
        let mut paths = Vec::new();
        for input in &self.inputs {
            if input.is_dir() {
                paths.extend(list_directory(input)?);
            } else {
                paths.push(input.clone());
            }
        }
        if paths.is_empty() {
            bail!("No input files found");
        }
        paths
            .iter()
            .map(|path| {
                let data = std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(InputFile::new(name, data))
            })
            .collect()
    }
}

fn list_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Windowing and slicing options shared by `convert` and `preview`.
#[derive(Args)]
pub struct SliceArgs {
    /// Reslice a volume or play frames in stored order
    #[arg(long, value_enum, default_value = "volume")]
    pub mode: ModeArg,

    /// Slicing axis in volume mode
    #[arg(long, value_enum, default_value = "axial")]
    pub orientation: OrientationArg,

    /// Percentile band (auto) or intensity bounds (manual)
    #[arg(long, value_enum, default_value = "auto")]
    pub window_mode: WindowModeArg,

    /// Window width: percentile span in auto mode, intensity units in manual mode
    #[arg(long, default_value = "98")]
    pub window_width: f64,

    /// Window level: percentile centre in auto mode, intensity in manual mode
    #[arg(long, default_value = "50")]
    pub window_level: f64,

    /// Axial plane shown across time for 4D data in series mode
    #[arg(long)]
    pub slice_index: Option<usize>,

    /// Keep anisotropic pixels instead of resampling them square
    #[arg(long)]
    pub no_aspect_correction: bool,
}

/// Colour, range and transform options applied to rendered frames.
#[derive(Args)]
pub struct RenderArgs {
    #[arg(long, value_enum, default_value = "gray")]
    pub colormap: ColormapArg,

    /// First frame, in percent of the sequence
    #[arg(long, default_value = "0")]
    pub slice_start: u32,

    /// End of the range, in percent of the sequence
    #[arg(long, default_value = "100")]
    pub slice_end: u32,

    #[arg(long)]
    pub flip_horizontal: bool,

    #[arg(long)]
    pub flip_vertical: bool,

    /// Clockwise quarter turns
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub rotate90: i32,

    /// Play the selected range backwards
    #[arg(long)]
    pub reverse_slices: bool,
}
