use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Axial,
    Coronal,
    Sagittal,
}

/// How planes are taken from a volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Reslice along an anatomical axis.
    #[default]
    Volume,
    /// Keep the native frame order (time axis or acquisition order).
    Series,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Bounds are percentiles of the whole frame sequence.
    #[default]
    Auto,
    /// Bounds are absolute intensities (`level ± width/2`).
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Nifti,
    Dicom,
    DicomMultiframe,
}

/// Key used to order the files of a DICOM series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Position projected on the slice normal when the stack is a true 3D
    /// stack, instance number otherwise.
    #[default]
    Auto,
    ImagePositionPatient,
    InstanceNumber,
    None,
}

/// Resampling used when correcting anisotropic pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Bilinear,
    None,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Axial => write!(f, "axial"),
            Orientation::Coronal => write!(f, "coronal"),
            Orientation::Sagittal => write!(f, "sagittal"),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Volume => write!(f, "volume"),
            Mode::Series => write!(f, "series"),
        }
    }
}
