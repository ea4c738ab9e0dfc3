use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Inconsistent geometry: expected {expected:?} (rows, columns), found {found:?}")]
    InconsistentGeometry {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Empty selection: range {start}%-{end}% of {total} frames selects nothing")]
    EmptySelection { total: usize, start: u32, end: u32 },

    #[error("Resource limit exceeded: {what} is {actual}, limit is {limit}")]
    ResourceExceeded {
        what: &'static str,
        actual: usize,
        limit: usize,
    },

    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::error::NiftiError),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("Pixel data error: {0}")]
    PixelData(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl ConvertError {
    /// Reason that is safe to hand to an untrusted caller.
    ///
    /// Errors raised by decoders or the filesystem can carry paths and
    /// library internals, so they collapse to a fixed sentence.
    pub fn public_message(&self) -> String {
        match self {
            ConvertError::UnsupportedFormat(_)
            | ConvertError::InconsistentGeometry { .. }
            | ConvertError::EmptySelection { .. }
            | ConvertError::ResourceExceeded { .. }
            | ConvertError::InvalidParameter(_) => self.to_string(),
            ConvertError::EncodingFailure(_) => {
                "Encoding failure: the animation could not be produced".to_string()
            }
            ConvertError::Io(_) => "File system error occurred".to_string(),
            ConvertError::Nifti(_)
            | ConvertError::Dicom(_)
            | ConvertError::PixelData(_)
            | ConvertError::Image(_) => {
                "Processing error occurred. Please check your file and try again.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
