//! # medgif
//!
//! Turns NIfTI volumes and DICOM series into looping animated GIFs, and
//! renders a matching interactive preview from the same frame data.
//!
//! Inputs are recognised by content: plain or gzipped NIfTI-1, a single
//! multi-frame DICOM file, or a set of single-frame DICOM files that are
//! sorted into a stack. A loaded [`Volume`] is sliced along one of the
//! anatomical axes:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//! or played back in stored order (time series, cine loops). Anisotropic
//! planes can be resampled bilinearly so pixels come out square.
//!
//! Every frame is windowed with the same intensity bounds, computed once
//! from the whole sequence, so the animation never flickers. Rendering a
//! frame (transform, then colormap) is one pure function shared by the GIF
//! encoder and the [`PreviewRenderer`], which is what keeps the preview
//! and the final animation pixel-identical.
//!
//! Slices are loaded, windowed and rendered in parallel using rayon.
//!
//! # Examples
//!
//! ## Converting a NIfTI file
//!
//! ```no_run
//! # use medgif::{ConvertRequest, InputFile, Limits, TaskStore, Colormap, pipeline};
//! let bytes = std::fs::read("brain.nii.gz").expect("should have read the file");
//! let files = vec![InputFile::new("brain.nii.gz", bytes)];
//! let request = ConvertRequest {
//!     colormap: Colormap::Bone,
//!     slice_start: 20,
//!     slice_end: 80,
//!     ..Default::default()
//! };
//! let store = TaskStore::new();
//! let result = pipeline::convert(&files, request, &Limits::default(), &store)
//!     .expect("should have converted the volume");
//! let gif = store.get(&result.task_id).expect("should have stored the GIF");
//! std::fs::write("brain.gif", gif.as_slice()).expect("should have written the GIF");
//! ```
//!
//! ## Driving the preview
//!
//! ```no_run
//! # use medgif::{InputFile, Limits, PreviewRequest, PreviewSettings, Player, pipeline};
//! # let files: Vec<InputFile> = Vec::new();
//! let payload = pipeline::preview(&files, PreviewRequest::default(), &Limits::default())
//!     .expect("should have produced preview frames");
//! let renderer = payload
//!     .renderer(PreviewSettings::default())
//!     .expect("should have accepted the settings");
//! let mut player = Player::new(renderer.len(), 10);
//! player.play(web_time::Instant::now());
//! if player.tick(web_time::Instant::now()) {
//!     let _frame = renderer.render(player.position());
//! }
//! ```

pub mod colormap;
pub mod config;
pub mod enums;
pub mod error;
mod interpolator;
pub mod pipeline;
pub mod preview;
pub mod sequencer;
pub mod task_store;
pub mod transform;
pub mod volume;
pub mod volume_loader;
pub mod window;

pub use colormap::{Colormap, ColormapTable};
pub use config::{ConvertRequest, Limits, PreviewRequest};
pub use enums::{FileType, Interpolation, Mode, Orientation, SortBy, WindowMode};
pub use error::{ConvertError, Result};
pub use preview::{PlayState, Player, PreviewRenderer, PreviewSettings};
pub use sequencer::{FrameSet, SequenceSettings, SliceRange, render_frame, select_frames};
pub use task_store::{TaskId, TaskStore};
pub use transform::TransformSpec;
pub use volume::{ExtractOptions, Slice, Volume, VolumeInfo};
pub use volume_loader::{InputFile, LoadOptions, VolumeLoader};
pub use window::{WindowBounds, WindowSpec};
