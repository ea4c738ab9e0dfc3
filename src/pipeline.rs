//! Request-level entry points: conversion and preview.
//!
//! Both run load → extract → window on the full sequence, then diverge:
//! conversion renders and encodes on this side, preview hands the
//! grayscale frames to a [`PreviewRenderer`].

use crate::colormap::Colormap;
use crate::config::{ConvertRequest, Limits, PreviewRequest};
use crate::enums::{FileType, Mode, Orientation};
use crate::error::{ConvertError, Result};
use crate::preview::{PreviewRenderer, PreviewSettings, encode_png_gray, encode_png_rgb};
use crate::sequencer::{
    FrameSet, SequenceSettings, SliceRange, resize_plane, resize_rgb, uniform_indices,
};
use crate::task_store::{TaskId, TaskStore};
use crate::volume::{ExtractOptions, Volume};
use crate::volume_loader::{InputFile, LoadOptions, VolumeLoader};
use crate::window::{WindowBounds, WindowSpec, window_slices};

use ndarray::Array2;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What was loaded and how it was windowed.
#[derive(Clone, Debug, Serialize)]
pub struct SourceMetadata {
    pub file_type: FileType,
    /// (time, depth, height, width)
    pub shape: [usize; 4],
    pub timepoints: usize,
    pub modality: Option<String>,
    pub reoriented: bool,
    pub mode: Mode,
    pub orientation: Orientation,
    pub window: String,
    pub window_bounds: WindowBounds,
    /// Frames in the extracted sequence before any filtering.
    pub total_frames: usize,
}

/// Metadata of a finished conversion.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionMetadata {
    #[serde(flatten)]
    pub source: SourceMetadata,
    pub colormap: Colormap,
    pub slice_range: SliceRange,
    pub frames_after_filter: usize,
    pub transforms: Vec<String>,
    pub frame_count: usize,
    /// (width, height) of the GIF frames.
    pub output_size: (u32, u32),
    pub delay_ms: u32,
    pub gif_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct ConversionResult {
    pub task_id: TaskId,
    pub metadata: ConversionMetadata,
    /// Evenly spaced frames of the final animation, PNG encoded.
    pub thumbnails: Vec<Vec<u8>>,
}

/// Metadata of a preview payload.
#[derive(Clone, Debug, Serialize)]
pub struct PreviewMetadata {
    #[serde(flatten)]
    pub source: SourceMetadata,
    pub preview_size: u32,
    pub subsampled: bool,
}

/// Windowed grayscale frames for client-side rendering.
#[derive(Clone, Debug)]
pub struct PreviewPayload {
    pub frames: Vec<Array2<u8>>,
    /// Index in the full windowed sequence of each frame, ascending.
    pub source_indices: Vec<usize>,
    pub total_frames: usize,
    /// Frame count before subsampling to the preview frame limit.
    pub original_total: usize,
    pub metadata: PreviewMetadata,
}

impl PreviewPayload {
    pub fn frames_png(&self) -> Result<Vec<Vec<u8>>> {
        self.frames.iter().map(encode_png_gray).collect()
    }

    /// Renderer over these frames with the given live settings.
    pub fn renderer(&self, settings: PreviewSettings) -> Result<PreviewRenderer> {
        PreviewRenderer::with_source_indices(
            self.frames.clone(),
            self.source_indices.clone(),
            self.original_total,
            settings,
        )
    }
}

/// Windowed sequence shared by both entry points.
struct Windowed {
    metadata: SourceMetadata,
    frames: Vec<Array2<u8>>,
}

fn check_inputs(files: &[InputFile], limits: &Limits) -> Result<()> {
    if files.is_empty() {
        return Err(ConvertError::InvalidParameter("no files uploaded".into()));
    }
    if let Some(largest) = files.iter().map(|f| f.data.len()).max() {
        if limits.max_file_bytes > 0 && largest > limits.max_file_bytes {
            return Err(ConvertError::ResourceExceeded {
                what: "file size in bytes",
                actual: largest,
                limit: limits.max_file_bytes,
            });
        }
    }
    Ok(())
}

fn load_and_window(
    files: &[InputFile],
    load_options: &LoadOptions,
    extract: &ExtractOptions,
    window: &WindowSpec,
) -> Result<Windowed> {
    let volume: Volume = VolumeLoader::load(files, load_options)?;
    let slices = volume.extract_slices(extract);
    if slices.is_empty() {
        return Err(ConvertError::EmptySelection {
            total: 0,
            start: 0,
            end: 100,
        });
    }

    let (bounds, frames) = window_slices(&slices, window);
    let (t, d, h, w) = volume.dim();
    let info = volume.info();
    info!(
        file_type = ?info.file_type,
        shape = ?(t, d, h, w),
        mode = %extract.mode,
        orientation = %extract.orientation,
        frames = frames.len(),
        window = %window.describe(),
        "Sequence windowed"
    );

    Ok(Windowed {
        metadata: SourceMetadata {
            file_type: info.file_type,
            shape: [t, d, h, w],
            timepoints: t,
            modality: info.modality.clone(),
            reoriented: info.reoriented,
            mode: extract.mode,
            orientation: extract.orientation,
            window: window.describe(),
            window_bounds: bounds,
            total_frames: frames.len(),
        },
        frames,
    })
}

/// Convert input files into a GIF stored under a new task id.
pub fn convert(
    files: &[InputFile],
    request: ConvertRequest,
    limits: &Limits,
    store: &TaskStore,
) -> Result<ConversionResult> {
    let request = request.validated(limits);
    check_inputs(files, limits)?;

    let windowed = load_and_window(
        files,
        &limits.load_options(request.sort_by),
        &request.extract_options(),
        &request.window(),
    )?;

    let range = request.range();
    let transform = request.transform();
    let settings = SequenceSettings {
        range,
        transform,
        max_frames: request.max_frames,
        max_size: request.max_gif_size,
        fps: request.fps,
    };
    let table = request.colormap.table();
    let frame_set = FrameSet::build(&windowed.frames, &settings, table)?;
    let gif = frame_set.encode_gif(limits.max_artifact_bytes)?;

    let frames_after_filter = range.resolve(windowed.frames.len())?.len();
    let thumbnail_size = limits.thumbnail_size.min(request.max_gif_size);
    let thumbnails = uniform_indices(frame_set.len(), limits.preview_thumbnails)
        .into_iter()
        .map(|i| encode_png_rgb(&resize_rgb(&frame_set.frames[i], thumbnail_size)))
        .collect::<Result<Vec<_>>>()?;

    let task_id = TaskId::new();
    let metadata = ConversionMetadata {
        source: windowed.metadata,
        colormap: request.colormap,
        slice_range: range,
        frames_after_filter,
        transforms: transform.describe(),
        frame_count: frame_set.len(),
        output_size: frame_set.dimensions().unwrap_or((0, 0)),
        delay_ms: frame_set.delay_ms,
        gif_bytes: gif.len(),
    };
    store.insert(task_id, gif);
    info!(
        task = %task_id,
        frames = metadata.frame_count,
        bytes = metadata.gif_bytes,
        "Conversion finished"
    );

    Ok(ConversionResult {
        task_id,
        metadata,
        thumbnails,
    })
}

/// Produce the grayscale frames for the interactive preview.
pub fn preview(
    files: &[InputFile],
    request: PreviewRequest,
    limits: &Limits,
) -> Result<PreviewPayload> {
    let request = request.validated(limits);
    check_inputs(files, limits)?;

    let windowed = load_and_window(
        files,
        &limits.load_options(request.sort_by),
        &request.extract_options(),
        &request.window(),
    )?;

    let original_total = windowed.frames.len();
    let picks = uniform_indices(original_total, limits.max_preview_frames);
    let subsampled = picks.len() < original_total;
    if subsampled {
        warn!(
            original_total,
            kept = picks.len(),
            "Preview frames subsampled"
        );
    }
    let frames: Vec<Array2<u8>> = picks
        .iter()
        .map(|&i| resize_plane(&windowed.frames[i], request.preview_size))
        .collect();
    debug!(frames = frames.len(), size = request.preview_size, "Preview frames ready");

    Ok(PreviewPayload {
        total_frames: frames.len(),
        original_total,
        frames,
        source_indices: picks,
        metadata: PreviewMetadata {
            source: windowed.metadata,
            preview_size: request.preview_size,
            subsampled,
        },
    })
}

/// Fetch a stored artifact.
pub fn artifact(store: &TaskStore, task_id: &TaskId) -> Option<Arc<Vec<u8>>> {
    store.get(task_id)
}
