//! Interactive preview: client-side rendering of a windowed sequence.
//!
//! The server sends the grayscale frames once. Colormap, slice range and
//! transforms are applied here with the same selection and rendering code
//! as the encoder, so a preview frame matches the final GIF frame.

use crate::colormap::Colormap;
use crate::error::{ConvertError, Result};
use crate::sequencer::{SliceRange, frame_delay_ms, gray_to_image, render_frame, select_frames};
use crate::transform::TransformSpec;

use image::{GrayImage, ImageFormat, RgbImage};
use ndarray::Array2;
use std::io::Cursor;
use std::time::Duration;
use web_time::Instant;

/// Encode a grayscale plane as PNG bytes.
pub fn encode_png_gray(plane: &Array2<u8>) -> Result<Vec<u8>> {
    let image: GrayImage = gray_to_image(plane);
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

pub fn encode_png_rgb(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// User-editable settings of the preview.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PreviewSettings {
    pub colormap: Colormap,
    pub range: SliceRange,
    pub transform: TransformSpec,
}

/// Renders preview frames from a received grayscale sequence.
///
/// The received frames may be a uniform subsample of the full sequence.
/// Slice range and reversal are always resolved against the full sequence,
/// exactly as the encoder does, and only the received frames inside that
/// selection are shown.
#[derive(Clone, Debug)]
pub struct PreviewRenderer {
    frames: Vec<Array2<u8>>,
    /// Index in the full sequence of each received frame, ascending.
    source_indices: Vec<usize>,
    source_total: usize,
    settings: PreviewSettings,
    /// Positions into `frames` in display order for the current settings.
    order: Vec<usize>,
}

impl PreviewRenderer {
    /// Renderer over a complete, unsubsampled sequence.
    pub fn new(frames: Vec<Array2<u8>>, settings: PreviewSettings) -> Result<Self> {
        let total = frames.len();
        Self::with_source_indices(frames, (0..total).collect(), total, settings)
    }

    /// Renderer over frames picked out of a sequence of `source_total`
    /// frames; `source_indices[i]` is where `frames[i]` came from.
    pub fn with_source_indices(
        frames: Vec<Array2<u8>>,
        source_indices: Vec<usize>,
        source_total: usize,
        settings: PreviewSettings,
    ) -> Result<Self> {
        if source_indices.len() != frames.len() {
            return Err(ConvertError::InvalidParameter(format!(
                "{} frames but {} source indices",
                frames.len(),
                source_indices.len()
            )));
        }
        let ascending = source_indices.windows(2).all(|w| w[0] < w[1]);
        if !ascending || source_indices.last().is_some_and(|&i| i >= source_total) {
            return Err(ConvertError::InvalidParameter(
                "source indices must be ascending and inside the sequence".into(),
            ));
        }
        let order = Self::resolve_order(&source_indices, source_total, &settings)?;
        Ok(Self {
            frames,
            source_indices,
            source_total,
            settings,
            order,
        })
    }

    /// Received frames that fall in the encoder's selection, in its order.
    ///
    /// A range narrower than the subsampling stride can miss every received
    /// frame; the received frame nearest to the selection is shown instead.
    fn resolve_order(
        source_indices: &[usize],
        source_total: usize,
        settings: &PreviewSettings,
    ) -> Result<Vec<usize>> {
        let selected = select_frames(
            source_total,
            &settings.range,
            settings.transform.reverse_slices,
            0,
        )?;
        let order: Vec<usize> = selected
            .iter()
            .filter_map(|s| source_indices.binary_search(s).ok())
            .collect();
        if !order.is_empty() {
            return Ok(order);
        }
        let target = selected.first().copied().unwrap_or(0);
        let nearest = (0..source_indices.len()).min_by_key(|&i| source_indices[i].abs_diff(target));
        Ok(nearest.into_iter().collect())
    }

    pub fn settings(&self) -> &PreviewSettings {
        &self.settings
    }

    /// Replace the settings. On error the previous settings stay active.
    pub fn update(&mut self, settings: PreviewSettings) -> Result<()> {
        self.order = Self::resolve_order(&self.source_indices, self.source_total, &settings)?;
        self.settings = settings;
        Ok(())
    }

    /// Frames available after range filtering.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of received frames.
    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    /// Length of the full sequence the frames were picked from.
    pub fn source_total(&self) -> usize {
        self.source_total
    }

    /// Index in the full sequence of the frame shown at logical `position`.
    pub fn physical_index(&self, position: usize) -> Option<usize> {
        self.order.get(position).map(|&i| self.source_indices[i])
    }

    /// Render the frame at logical `position`.
    pub fn render(&self, position: usize) -> Result<RgbImage> {
        let index = *self.order.get(position).ok_or_else(|| {
            ConvertError::InvalidParameter(format!(
                "frame {position} is outside the {} selected frames",
                self.order.len()
            ))
        })?;
        Ok(render_frame(
            &self.frames[index].view(),
            &self.settings.transform,
            self.settings.colormap.table(),
        ))
    }
}

/// Playback state. A playing player owns its only timestamp; pausing
/// drops it, so nothing keeps ticking after a stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing { last_advance: Instant },
}

/// Frame-rate gated playback over `len` logical frames.
#[derive(Clone, Debug)]
pub struct Player {
    state: PlayState,
    position: usize,
    len: usize,
    fps: u32,
}

impl Player {
    pub fn new(len: usize, fps: u32) -> Self {
        Self {
            state: PlayState::Stopped,
            position: 0,
            len,
            fps: fps.max(1),
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlayState::Playing { .. })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(frame_delay_ms(self.fps) as u64)
    }

    pub fn play(&mut self, now: Instant) {
        if self.len > 0 && !self.is_playing() {
            self.state = PlayState::Playing { last_advance: now };
        }
    }

    pub fn pause(&mut self) {
        self.state = PlayState::Stopped;
    }

    pub fn toggle(&mut self, now: Instant) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play(now);
        }
    }

    /// Takes effect on the next tick.
    pub fn set_fps(&mut self, fps: u32) {
        self.fps = fps.max(1);
    }

    /// Change the number of frames, e.g. after a new slice range.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        if len == 0 {
            self.position = 0;
            self.pause();
        } else if self.position >= len {
            self.position = 0;
        }
    }

    pub fn seek(&mut self, position: usize) {
        if self.len > 0 {
            self.position = position.min(self.len - 1);
        }
    }

    /// Advance at most one frame if a full interval has elapsed.
    ///
    /// Returns whether the position changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let PlayState::Playing { last_advance } = self.state else {
            return false;
        };
        if self.len == 0 || now.saturating_duration_since(last_advance) < self.interval() {
            return false;
        }
        self.position = (self.position + 1) % self.len;
        self.state = PlayState::Playing { last_advance: now };
        true
    }
}
