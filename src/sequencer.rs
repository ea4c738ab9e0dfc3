//! Frame selection, rendering, resizing and GIF encoding.

use crate::colormap::ColormapTable;
use crate::error::{ConvertError, Result};
use crate::interpolator::Interpolator;
use crate::transform::{TransformSpec, apply_transform};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, GrayImage, Rgb, RgbImage};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Sub-range of a frame sequence, in whole percent of its length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceRange {
    pub start: u32,
    pub end: u32,
}

impl Default for SliceRange {
    fn default() -> Self {
        Self { start: 0, end: 100 }
    }
}

impl SliceRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn is_full(&self) -> bool {
        self.start == 0 && self.end >= 100
    }

    /// Physical index range selected out of `total` frames.
    ///
    /// `start = floor(total * start%)`, `end = max(start + 1, floor(total * end%))`,
    /// both clipped to `total`.
    pub fn resolve(&self, total: usize) -> Result<std::ops::Range<usize>> {
        let start_pct = self.start.min(100) as usize;
        let end_pct = self.end.min(100) as usize;
        let start = (total * start_pct / 100).min(total);
        let end = (total * end_pct / 100).max(start + 1).min(total);
        if start >= end {
            return Err(ConvertError::EmptySelection {
                total,
                start: self.start,
                end: self.end,
            });
        }
        Ok(start..end)
    }
}

/// Uniform-stride pick of `max` positions out of `len`: `floor(i * len / max)`.
pub fn uniform_indices(len: usize, max: usize) -> Vec<usize> {
    if max == 0 || len <= max {
        return (0..len).collect();
    }
    (0..max).map(|i| i * len / max).collect()
}

/// Final frame order for a sequence of `total` frames.
///
/// Range filter, then optional reversal of the filtered subset, then
/// uniform downsampling to at most `max_frames` (0 means no cap). Both
/// the encoder and the preview resolve frames through this function.
pub fn select_frames(
    total: usize,
    range: &SliceRange,
    reverse: bool,
    max_frames: usize,
) -> Result<Vec<usize>> {
    let selected = range.resolve(total)?;
    let mut ordered: Vec<usize> = selected.collect();
    if reverse {
        ordered.reverse();
    }
    let picks = uniform_indices(ordered.len(), max_frames);
    Ok(picks.into_iter().map(|i| ordered[i]).collect())
}

/// Render one grayscale frame: transform, then colour.
///
/// Pure; used unchanged by the batch encoder and by the preview.
pub fn render_frame(gray: &ArrayView2<u8>, transform: &TransformSpec, table: &ColormapTable) -> RgbImage {
    let transformed = apply_transform(gray.to_owned(), transform);
    table.apply(&transformed.view())
}

/// Size whose longer side equals `max_size`, keeping aspect ratio.
pub fn fit_dimensions(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if max_size == 0 || width == 0 || height == 0 {
        return (width, height);
    }
    let (w, h, m) = (width as u64, height as u64, max_size as u64);
    if h > w {
        (((w * m) / h).max(1) as u32, max_size)
    } else {
        (max_size, ((h * m) / w).max(1) as u32)
    }
}

/// Resize so the longer side is `max_size` (area averaging down, bilinear up).
pub fn resize_rgb(image: &RgbImage, max_size: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (new_w, new_h) = fit_dimensions(width, height, max_size);
    if (new_w, new_h) == (width, height) {
        return image.clone();
    }
    let data = Interpolator::resize_interleaved(
        image.as_raw(),
        width as usize,
        height as usize,
        3,
        new_w as usize,
        new_h as usize,
    );
    RgbImage::from_fn(new_w, new_h, |x, y| {
        let at = (y as usize * new_w as usize + x as usize) * 3;
        Rgb([data[at], data[at + 1], data[at + 2]])
    })
}

/// Resize a grayscale plane so its longer side is `max_size`.
pub fn resize_plane(plane: &Array2<u8>, max_size: u32) -> Array2<u8> {
    let (height, width) = plane.dim();
    let (new_w, new_h) = fit_dimensions(width as u32, height as u32, max_size);
    let (new_w, new_h) = (new_w as usize, new_h as usize);
    if (new_h, new_w) == (height, width) {
        return plane.clone();
    }
    let src: Vec<u8> = plane.iter().copied().collect();
    let data = Interpolator::resize_interleaved(&src, width, height, 1, new_w, new_h);
    Array2::from_shape_fn((new_h, new_w), |(y, x)| data[y * new_w + x])
}

pub fn gray_to_image(plane: &Array2<u8>) -> GrayImage {
    let (height, width) = plane.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        image::Luma([plane[[y as usize, x as usize]]])
    })
}

/// Frame delay in milliseconds for a playback rate.
pub fn frame_delay_ms(fps: u32) -> u32 {
    let fps = fps.max(1);
    (1000 + fps / 2) / fps
}

/// Settings that turn a windowed sequence into an encoded animation.
#[derive(Clone, Debug)]
pub struct SequenceSettings {
    pub range: SliceRange,
    pub transform: TransformSpec,
    pub max_frames: usize,
    /// Longer side of the output frames, 0 keeps native size.
    pub max_size: u32,
    pub fps: u32,
}

/// Ordered rendered frames ready for encoding.
#[derive(Clone, Debug)]
pub struct FrameSet {
    pub frames: Vec<RgbImage>,
    /// Physical source index of each frame.
    pub source_indices: Vec<usize>,
    pub delay_ms: u32,
}

impl FrameSet {
    /// Select, transform, colour and resize frames from a windowed sequence.
    pub fn build(
        gray_frames: &[Array2<u8>],
        settings: &SequenceSettings,
        table: &ColormapTable,
    ) -> Result<Self> {
        let source_indices = select_frames(
            gray_frames.len(),
            &settings.range,
            settings.transform.reverse_slices,
            settings.max_frames,
        )?;
        debug!(
            total = gray_frames.len(),
            selected = source_indices.len(),
            "Frames selected"
        );

        let frames: Vec<RgbImage> = source_indices
            .par_iter()
            .map(|&i| {
                let rendered = render_frame(&gray_frames[i].view(), &settings.transform, table);
                resize_rgb(&rendered, settings.max_size)
            })
            .collect();

        Ok(Self {
            frames,
            source_indices,
            delay_ms: frame_delay_ms(settings.fps),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.first().map(|f| f.dimensions())
    }

    /// Encode as an endlessly looping GIF.
    ///
    /// `max_bytes` caps the artifact size, 0 for no cap.
    pub fn encode_gif(&self, max_bytes: usize) -> Result<Vec<u8>> {
        if self.frames.is_empty() {
            return Err(ConvertError::EncodingFailure("no frames to encode".into()));
        }
        let mut buffer = Vec::new();
        {
            let mut encoder = GifEncoder::new_with_speed(&mut buffer, 10);
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| ConvertError::EncodingFailure(e.to_string()))?;
            let delay = Delay::from_numer_denom_ms(self.delay_ms, 1);
            let frames = self.frames.iter().map(|rgb| {
                let rgba = DynamicImage::ImageRgb8(rgb.clone()).to_rgba8();
                Frame::from_parts(rgba, 0, 0, delay)
            });
            encoder
                .encode_frames(frames)
                .map_err(|e| ConvertError::EncodingFailure(e.to_string()))?;
        }

        if max_bytes > 0 && buffer.len() > max_bytes {
            return Err(ConvertError::EncodingFailure(format!(
                "GIF is {} bytes, limit is {max_bytes}",
                buffer.len()
            )));
        }
        info!(
            frames = self.frames.len(),
            bytes = buffer.len(),
            delay_ms = self.delay_ms,
            "GIF encoded"
        );
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_resolves_like_percent_math() {
        assert_eq!(SliceRange::new(20, 80).resolve(10).unwrap(), 2..8);
        assert_eq!(SliceRange::new(0, 100).resolve(7).unwrap(), 0..7);
    }

    #[test]
    fn collapsed_range_keeps_one_frame() {
        assert_eq!(SliceRange::new(50, 50).resolve(10).unwrap(), 5..6);
        assert_eq!(SliceRange::new(10, 12).resolve(3).unwrap(), 0..1);
    }

    #[test]
    fn range_at_the_end_is_empty() {
        assert!(matches!(
            SliceRange::new(100, 100).resolve(10),
            Err(ConvertError::EmptySelection { total: 10, .. })
        ));
        assert!(SliceRange::default().resolve(0).is_err());
    }

    #[test]
    fn stride_downsampling() {
        assert_eq!(uniform_indices(6, 3), vec![0, 2, 4]);
        assert_eq!(uniform_indices(5, 0), vec![0, 1, 2, 3, 4]);
        assert_eq!(uniform_indices(10, 4), vec![0, 2, 5, 7]);
    }

    #[test]
    fn delay_is_rounded() {
        assert_eq!(frame_delay_ms(10), 100);
        assert_eq!(frame_delay_ms(3), 333);
        assert_eq!(frame_delay_ms(30), 33);
        assert_eq!(frame_delay_ms(7), 143);
    }

    #[test]
    fn plane_resize_keeps_constant_value() {
        let plane = Array2::from_elem((20, 10), 77u8);
        let small = resize_plane(&plane, 8);
        assert_eq!(small.dim(), (8, 4));
        assert!(small.iter().all(|&v| v == 77));
    }

    #[test]
    fn rgb_resize_keeps_colours_in_place() {
        // red left half, blue right half
        let image = RgbImage::from_fn(4, 2, |x, _| if x < 2 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) });
        let small = resize_rgb(&image, 2);
        assert_eq!(small.dimensions(), (2, 1));
        assert_eq!(small.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(small.get_pixel(1, 0), &Rgb([0, 0, 255]));

        let large = resize_rgb(&image, 8);
        assert_eq!(large.dimensions(), (8, 4));
        assert_eq!(large.get_pixel(0, 3), &Rgb([255, 0, 0]));
        assert_eq!(large.get_pixel(7, 0), &Rgb([0, 0, 255]));
    }

    #[test]
    fn fit_keeps_aspect() {
        assert_eq!(fit_dimensions(200, 100, 64), (64, 32));
        assert_eq!(fit_dimensions(100, 200, 64), (32, 64));
        assert_eq!(fit_dimensions(10, 20, 40), (20, 40));
        assert_eq!(fit_dimensions(10, 20, 0), (10, 20));
    }
}
