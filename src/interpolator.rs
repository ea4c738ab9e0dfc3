use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

/// Pixels whose spacings differ by less than this are treated as square.
const ISOTROPIC_TOLERANCE_MM: f32 = 0.01;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Output (height, width) that makes a plane's pixels square, or `None`
    /// if the plane is already isotropic.
    ///
    /// `spacing` is (horizontal, vertical) in mm, `original_dim` is
    /// (height, width).
    pub(crate) fn get_isotropic_dimensions(
        spacing: (f32, f32),
        original_dim: (usize, usize),
    ) -> Option<(usize, usize)> {
        let (h_spacing, v_spacing) = spacing;
        if (h_spacing - v_spacing).abs() < ISOTROPIC_TOLERANCE_MM
            || h_spacing <= 0.0
            || v_spacing <= 0.0
        {
            return None;
        }
        let inv_min_spacing = 1.0 / h_spacing.min(v_spacing);

        let new_w = (original_dim.1 as f32 * h_spacing * inv_min_spacing).round() as usize;
        let new_h = (original_dim.0 as f32 * v_spacing * inv_min_spacing).round() as usize;

        Some((new_h.max(1), new_w.max(1)))
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Map an output pixel centre back into source coordinates.
    #[inline]
    fn source_coordinate(out: usize, out_len: usize, src_len: usize) -> f32 {
        let norm = (out as f32 + 0.5) / out_len as f32;
        (norm * src_len as f32 - 0.5).clamp(0.0, (src_len - 1) as f32)
    }

    /// Bilinear resample of a raw intensity plane.
    pub(crate) fn resample_plane(
        slice: &ArrayView2<f32>,
        height: usize,
        width: usize,
    ) -> Array2<f32> {
        let (slice_height, slice_width) = slice.dim();

        let pixel_data: Vec<f32> = (0..height)
            .into_par_iter()
            .flat_map_iter(|y| {
                let src_y = Self::source_coordinate(y, height, slice_height);
                (0..width).map(move |x| {
                    let src_x = Self::source_coordinate(x, width, slice_width);
                    Self::bilinear_interpolate(slice, src_y, src_x)
                })
            })
            .collect();

        Array2::from_shape_fn((height, width), |(y, x)| pixel_data[y * width + x])
    }

    /// Resize an interleaved 8-bit image. Shrinking averages the covered
    /// source area, growing interpolates bilinearly.
    pub(crate) fn resize_interleaved(
        src: &[u8],
        width: usize,
        height: usize,
        channels: usize,
        new_width: usize,
        new_height: usize,
    ) -> Vec<u8> {
        if new_width == width && new_height == height {
            return src.to_vec();
        }
        if new_width * new_height < width * height {
            Self::area_average(src, width, height, channels, new_width, new_height)
        } else {
            Self::bilinear_u8(src, width, height, channels, new_width, new_height)
        }
    }

    /// Per output index, the source indices it covers and their weights.
    fn area_weights(src_len: usize, out_len: usize) -> Vec<Vec<(usize, f32)>> {
        let scale = src_len as f64 / out_len as f64;
        (0..out_len)
            .map(|o| {
                let start = o as f64 * scale;
                let end = (o + 1) as f64 * scale;
                let first = start.floor() as usize;
                let last = (end.ceil() as usize).min(src_len);
                (first..last)
                    .filter_map(|s| {
                        let overlap = (end.min((s + 1) as f64) - start.max(s as f64)) / scale;
                        (overlap > 0.0).then_some((s, overlap as f32))
                    })
                    .collect()
            })
            .collect()
    }

    fn area_average(
        src: &[u8],
        width: usize,
        height: usize,
        channels: usize,
        new_width: usize,
        new_height: usize,
    ) -> Vec<u8> {
        let x_weights = Self::area_weights(width, new_width);
        let y_weights = Self::area_weights(height, new_height);

        // horizontal pass: height x new_width
        let rows: Vec<f32> = (0..height)
            .into_par_iter()
            .flat_map_iter(|y| {
                let row = &src[y * width * channels..(y + 1) * width * channels];
                x_weights.iter().flat_map(move |weights| {
                    (0..channels).map(move |c| {
                        weights
                            .iter()
                            .map(|&(x, w)| row[x * channels + c] as f32 * w)
                            .sum::<f32>()
                    })
                })
            })
            .collect();

        let stride = new_width * channels;
        (0..new_height)
            .into_par_iter()
            .flat_map_iter(|oy| {
                let weights = &y_weights[oy];
                let rows = &rows;
                (0..stride).map(move |i| {
                    let v: f32 = weights.iter().map(|&(y, w)| rows[y * stride + i] * w).sum();
                    v.round().clamp(0.0, 255.0) as u8
                })
            })
            .collect()
    }

    fn bilinear_u8(
        src: &[u8],
        width: usize,
        height: usize,
        channels: usize,
        new_width: usize,
        new_height: usize,
    ) -> Vec<u8> {
        (0..new_height)
            .into_par_iter()
            .flat_map_iter(|y| {
                let src_y = Self::source_coordinate(y, new_height, height);
                let y0 = src_y.floor() as usize;
                let y1 = (y0 + 1).min(height - 1);
                let dy = src_y - y0 as f32;
                (0..new_width).flat_map(move |x| {
                    let src_x = Self::source_coordinate(x, new_width, width);
                    let x0 = src_x.floor() as usize;
                    let x1 = (x0 + 1).min(width - 1);
                    let dx = src_x - x0 as f32;
                    (0..channels).map(move |c| {
                        let at = |yy: usize, xx: usize| src[(yy * width + xx) * channels + c] as f32;
                        let v0 = at(y0, x0).mul_add(1.0 - dx, at(y0, x1) * dx);
                        let v1 = at(y1, x0).mul_add(1.0 - dx, at(y1, x1) * dx);
                        v0.mul_add(1.0 - dy, v1 * dy).round().clamp(0.0, 255.0) as u8
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn isotropic_plane_is_left_alone() {
        assert_eq!(Interpolator::get_isotropic_dimensions((0.8, 0.805), (10, 10)), None);
    }

    #[test]
    fn thick_slices_are_stretched() {
        // 2 mm vertically, 1 mm horizontally: height doubles
        let dims = Interpolator::get_isotropic_dimensions((1.0, 2.0), (10, 20));
        assert_eq!(dims, Some((20, 20)));
    }

    #[test]
    fn resampled_plane_keeps_row_order() {
        let plane = ndarray::arr2(&[[1.0f32, 2.0, 3.0], [10.0, 20.0, 30.0]]);
        let out = Interpolator::resample_plane(&plane.view(), 4, 3);
        assert_eq!(out.dim(), (4, 3));
        for x in 0..3 {
            assert_abs_diff_eq!(out[[0, x]], plane[[0, x]], epsilon = 1e-4);
            assert_abs_diff_eq!(out[[3, x]], plane[[1, x]], epsilon = 1e-4);
        }
        assert!(out[[1, 0]] > 1.0 && out[[1, 0]] < 10.0);
    }

    #[test]
    fn area_average_of_uniform_block() {
        let src = vec![100u8; 4 * 4];
        let out = Interpolator::resize_interleaved(&src, 4, 4, 1, 2, 2);
        assert_eq!(out, vec![100; 4]);
    }

    #[test]
    fn area_average_mixes_neighbours() {
        // 0 255 / 0 255 halves to a single 128 column pair
        let src = vec![0u8, 255, 0, 255];
        let out = Interpolator::resize_interleaved(&src, 2, 2, 1, 1, 1);
        assert_eq!(out, vec![128]);
    }

    #[test]
    fn upscaling_keeps_constant_image() {
        let src = vec![7u8, 8, 9, 7, 8, 9];
        let out = Interpolator::resize_interleaved(&src, 1, 2, 3, 3, 6);
        assert_eq!(out.len(), 3 * 6 * 3);
        for px in out.chunks(3) {
            assert_eq!(px, &[7, 8, 9]);
        }
    }
}
