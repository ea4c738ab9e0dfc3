//! Intensity windowing: raw intensities to 8-bit grayscale.
//!
//! Windowing is a two-pass protocol. [`WindowBounds::compute`] looks at the
//! whole frame sequence once, then [`WindowBounds::apply`] maps every frame
//! with the same bounds, so brightness never changes between frames.

use crate::enums::WindowMode;
use crate::volume::Slice;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_LOWER_PERCENTILE: f64 = 1.0;
pub const DEFAULT_UPPER_PERCENTILE: f64 = 99.0;

/// How the intensity range mapped to 0..=255 is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WindowSpec {
    Auto {
        lower_percentile: f64,
        upper_percentile: f64,
    },
    Manual {
        width: f64,
        level: f64,
    },
}

impl Default for WindowSpec {
    fn default() -> Self {
        WindowSpec::Auto {
            lower_percentile: DEFAULT_LOWER_PERCENTILE,
            upper_percentile: DEFAULT_UPPER_PERCENTILE,
        }
    }
}

impl WindowSpec {
    /// Build a spec from request-style width/level values.
    ///
    /// In auto mode the pair describes a percentile band (width 98 around
    /// level 50 is the 1st to 99th percentile); in manual mode it is an
    /// absolute intensity window such as Hounsfield units.
    pub fn from_width_level(mode: WindowMode, width: f64, level: f64) -> Self {
        match mode {
            WindowMode::Auto => {
                let half = width / 2.0;
                WindowSpec::Auto {
                    lower_percentile: (level - half).clamp(0.0, 100.0),
                    upper_percentile: (level + half).clamp(0.0, 100.0),
                }
            }
            WindowMode::Manual => WindowSpec::Manual { width, level },
        }
    }

    pub fn describe(&self) -> String {
        match self {
            WindowSpec::Auto {
                lower_percentile,
                upper_percentile,
            } => format!("auto P{lower_percentile}-P{upper_percentile}"),
            WindowSpec::Manual { width, level } => format!("manual W:{width} L:{level}"),
        }
    }
}

/// Resolved intensity bounds shared by every frame of a sequence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WindowBounds {
    pub lower: f64,
    pub upper: f64,
}

impl WindowBounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        let upper = if upper <= lower {
            lower + lower.abs().max(1.0) * f64::EPSILON
        } else {
            upper
        };
        Self { lower, upper }
    }

    /// First pass: resolve the bounds from the full frame sequence.
    pub fn compute(slices: &[Slice], spec: &WindowSpec) -> Self {
        let bounds = match *spec {
            WindowSpec::Manual { width, level } => {
                Self::new(level - width / 2.0, level + width / 2.0)
            }
            WindowSpec::Auto {
                lower_percentile,
                upper_percentile,
            } => {
                let mut values: Vec<f32> = slices
                    .iter()
                    .flat_map(|s| s.data.iter().copied())
                    .filter(|v| v.is_finite())
                    .collect();
                let lower = percentile(&mut values, lower_percentile);
                let upper = percentile(&mut values, upper_percentile);
                Self::new(lower, upper)
            }
        };
        debug!(lower = bounds.lower, upper = bounds.upper, "Window bounds resolved");
        bounds
    }

    #[inline]
    pub fn map_value(&self, value: f32) -> u8 {
        let value = value as f64;
        if value.is_nan() || value <= self.lower {
            return 0;
        }
        if value >= self.upper {
            return 255;
        }
        ((value - self.lower) / (self.upper - self.lower) * 255.0)
            .round()
            .clamp(0.0, 255.0) as u8
    }

    pub fn map_plane(&self, plane: &Array2<f32>) -> Array2<u8> {
        plane.mapv(|v| self.map_value(v))
    }

    /// Second pass: map every frame with these bounds, preserving order.
    pub fn apply(&self, slices: &[Slice]) -> Vec<Array2<u8>> {
        slices
            .par_iter()
            .map(|s| self.map_plane(&s.data))
            .collect()
    }
}

/// Percentile `p` (0..=100) with linear interpolation between closest ranks.
///
/// Reorders `values`. Returns 0 for an empty input.
pub fn percentile(values: &mut [f32], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len();
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;

    let (_, lo_value, upper) = values.select_nth_unstable_by(lo, f32::total_cmp);
    let lo_value = *lo_value as f64;
    if hi == lo {
        return lo_value;
    }
    // the next rank is the smallest element above the pivot
    let hi_value = upper
        .iter()
        .copied()
        .min_by(f32::total_cmp)
        .map(|v| v as f64)
        .unwrap_or(lo_value);
    lo_value + (hi_value - lo_value) * (rank - lo as f64)
}

/// Window a frame sequence in two passes.
pub fn window_slices(slices: &[Slice], spec: &WindowSpec) -> (WindowBounds, Vec<Array2<u8>>) {
    let bounds = WindowBounds::compute(slices, spec);
    let frames = bounds.apply(slices);
    (bounds, frames)
}
