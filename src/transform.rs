//! Geometric transforms shared by the final encoder and the preview.
//!
//! Per-pixel transforms run in a fixed order: rotate clockwise by
//! `rotate90 * 90°`, then flip horizontally, then flip vertically. Slice
//! reversal is a sequence operation and lives in [`crate::sequencer`].

use ndarray::{Array, Axis, Dimension};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformSpec {
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Number of clockwise quarter turns, taken modulo 4.
    pub rotate90: u8,
    pub reverse_slices: bool,
}

impl TransformSpec {
    pub fn quarter_turns(&self) -> u8 {
        self.rotate90 % 4
    }

    /// Whether any per-pixel transform is set.
    pub fn is_identity(&self) -> bool {
        self.quarter_turns() == 0 && !self.flip_horizontal && !self.flip_vertical
    }

    /// Output (height, width) for an input of the given size.
    pub fn output_dim(&self, height: usize, width: usize) -> (usize, usize) {
        if self.quarter_turns() % 2 == 1 {
            (width, height)
        } else {
            (height, width)
        }
    }

    /// Names of the applied transforms, in application order.
    pub fn describe(&self) -> Vec<String> {
        let mut applied = Vec::new();
        if self.reverse_slices {
            applied.push("reversed".to_string());
        }
        if self.quarter_turns() > 0 {
            applied.push(format!("rotated_{}deg", self.quarter_turns() as u32 * 90));
        }
        if self.flip_horizontal {
            applied.push("flip_horizontal".to_string());
        }
        if self.flip_vertical {
            applied.push("flip_vertical".to_string());
        }
        applied
    }
}

/// Rotate an image one quarter turn clockwise.
///
/// Axis 0 is rows and axis 1 is columns; any trailing axes (channels)
/// are carried along.
pub fn rotate_cw<A, D>(mut image: Array<A, D>) -> Array<A, D>
where
    A: Clone,
    D: Dimension,
{
    image.swap_axes(0, 1);
    image.invert_axis(Axis(1));
    image
}

/// Apply the per-pixel part of `spec` to an image of rows x columns (x channels).
pub fn apply_transform<A, D>(image: Array<A, D>, spec: &TransformSpec) -> Array<A, D>
where
    A: Clone,
    D: Dimension,
{
    if spec.is_identity() {
        return image;
    }
    let mut image = image;
    for _ in 0..spec.quarter_turns() {
        image = rotate_cw(image);
    }
    if spec.flip_horizontal {
        image.invert_axis(Axis(1));
    }
    if spec.flip_vertical {
        image.invert_axis(Axis(0));
    }
    image.as_standard_layout().into_owned()
}
