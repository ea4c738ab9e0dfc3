//! Colormap lookup tables.
//!
//! Tables are derived from closed-form definitions (polynomial fits for
//! the perceptually uniform maps, piecewise-linear ramps for the classic
//! ones), so any build of this crate produces identical tables without
//! shipping them as data.

use image::{Rgb, RgbImage};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Gray,
    Viridis,
    Plasma,
    Hot,
    Bone,
    Jet,
}

impl Colormap {
    pub const ALL: [Colormap; 6] = [
        Colormap::Gray,
        Colormap::Viridis,
        Colormap::Plasma,
        Colormap::Hot,
        Colormap::Bone,
        Colormap::Jet,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Colormap::Gray => "gray",
            Colormap::Viridis => "viridis",
            Colormap::Plasma => "plasma",
            Colormap::Hot => "hot",
            Colormap::Bone => "bone",
            Colormap::Jet => "jet",
        }
    }

    /// Colour at `t` in [0, 1], each channel in [0, 1].
    pub fn evaluate(&self, t: f64) -> [f64; 3] {
        let t = t.clamp(0.0, 1.0);
        match self {
            Colormap::Gray => [t, t, t],
            Colormap::Viridis => polynomial(&VIRIDIS_COEFFS, t),
            Colormap::Plasma => polynomial(&PLASMA_COEFFS, t),
            Colormap::Hot => piecewise(&HOT_SEGMENTS, t),
            Colormap::Bone => piecewise(&BONE_SEGMENTS, t),
            Colormap::Jet => piecewise(&JET_SEGMENTS, t),
        }
    }

    /// The 256-entry table for this colormap, built once per process.
    pub fn table(&self) -> &'static ColormapTable {
        static TABLES: OnceLock<[ColormapTable; 6]> = OnceLock::new();
        let tables = TABLES.get_or_init(|| Colormap::ALL.map(ColormapTable::build));
        &tables[*self as usize]
    }
}

impl FromStr for Colormap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Colormap::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown colormap '{s}'"))
    }
}

impl std::fmt::Display for Colormap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 256 RGB entries indexed by grayscale value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColormapTable {
    entries: [[u8; 3]; 256],
}

impl ColormapTable {
    pub fn build(colormap: Colormap) -> Self {
        let mut entries = [[0u8; 3]; 256];
        for (i, entry) in entries.iter_mut().enumerate() {
            let rgb = colormap.evaluate(i as f64 / 255.0);
            *entry = rgb.map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8);
        }
        // gray is the identity by definition, not by floating point luck
        if colormap == Colormap::Gray {
            for (i, entry) in entries.iter_mut().enumerate() {
                *entry = [i as u8; 3];
            }
        }
        Self { entries }
    }

    #[inline]
    pub fn lookup(&self, value: u8) -> [u8; 3] {
        self.entries[value as usize]
    }

    pub fn entries(&self) -> &[[u8; 3]; 256] {
        &self.entries
    }

    /// Colour a grayscale plane of rows x columns.
    pub fn apply(&self, gray: &ArrayView2<u8>) -> RgbImage {
        let (height, width) = gray.dim();
        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            Rgb(self.lookup(gray[[y as usize, x as usize]]))
        })
    }
}

fn polynomial(coeffs: &[[f64; 3]; 7], t: f64) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (ch, value) in out.iter_mut().enumerate() {
        // Horner, highest degree first
        *value = coeffs
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * t + c[ch])
            .clamp(0.0, 1.0);
    }
    out
}

type Segment = &'static [(f64, f64)];

fn piecewise(segments: &[Segment; 3], t: f64) -> [f64; 3] {
    segments.map(|anchors| {
        let idx = anchors.partition_point(|&(x, _)| x <= t);
        if idx == 0 {
            return anchors[0].1;
        }
        if idx >= anchors.len() {
            return anchors[anchors.len() - 1].1;
        }
        let (x0, y0) = anchors[idx - 1];
        let (x1, y1) = anchors[idx];
        if x1 <= x0 {
            return y1;
        }
        y0 + (y1 - y0) * (t - x0) / (x1 - x0)
    })
}

/// Degree-6 least squares fit of viridis, c0..c6 per channel.
const VIRIDIS_COEFFS: [[f64; 3]; 7] = [
    [0.277_727_327_223_417_7, 0.005_407_344_544_966_578, 0.334_099_805_335_306_1],
    [0.105_093_043_108_577_4, 1.404_613_529_898_575, 1.384_590_162_594_685],
    [-0.330_861_828_725_556_3, 0.214_847_559_468_213, 0.095_095_163_028_236_59],
    [-4.634_230_498_983_486, -5.799_100_973_351_585, -19.332_440_956_279_87],
    [6.228_269_936_347_081, 14.179_933_366_805_09, 56.690_552_600_681_05],
    [4.776_384_997_670_288, -13.745_145_377_746_01, -65.353_032_633_372_34],
    [-5.435_455_855_934_631, 4.645_852_612_178_535, 26.312_435_249_583_2],
];

/// Degree-6 least squares fit of plasma, c0..c6 per channel.
const PLASMA_COEFFS: [[f64; 3]; 7] = [
    [0.058_732_343_923_997_02, 0.023_336_708_925_656_64, 0.543_340_182_674_875_4],
    [2.176_514_634_195_958, 0.238_383_417_126_018_2, 0.753_960_459_978_403_6],
    [-2.689_460_476_458_034, -7.455_851_135_738_909, 3.110_799_939_717_086],
    [6.130_348_345_893_603, 42.346_188_147_722_7, -28.518_854_653_321_58],
    [-11.107_436_190_622_71, -82.666_311_094_280_45, 60.139_847_674_182_63],
    [10.023_065_576_470_65, 71.413_617_700_953_49, -54.072_186_555_600_67],
    [-3.658_713_842_777_788, -22.931_534_654_611_49, 18.191_907_785_398_28],
];

const HOT_SEGMENTS: [Segment; 3] = [
    &[(0.0, 0.0416), (0.365079, 1.0), (1.0, 1.0)],
    &[(0.0, 0.0), (0.365079, 0.0), (0.746032, 1.0), (1.0, 1.0)],
    &[(0.0, 0.0), (0.746032, 0.0), (1.0, 1.0)],
];

const BONE_SEGMENTS: [Segment; 3] = [
    &[(0.0, 0.0), (0.746032, 0.652778), (1.0, 1.0)],
    &[(0.0, 0.0), (0.365079, 0.319444), (0.746032, 0.777778), (1.0, 1.0)],
    &[(0.0, 0.0), (0.365079, 0.444444), (1.0, 1.0)],
];

const JET_SEGMENTS: [Segment; 3] = [
    &[(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)],
    &[(0.0, 0.0), (0.125, 0.0), (0.375, 1.0), (0.64, 1.0), (0.91, 0.0), (1.0, 0.0)],
    &[(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)],
];
