//! Lookup tables shared by all dithering strategies.
//!
//! For every bit depth from 0 to 8 there is a bit-copy table (sample to its truncated value with
//! the kept bits replicated downwards) and two interpolation tables giving, for every sample,
//! the representable values just below and above it and how far between them it sits.

use once_cell::sync::Lazy;

/// Exponent of the power curve used to blend in linear light.
///
/// 2.2 overshoots visibly at 1 bit.
pub const GAMMA: f64 = 2.15;

/// How the position of a sample between two representable values is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    /// Colour channels: samples are treated as gamma-encoded and blended in linear light.
    LinearLight,
    /// Alpha and pattern occupancy: samples are blended as-is.
    Direct,
}

impl Curve {
    #[inline]
    fn weight(self, value: usize) -> f64 {
        match self {
            Curve::LinearLight => (value as f64).powf(GAMMA),
            Curve::Direct => value as f64,
        }
    }
}

/// The two representable values around a sample and the sample's position between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolation {
    pub low: u8,
    /// 0.0 at `low`, approaching 1.0 towards `high`.
    pub fraction: f64,
    pub high: u8,
}

impl Interpolation {
    const fn flat(value: u8) -> Self {
        Self {
            low: value,
            fraction: 0.0,
            high: value,
        }
    }
}

/// Builds the 256-entry interpolation table for a sorted list of representable points.
///
/// Samples below the first point or above the last one clamp to it. A sample exactly on a
/// point gets that point as `low` with a fraction of 0. Duplicate points are harmless.
pub fn interpolation_table(points: &[u8], curve: Curve) -> Vec<Interpolation> {
    debug_assert!(points.windows(2).all(|w| w[0] <= w[1]));

    let mut table = Vec::with_capacity(256);
    let Some(&first) = points.first() else {
        return vec![Interpolation::flat(0); 256];
    };

    while table.len() < usize::from(first) {
        table.push(Interpolation::flat(first));
    }

    let mut last = first;
    for &point in points {
        let (low, high) = (curve.weight(last.into()), curve.weight(point.into()));
        while table.len() < usize::from(point) {
            let here = curve.weight(table.len());
            let fraction = ((here - low) / (high - low)).clamp(0.0, 1.0);
            table.push(Interpolation {
                low: last,
                fraction,
                high: point,
            });
        }
        last = point;
    }

    while table.len() < 256 {
        table.push(Interpolation::flat(last));
    }

    table
}

/// The mask keeping the top `bits` bits of a sample.
#[inline]
pub const fn mask(bits: u8) -> u8 {
    ((0xFF00u16 >> bits) & 0xFF) as u8
}

/// Truncates a sample to its top `bits` bits and fills the rest by repeating them.
pub const fn bitcopy(sample: u8, bits: u8) -> u8 {
    if bits == 0 {
        return 0;
    }
    let kept = (sample & mask(bits)) as u32;
    let mut value = kept;
    let mut copy = kept >> bits;
    while copy != 0 {
        value |= copy;
        copy >>= bits;
    }
    value as u8
}

/// Tables for a single bit depth.
#[derive(Debug)]
pub struct DepthTables {
    pub bitcopy: [u8; 256],
    pub linear_light: Vec<Interpolation>,
    pub direct: Vec<Interpolation>,
}

impl DepthTables {
    fn new(bits: u8) -> Self {
        let mut bitcopy_table = [0; 256];
        for (sample, out) in (0..=u8::MAX).zip(bitcopy_table.iter_mut()) {
            *out = bitcopy(sample, bits);
        }

        let mut points = bitcopy_table.to_vec();
        points.sort_unstable();
        points.dedup();

        Self {
            bitcopy: bitcopy_table,
            linear_light: interpolation_table(&points, Curve::LinearLight),
            direct: interpolation_table(&points, Curve::Direct),
        }
    }

    #[inline]
    pub fn interpolation(&self, sample: u8, curve: Curve) -> Interpolation {
        match curve {
            Curve::LinearLight => self.linear_light[usize::from(sample)],
            Curve::Direct => self.direct[usize::from(sample)],
        }
    }
}

static TABLES: Lazy<Vec<DepthTables>> = Lazy::new(|| (0..=8).map(DepthTables::new).collect());

/// The tables for `bits` (0 to 8 inclusive).
///
/// # Panics
///
/// If `bits` is greater than 8.
pub fn tables(bits: u8) -> &'static DepthTables {
    assert!(bits <= 8, "can't dither to {bits} bits, at most 8 are supported");
    &TABLES[usize::from(bits)]
}
