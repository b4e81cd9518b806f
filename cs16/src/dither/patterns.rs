//! Ordered dithering patterns.
//!
//! A [`PatternSet`] is a family of on/off tiles ordered by how many of their cells are on. The
//! fraction between two representable values picks a tile, and the tile decides per pixel
//! whether the low or the high value is used.

use super::tables::{interpolation_table, Curve};
use once_cell::sync::Lazy;

/// A rectangular tile of on/off cells, repeated across the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DitherBitPattern {
    width: usize,
    height: usize,
    cells: Vec<bool>,
    value: u8,
}

impl DitherBitPattern {
    /// Builds a pattern from rows of cells. All rows must have the same, non-zero, length.
    pub fn new(rows: &[&[u8]]) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.len());
        assert!(
            width > 0 && rows.iter().all(|row| row.len() == width),
            "dither patterns must be non-empty rectangles"
        );

        let cells = rows
            .iter()
            .flat_map(|row| row.iter().map(|&cell| cell != 0))
            .collect();
        Self::from_cells(width, height, cells)
    }

    fn from_cells(width: usize, height: usize, cells: Vec<bool>) -> Self {
        let occupancy = cells.iter().filter(|&&on| on).count();
        let value = (occupancy * 255 / cells.len()) as u8;
        Self {
            width,
            height,
            cells,
            value,
        }
    }

    /// All threshold patterns of an ordered dither matrix.
    ///
    /// `matrix` holds each cell's threshold from 1 to `width * height`. Level `n` turns on every
    /// cell with a threshold of at most `n`, so the levels run from all-off to all-on.
    pub fn from_matrix(width: usize, height: usize, matrix: &[u16]) -> Vec<Self> {
        assert_eq!(matrix.len(), width * height);
        (0..=matrix.len())
            .map(|level| {
                let cells = matrix
                    .iter()
                    .map(|&threshold| level >= usize::from(threshold))
                    .collect();
                Self::from_cells(width, height, cells)
            })
            .collect()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Occupancy scaled to 0-255.
    #[inline]
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Whether the cell covering `(x, y)` is on. The pattern repeats in both directions.
    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> bool {
        self.cells[(x % self.width) + (y % self.height) * self.width]
    }
}

/// Two neighbouring patterns and the position between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternStep {
    pub low: usize,
    pub fraction: f64,
    pub high: usize,
}

/// Patterns ordered by occupancy, with a 256-entry lookup from fraction to pattern pair.
#[derive(Debug)]
pub struct PatternSet {
    patterns: Vec<DitherBitPattern>,
    steps: Vec<PatternStep>,
}

impl PatternSet {
    /// Orders the patterns by occupancy. Of patterns with equal occupancy, the last one wins.
    pub fn compile(patterns: Vec<DitherBitPattern>) -> Self {
        let mut patterns = patterns;
        patterns.reverse();
        // stable, so the last of equal values is now first and survives dedup
        patterns.sort_by_key(DitherBitPattern::value);
        patterns.dedup_by_key(|p| p.value());

        let points = patterns.iter().map(DitherBitPattern::value).collect::<Vec<_>>();
        let steps = interpolation_table(&points, Curve::Direct)
            .into_iter()
            .map(|i| PatternStep {
                low: index_of(&points, i.low),
                fraction: i.fraction,
                high: index_of(&points, i.high),
            })
            .collect();

        Self { patterns, steps }
    }

    #[inline]
    pub fn patterns(&self) -> &[DitherBitPattern] {
        &self.patterns
    }

    /// The pattern pair for a fraction between two representable values.
    #[inline]
    pub fn step(&self, fraction: f64) -> &PatternStep {
        // `as` saturates, NaN becomes 0
        let index = (fraction * 255.0) as u8;
        &self.steps[usize::from(index)]
    }

    /// Deterministic choice: whichever of the pair the fraction is closer to.
    #[inline]
    pub fn pattern_for(&self, fraction: f64) -> &DitherBitPattern {
        let step = self.step(fraction);
        if step.fraction >= 0.5 {
            &self.patterns[step.high]
        } else {
            &self.patterns[step.low]
        }
    }

    #[inline]
    pub fn pattern(&self, index: usize) -> &DitherBitPattern {
        &self.patterns[index]
    }
}

fn index_of(points: &[u8], value: u8) -> usize {
    points.partition_point(|&p| p < value)
}

/// The built-in pattern sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// Solid off, checkerboard, solid on.
    Checkers,
    /// A checkerboard regardless of the fraction.
    AlwaysCheckers,
    Bayer2,
    Bayer4,
    BlueNoise9,
    BlueNoise15,
}

impl PatternKind {
    pub const ALL: [PatternKind; 6] = [
        PatternKind::Checkers,
        PatternKind::AlwaysCheckers,
        PatternKind::Bayer2,
        PatternKind::Bayer4,
        PatternKind::BlueNoise9,
        PatternKind::BlueNoise15,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            PatternKind::Checkers => "checkers",
            PatternKind::AlwaysCheckers => "always-checkers",
            PatternKind::Bayer2 => "bayer2",
            PatternKind::Bayer4 => "bayer4",
            PatternKind::BlueNoise9 => "bluenoise9",
            PatternKind::BlueNoise15 => "bluenoise15",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn set(self) -> &'static PatternSet {
        match self {
            PatternKind::Checkers => &CHECKERS,
            PatternKind::AlwaysCheckers => &ALWAYS_CHECKERS,
            PatternKind::Bayer2 => &BAYER2,
            PatternKind::Bayer4 => &BAYER4,
            PatternKind::BlueNoise9 => &BLUENOISE9,
            PatternKind::BlueNoise15 => &BLUENOISE15,
        }
    }
}

fn checker() -> DitherBitPattern {
    DitherBitPattern::new(&[&[1, 0], &[0, 1]])
}

static CHECKERS: Lazy<PatternSet> = Lazy::new(|| {
    PatternSet::compile(vec![
        DitherBitPattern::new(&[&[0]]),
        checker(),
        DitherBitPattern::new(&[&[1]]),
    ])
});

static ALWAYS_CHECKERS: Lazy<PatternSet> = Lazy::new(|| PatternSet::compile(vec![checker()]));

// Bayer matrices from DHALF.TXT
static BAYER2: Lazy<PatternSet> =
    Lazy::new(|| PatternSet::compile(DitherBitPattern::from_matrix(2, 2, &[1, 3, 4, 2])));

#[rustfmt::skip]
static BAYER4: Lazy<PatternSet> = Lazy::new(|| {
    PatternSet::compile(DitherBitPattern::from_matrix(4, 4, &[
         1,  9,  3, 11,
        13,  5, 15,  7,
         4, 12,  2, 10,
        16,  8, 14,  6,
    ]))
});

#[rustfmt::skip]
static BLUENOISE9: Lazy<PatternSet> = Lazy::new(|| {
    PatternSet::compile(DitherBitPattern::from_matrix(9, 9, &[
        56,  7, 18, 67, 55, 12, 34, 20, 52,
        77, 61, 36, 51, 25, 63, 79, 71, 15,
        24, 40,  2, 75, 29, 42,  8, 48, 32,
        44, 11, 70, 46, 14, 21, 60,  4, 68,
        28, 64, 19, 78, 57, 39, 73, 35, 54,
        13, 50, 33,  5, 53,  9, 65, 17, 80,
        59, 37, 72, 62, 26, 31, 49, 23,  1,
        74, 10, 22, 43, 16, 69, 76, 45, 41,
        66, 30, 47, 81,  3, 38, 58,  6, 27,
    ]))
});

#[rustfmt::skip]
static BLUENOISE15: Lazy<PatternSet> = Lazy::new(|| {
    PatternSet::compile(DitherBitPattern::from_matrix(15, 15, &[
         80,   9, 146, 190,  99, 216, 113, 151,  67,  88, 189, 142, 111,  60, 125,
         18,  91, 222,  59, 161,  45, 141,  56, 104,  23, 154,   5,  74,  30, 155,
        194, 166, 128,  24,  85, 122, 181,  31, 223, 174,  39,  97, 218, 179, 209,
        103,  66,  37, 176, 207,  14, 197,  79, 159, 116, 202, 135,  84, 120,  44,
          7, 115, 201, 143, 106,  70, 133,  94,   8,  49,  64, 191,  15,  55, 149,
        137, 183,  77,  53,   2, 168,  42, 213, 184, 145, 130,  27, 163, 175,  90,
         33,  21, 158,  96, 220, 150, 119,  22, 101,  75, 217, 110,  71, 198, 224,
         62, 208, 131, 188,  28,  63, 192,  54, 160,  32, 171,   4,  41, 100, 124,
         81, 167,  47, 114,  89, 173, 136,  82, 206, 126,  87, 210, 140, 153,  12,
        107, 144,  16,  72,  36, 214,   6, 108,  17, 182,  58, 112, 187,  51, 203,
         93, 193, 221, 180, 152, 123, 199,  68, 147,  46, 156,  13,  76,  29, 177,
         38,  57, 134,  10, 102,  48, 165,  26, 225,  95, 196, 132, 219, 121, 162,
         69, 118,  25,  83, 204,  61,  92, 138, 117, 178,  34,  65,  86, 148,   1,
        200, 172, 212, 157, 129, 185, 169,  40,  78,  11, 164, 105,  20, 215,  98,
        139,  50, 109,  35,  73,  19,   3, 195, 211, 127,  52, 205, 170,  43, 186,
    ]))
});

#[cfg(test)]
mod tests {
    use super::*;

    fn ones(pattern: &DitherBitPattern) -> usize {
        (0..pattern.height())
            .flat_map(|y| (0..pattern.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| pattern.sample(x, y))
            .count()
    }

    #[test]
    fn pattern_values() {
        assert_eq!(DitherBitPattern::new(&[&[0]]).value(), 0);
        assert_eq!(DitherBitPattern::new(&[&[1]]).value(), 255);
        assert_eq!(checker().value(), 127);
    }

    #[test]
    fn sampling_repeats() {
        let pattern = checker();
        assert!(pattern.sample(0, 0));
        assert!(!pattern.sample(1, 0));
        assert!(pattern.sample(2, 2));
        assert!(!pattern.sample(3, 4));
    }

    #[test]
    fn bayer2_extremes() {
        let set = PatternKind::Bayer2.set();
        assert_eq!(ones(set.pattern_for(0.0)), 0);
        assert_eq!(ones(set.pattern_for(1.0)), 4);
        assert_eq!(set.patterns().len(), 5);
    }

    #[test]
    fn sets_are_ordered_by_occupancy() {
        for kind in PatternKind::ALL {
            let set = kind.set();
            assert!(set
                .patterns()
                .windows(2)
                .all(|pair| pair[0].value() < pair[1].value()));

            let mut previous = 0;
            for i in 0..=255u8 {
                let value = set.pattern_for(f64::from(i) / 255.0).value();
                assert!(value >= previous, "{} not monotonic", kind.name());
                previous = value;
            }
        }
    }

    #[test]
    fn matrices_span_every_level() {
        for kind in [
            PatternKind::Bayer4,
            PatternKind::BlueNoise9,
            PatternKind::BlueNoise15,
        ] {
            let set = kind.set();
            let first = &set.patterns()[0];
            let cells = first.width() * first.height();
            assert_eq!(set.patterns().len(), cells + 1);
            assert_eq!(ones(set.pattern_for(0.0)), 0);
            assert_eq!(ones(set.pattern_for(1.0)), cells);
        }
    }

    #[test]
    fn always_checkers() {
        let set = PatternKind::AlwaysCheckers.set();
        for fraction in [0.0, 0.3, 0.5, 1.0] {
            assert_eq!(*set.pattern_for(fraction), checker());
        }
    }

    #[test]
    fn names() {
        for kind in PatternKind::ALL {
            assert_eq!(PatternKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PatternKind::from_name("bayer3"), None);
    }
}
