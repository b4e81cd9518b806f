//! Reducing 8-bit channels to fewer bits.
//!
//! Every strategy works on 8-bit samples and leaves only the top `bits` bits set, so the result
//! can be packed directly. What differs is how a sample between two representable values is
//! rounded:
//!
//! | name                        | rounding |
//! |-----------------------------|----------|
//! | `floor`                     | always down |
//! | `nearest`                   | to the closer value |
//! | `debug1bit`                 | hard threshold at 128, for testing |
//! | `random-floor`              | down, after adding up to one step of noise |
//! | `random`                    | up with a probability of the fraction |
//! | `random-borked`             | noise plus the previous pixel's error, an experiment |
//! | `checkers`, `bayer2`, ...   | by an ordered pattern picked by the fraction |
//! | `checkers-random`, ...      | as above, picking between two patterns randomly |
//!
//! Colour channels measure the fraction in linear light, alpha directly (see [`Curve`]).

use core::{fmt, str::FromStr};
use snafu::Snafu;

pub mod noise;
pub mod patterns;
pub mod tables;

pub use noise::Noise;
pub use patterns::PatternKind;
pub use tables::Curve;

use tables::{mask, tables, Interpolation};

/// Colour strategy used when none is given.
pub const DEFAULT_COLOUR_STRATEGY: Strategy = Strategy::Floor;

/// Alpha strategy used when none is given.
pub const DEFAULT_ALPHA_STRATEGY: Strategy = Strategy::Nearest;

#[derive(Debug, Snafu)]
#[snafu(display("Unsupported dithering strategy '{name}', expected one of: {valid}"))]
pub struct InvalidStrategyName {
    name: String,
    valid: String,
}

/// A way of rounding samples to fewer bits. Parsed from and displayed as its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Floor,
    Nearest,
    Debug1Bit,
    RandomFloor,
    Random,
    RandomBorked,
    Pattern(PatternKind),
    PatternRandom(PatternKind),
}

impl Strategy {
    const BASIC: [Strategy; 6] = [
        Strategy::Floor,
        Strategy::Nearest,
        Strategy::Debug1Bit,
        Strategy::RandomFloor,
        Strategy::Random,
        Strategy::RandomBorked,
    ];

    /// Every strategy, in the order they are listed to users.
    pub fn all() -> impl Iterator<Item = Strategy> {
        Self::BASIC
            .into_iter()
            .chain(PatternKind::ALL.into_iter().map(Strategy::Pattern))
            .chain(PatternKind::ALL.into_iter().map(Strategy::PatternRandom))
    }

    /// Whether the strategy draws from a [`Noise`] source.
    pub fn is_random(self) -> bool {
        matches!(
            self,
            Strategy::RandomFloor
                | Strategy::Random
                | Strategy::RandomBorked
                | Strategy::PatternRandom(_)
        )
    }

    fn valid_names() -> String {
        Self::all()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Floor => f.write_str("floor"),
            Strategy::Nearest => f.write_str("nearest"),
            Strategy::Debug1Bit => f.write_str("debug1bit"),
            Strategy::RandomFloor => f.write_str("random-floor"),
            Strategy::Random => f.write_str("random"),
            Strategy::RandomBorked => f.write_str("random-borked"),
            Strategy::Pattern(kind) => f.write_str(kind.name()),
            Strategy::PatternRandom(kind) => write!(f, "{}-random", kind.name()),
        }
    }
}

impl FromStr for Strategy {
    type Err = InvalidStrategyName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(basic) = Self::BASIC.into_iter().find(|b| b.to_string() == s) {
            return Ok(basic);
        }
        if let Some(kind) = PatternKind::from_name(s) {
            return Ok(Strategy::Pattern(kind));
        }
        if let Some(kind) = s.strip_suffix("-random").and_then(PatternKind::from_name) {
            return Ok(Strategy::PatternRandom(kind));
        }

        InvalidStrategyNameSnafu {
            name: s,
            valid: Self::valid_names(),
        }
        .fail()
    }
}

/// Dithers channels with one strategy.
///
/// Random strategies get their noise from the operating system unless a source is given with
/// [`with_noise`](Self::with_noise).
#[derive(Debug, Clone)]
pub struct ChannelDitherer {
    strategy: Strategy,
    curve: Curve,
    noise: Option<Noise>,
}

impl ChannelDitherer {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            curve: Curve::LinearLight,
            noise: None,
        }
    }

    /// Sets how fractions between representable values are measured. Colour channels want
    /// [`Curve::LinearLight`] (the default), alpha wants [`Curve::Direct`].
    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_noise(mut self, noise: Noise) -> Self {
        self.noise = Some(noise);
        self
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    fn noise(&mut self) -> &mut Noise {
        self.noise.get_or_insert_with(Noise::from_entropy)
    }

    /// Reduces a `width` by `height` channel to `bits` bits in place.
    ///
    /// # Panics
    ///
    /// If `bits` is greater than 8.
    pub fn run(&mut self, width: u32, height: u32, samples: &mut [u8], bits: u8) {
        debug_assert_eq!(samples.len(), width as usize * height as usize);

        let depth = tables(bits);
        let mask = mask(bits);
        let curve = self.curve;
        let pick = |high: bool, i: Interpolation| (if high { i.high } else { i.low }) & mask;

        let strategy = self.strategy;
        match strategy {
            Strategy::Floor => {
                for sample in samples {
                    *sample &= mask;
                }
            }
            Strategy::Nearest => {
                for sample in samples {
                    let i = depth.interpolation(*sample, curve);
                    *sample = pick(i.fraction >= 0.5, i);
                }
            }
            Strategy::Debug1Bit => {
                for sample in samples {
                    *sample = if *sample >= 128 { 0xFF & mask } else { 0 };
                }
            }
            Strategy::RandomFloor => {
                let step = 0x100 >> bits;
                let noise = self.noise();
                for sample in samples {
                    let nudged = (u32::from(*sample) + noise.below(step)).min(0xFF);
                    *sample = nudged as u8 & mask;
                }
            }
            Strategy::Random => {
                let noise = self.noise();
                for sample in samples {
                    let i = depth.interpolation(*sample, curve);
                    *sample = pick(noise.next_f64() < i.fraction, i);
                }
            }
            Strategy::RandomBorked => {
                // the error is measured against the bit-copied value but subtracted from the
                // next sample before jittering, which overcorrects
                let spread = ((0x100 >> bits >> 1) - 1).max(0);
                let noise = self.noise();
                let mut error = 0;
                for sample in samples {
                    let original = i32::from(*sample);
                    let jittered = original - error + noise.range_inclusive(-spread, spread);
                    let value = jittered.clamp(0, 0xFF) as u8 & mask;
                    *sample = value;

                    let value = u32::from(value);
                    error = (value | (value >> bits)) as i32 - original;
                }
            }
            Strategy::Pattern(kind) => {
                let set = kind.set();
                for_each_xy(width, samples, |x, y, sample| {
                    let i = depth.interpolation(*sample, curve);
                    *sample = pick(set.pattern_for(i.fraction).sample(x, y), i);
                });
            }
            Strategy::PatternRandom(kind) => {
                let set = kind.set();
                let noise = self.noise();
                for_each_xy(width, samples, |x, y, sample| {
                    let i = depth.interpolation(*sample, curve);
                    let step = set.step(i.fraction);
                    let pattern = if noise.next_f64() < step.fraction {
                        set.pattern(step.high)
                    } else {
                        set.pattern(step.low)
                    };
                    *sample = pick(pattern.sample(x, y), i);
                });
            }
        }
    }
}

fn for_each_xy(width: u32, samples: &mut [u8], mut f: impl FnMut(usize, usize, &mut u8)) {
    if width == 0 {
        return;
    }
    for (y, row) in samples.chunks_mut(width as usize).enumerate() {
        for (x, sample) in row.iter_mut().enumerate() {
            f(x, y, sample);
        }
    }
}

/// Reduces a colour channel to `bits` bits in place, with noise from the operating system.
///
/// # Panics
///
/// If `bits` is greater than 8.
pub fn dither_channel(width: u32, height: u32, samples: &mut [u8], bits: u8, strategy: Strategy) {
    ChannelDitherer::new(strategy).run(width, height, samples, bits);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dither::tables::bitcopy;

    fn ramp() -> Vec<u8> {
        (0..=u8::MAX).collect()
    }

    fn run(strategy: Strategy, curve: Curve, samples: &mut [u8], width: u32, bits: u8) {
        let height = samples.len() as u32 / width;
        ChannelDitherer::new(strategy)
            .with_curve(curve)
            .with_noise(Noise::seeded(1234))
            .run(width, height, samples, bits);
    }

    #[test]
    fn names_roundtrip() {
        let all = Strategy::all().collect::<Vec<_>>();
        assert_eq!(all.len(), 18);
        for strategy in all {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
        assert_eq!(
            "bluenoise15-random".parse::<Strategy>().unwrap(),
            Strategy::PatternRandom(PatternKind::BlueNoise15)
        );
    }

    #[test]
    fn unknown_names_fail() {
        for name in ["", "Floor", "nearest-random", "random-random", "bayer8"] {
            let err = name.parse::<Strategy>().unwrap_err();
            assert!(err.to_string().contains("random-borked"));
        }
    }

    #[test]
    fn every_strategy_masks() {
        for strategy in Strategy::all() {
            for bits in [1, 5, 6] {
                let mut samples = ramp();
                run(strategy, Curve::LinearLight, &mut samples, 16, bits);
                assert!(
                    samples.iter().all(|&s| s & !mask(bits) == 0),
                    "{strategy} at {bits} bits"
                );
            }
        }
    }

    #[test]
    fn floor_is_idempotent() {
        let mut once = ramp();
        dither_channel(16, 16, &mut once, 5, Strategy::Floor);
        let mut twice = once.clone();
        dither_channel(16, 16, &mut twice, 5, Strategy::Floor);
        assert_eq!(once, twice);
        assert_eq!(once[0x8F], 0x88);
    }

    #[test]
    fn nearest_depends_on_curve() {
        let mut colour = [128];
        run(Strategy::Nearest, Curve::LinearLight, &mut colour, 1, 1);
        assert_eq!(colour, [0x00]);

        let mut alpha = [127, 128];
        run(Strategy::Nearest, Curve::Direct, &mut alpha, 2, 1);
        assert_eq!(alpha, [0x00, 0x80]);
    }

    #[test]
    fn debug1bit_thresholds() {
        let mut samples = [0, 127, 128, 255];
        run(Strategy::Debug1Bit, Curve::LinearLight, &mut samples, 4, 3);
        assert_eq!(samples, [0, 0, 0xE0, 0xE0]);
    }

    #[test]
    fn full_depth_is_lossless() {
        // a checkerboard at every level always rounds some samples up
        let lossy = [
            Strategy::Debug1Bit,
            Strategy::Pattern(PatternKind::AlwaysCheckers),
            Strategy::PatternRandom(PatternKind::AlwaysCheckers),
        ];
        for strategy in Strategy::all().filter(|s| !lossy.contains(s)) {
            let mut samples = ramp();
            run(strategy, Curve::LinearLight, &mut samples, 16, 8);
            assert_eq!(samples, ramp(), "{strategy}");
        }
    }

    #[test]
    fn representable_values_are_stable() {
        let representable = ramp()
            .into_iter()
            .map(|s| bitcopy(s, 5))
            .collect::<Vec<_>>();
        let mut floored = representable.clone();
        run(Strategy::Floor, Curve::LinearLight, &mut floored, 16, 5);

        for strategy in [
            Strategy::Nearest,
            Strategy::Random,
            Strategy::Pattern(PatternKind::Bayer4),
            Strategy::PatternRandom(PatternKind::BlueNoise9),
        ] {
            let mut samples = representable.clone();
            run(strategy, Curve::LinearLight, &mut samples, 16, 5);
            assert_eq!(samples, floored, "{strategy}");
        }
    }

    #[test]
    fn random_follows_fraction() {
        let mut samples = vec![64; 10_000];
        run(Strategy::Random, Curve::Direct, &mut samples, 100, 1);
        let high = samples.iter().filter(|&&s| s == 0x80).count();
        // 64 is a quarter of the way to 255
        assert!((2000..3000).contains(&high), "{high}");
    }

    #[test]
    fn random_is_reproducible_with_seed() {
        let mut a = ramp();
        let mut b = ramp();
        run(Strategy::Random, Curve::LinearLight, &mut a, 16, 2);
        run(Strategy::Random, Curve::LinearLight, &mut b, 16, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn random_borked_carries_its_error() {
        let borked = |sample: u8, bits: u8, seed: u32| {
            let mut samples = [sample; 8];
            ChannelDitherer::new(Strategy::RandomBorked)
                .with_noise(Noise::seeded(seed))
                .run(8, 1, &mut samples, bits);
            samples
        };

        // 0x7C floors to 0x70, which reads back as 0x77; the overcorrection makes it swing
        assert_eq!(
            borked(0x7C, 4, 1),
            [0x70, 0x80, 0x60, 0x80, 0x70, 0x70, 0x80, 0x70]
        );
        assert_eq!(
            borked(100, 1, 7),
            [0x00, 0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0x80]
        );
    }

    #[test]
    fn random_floor_never_goes_below_floor() {
        let mut samples = ramp();
        run(Strategy::RandomFloor, Curve::LinearLight, &mut samples, 16, 4);
        for (original, dithered) in ramp().into_iter().zip(samples) {
            assert!(dithered >= original & 0xF0);
            assert!(u16::from(dithered) <= u16::from(original & 0xF0) + 0x10);
        }
    }

    #[test]
    fn checkers_pattern() {
        // just past the checkerboard, so the checkerboard is picked
        let mut samples = [128; 4];
        run(
            Strategy::Pattern(PatternKind::Checkers),
            Curve::Direct,
            &mut samples,
            2,
            1,
        );
        assert_eq!(samples, [0x80, 0, 0, 0x80]);
    }

    #[test]
    fn patterns_are_deterministic() {
        let mut a = ramp();
        let mut b = ramp();
        dither_channel(16, 16, &mut a, 3, Strategy::Pattern(PatternKind::BlueNoise15));
        dither_channel(16, 16, &mut b, 3, Strategy::Pattern(PatternKind::BlueNoise15));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_channel() {
        for strategy in Strategy::all() {
            let mut samples: [u8; 0] = [];
            ChannelDitherer::new(strategy)
                .with_noise(Noise::seeded(0))
                .run(0, 0, &mut samples, 5);
        }
    }
}
