/// Seed used when the operating system can't provide one.
const FALLBACK_SEED: u32 = 0x5EED_C0DE;

/// Wang hash, mixes every input bit into every output bit.
#[inline]
fn wang_hash(mut x: u32) -> u32 {
    x = (x ^ 61) ^ (x >> 16);
    x = x.wrapping_mul(9);
    x ^= x >> 4;
    x = x.wrapping_mul(0x27d4_eb2d);
    x ^= x >> 15;
    x
}

/// Cheap noise for the random dithering strategies: a hashed counter.
///
/// Two sources with the same seed produce the same sequence, which keeps random dithering
/// reproducible where needed.
#[derive(Debug, Clone)]
pub struct Noise {
    seed: u32,
    counter: u32,
}

impl Noise {
    pub fn seeded(seed: u32) -> Self {
        Self {
            seed: wang_hash(seed),
            counter: 0,
        }
    }

    /// Seeds from the operating system.
    pub fn from_entropy() -> Self {
        let mut seed = [0; 4];
        match getrandom::getrandom(&mut seed) {
            Ok(()) => Self::seeded(u32::from_le_bytes(seed)),
            Err(err) => {
                log::warn!("no entropy available ({err}), dithering with a fixed seed");
                Self::seeded(FALLBACK_SEED)
            }
        }
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.counter = self.counter.wrapping_add(1);
        wang_hash(self.counter ^ self.seed)
    }

    /// Uniform in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Uniform in `[0, n)`. `n` must not be 0.
    #[inline]
    pub fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }

    /// Uniform in `[low, high]`.
    #[inline]
    pub fn range_inclusive(&mut self, low: i32, high: i32) -> i32 {
        debug_assert!(low <= high);
        let span = (high - low) as u32 + 1;
        low + self.below(span) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_is_reproducible() {
        let mut a = Noise::seeded(42);
        let mut b = Noise::seeded(42);
        let mut c = Noise::seeded(43);
        let a = (0..16).map(|_| a.next_u32()).collect::<Vec<_>>();
        let b = (0..16).map(|_| b.next_u32()).collect::<Vec<_>>();
        let c = (0..16).map(|_| c.next_u32()).collect::<Vec<_>>();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ranges() {
        let mut noise = Noise::seeded(7);
        let mut seen = [false; 7];
        for _ in 0..1000 {
            let v = noise.range_inclusive(-3, 3);
            assert!((-3..=3).contains(&v));
            seen[(v + 3) as usize] = true;

            let f = noise.next_f64();
            assert!((0.0..1.0).contains(&f));
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(noise.range_inclusive(5, 5), 5);
    }
}
