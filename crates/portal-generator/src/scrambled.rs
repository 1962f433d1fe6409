use crate::base62;
use crate::{Error, Generator};
use portal_core::shortcode::{MAX_LENGTH, MIN_LENGTH};
use portal_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};
use typed_builder::TypedBuilder;

/// Configures a [`ScrambledSequence`].
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct ScrambledSequenceSettings {
    /// Code length in characters, `6..=10`.
    #[builder(default = 7)]
    pub length: usize,
    /// Must be coprime to 62 so the permutation is a bijection.
    #[builder(default = 0x5_DEEC_E66D)]
    pub multiplier: u64,
    #[builder(default = 0x2545_F491)]
    pub offset: u64,
    /// First counter value. Give each node a disjoint range
    /// (e.g. node 1 starts at 0, node 2 at 1 << 32).
    #[builder(default = 0)]
    pub start: u64,
}

/// A hashed-counter generator.
///
/// An atomic counter `n` is mapped through `(n * multiplier + offset) mod 62^length`
/// and encoded as fixed-width base62. The mapping is a bijection on the code
/// space, so a single node never repeats a code until the space wraps, while
/// consecutive codes look unrelated to an observer.
#[derive(Debug)]
pub struct ScrambledSequence {
    counter: AtomicU64,
    length: usize,
    space: u64,
    multiplier: u64,
    offset: u64,
}

impl ScrambledSequence {
    pub fn new(settings: ScrambledSequenceSettings) -> Result<Self, Error> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&settings.length) {
            return Err(Error::InvalidLength {
                length: settings.length,
                min: MIN_LENGTH,
                max: MAX_LENGTH,
            });
        }

        if settings.multiplier % 2 == 0 || settings.multiplier % 31 == 0 {
            return Err(Error::InvalidMultiplier(settings.multiplier));
        }

        let space = base62::space(settings.length);

        Ok(Self {
            counter: AtomicU64::new(settings.start),
            length: settings.length,
            space,
            multiplier: settings.multiplier % space,
            offset: settings.offset % space,
        })
    }

    /// Maps a counter value onto the code space.
    fn scramble(&self, n: u64) -> u64 {
        let n = u128::from(n % self.space);
        let mixed = n * u128::from(self.multiplier) + u128::from(self.offset);
        (mixed % u128::from(self.space)) as u64
    }

    /// Recovers the counter value (modulo the code space) behind a code.
    pub fn position_of(&self, code: &ShortCode) -> Option<u64> {
        if code.as_str().len() != self.length {
            return None;
        }
        let scrambled = base62::decode(code.as_str())?;
        let inverse = mod_inverse(self.multiplier, self.space)?;

        let space = u128::from(self.space);
        let shifted = (u128::from(scrambled) + space - u128::from(self.offset)) % space;
        Some(((shifted * u128::from(inverse)) % space) as u64)
    }
}

impl Generator for ScrambledSequence {
    fn generate(&self) -> ShortCode {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        ShortCode::new_unchecked(base62::encode_fixed(self.scramble(n), self.length))
    }
}

/// Modular inverse via the extended Euclidean algorithm.
fn mod_inverse(value: u64, modulus: u64) -> Option<u64> {
    let (mut old_r, mut r) = (i128::from(value), i128::from(modulus));
    let (mut old_s, mut s) = (1_i128, 0_i128);

    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }

    if old_r != 1 {
        return None;
    }

    Some(old_s.rem_euclid(i128::from(modulus)) as u64)
}
