use crate::{Error, Generator};
use portal_core::shortcode::{BASE62_ALPHABET, MAX_LENGTH, MIN_LENGTH};
use portal_core::ShortCode;
use rand::Rng;

pub const DEFAULT_LENGTH: usize = 7;

/// Draws every character uniformly from the base62 alphabet.
///
/// With the default length of 7 the code space holds about 3.5 * 10^12
/// codes, so collisions stay rare and are absorbed by the caller's retry.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new(length: usize) -> Result<Self, Error> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
            return Err(Error::InvalidLength {
                length,
                min: MIN_LENGTH,
                max: MAX_LENGTH,
            });
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
        }
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortCode {
        let mut rng = rand::rng();
        let code: String = (0..self.length)
            .map(|_| char::from(BASE62_ALPHABET[rng.random_range(0..BASE62_ALPHABET.len())]))
            .collect();
        ShortCode::new_unchecked(code)
    }
}
