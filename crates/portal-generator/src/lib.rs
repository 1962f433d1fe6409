//! Short code generators.
//!
//! Generators are pure: they never talk to the store. Uniqueness against
//! the store is enforced by the store's unique constraint, and callers retry
//! with a fresh candidate when an insert conflicts.

pub mod base62;
pub mod random;
pub mod scrambled;

use portal_core::ShortCode;

pub use random::RandomGenerator;
pub use scrambled::{ScrambledSequence, ScrambledSequenceSettings};

/// Trait for generating short codes.
///
/// Implementations can vary from random draws to permuted counters. They
/// must produce URL-safe codes that are hard to enumerate.
pub trait Generator: Send + Sync + 'static {
    /// Generates a candidate short code.
    fn generate(&self) -> ShortCode;
}

impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    fn generate(&self) -> ShortCode {
        (**self).generate()
    }
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn generate(&self) -> ShortCode {
        (**self).generate()
    }
}

/// Errors raised when configuring a generator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid code length {length}; expected {min}..={max}")]
    InvalidLength { length: usize, min: usize, max: usize },
    #[error("multiplier {0} is not coprime to 62")]
    InvalidMultiplier(u64),
}
