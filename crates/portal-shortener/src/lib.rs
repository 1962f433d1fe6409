//! Short link creation, inspection and deletion, plus the HTTP API and the
//! expiry janitor built on top of it.

pub mod error;
pub mod http;
pub mod janitor;
pub mod service;

pub use error::{Result, ShortenerError};
pub use janitor::{Janitor, JanitorConfig, JanitorReport};
pub use service::{ShortenRequest, Shortener, ShortenerConfig, ShortenerService};
