//! Resolves short codes to their long URLs and serves the redirects.
//!
//! [`RedirectorService`] walks cache, then store, and never caches a link
//! that has expired. Hits are counted off the request path by a
//! [`HitCounter`].

pub mod error;
pub mod hits;
pub mod http;
pub mod redirector;
pub mod service;

pub use error::{RedirectError, Result};
pub use hits::{HitCounter, HitCounterConfig};
pub use redirector::{Redirector, Resolved};
pub use service::{RedirectorConfig, RedirectorService};
