//! Core types and traits for the Portal URL shortener.
//!
//! This crate provides shared types and traits used by both the
//! shortener service and the redirector service.

pub mod cache;
pub mod error;
pub mod event;
pub mod link;
pub mod repository;
pub mod shortcode;
pub mod timeout;
pub mod validation;

pub use cache::{cache_key, cache_ttl, LinkCache, CACHE_KEY_PREFIX, DEFAULT_CACHE_TTL};
pub use error::{CacheError, CoreError, StorageError};
pub use event::{LinkEvent, LINK_CREATED_TOPIC, LINK_EXPIRED_TOPIC};
pub use link::{RedirectKind, ShortLink};
pub use repository::{ReadRepository, Repository};
pub use shortcode::ShortCode;
pub use timeout::{RequestTimeouts, REQUEST_TIMEOUT_HEADER};
pub use validation::{validate_long_url, MAX_URL_LENGTH};
