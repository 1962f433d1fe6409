//! [`LinkCache`] backends shared by the shortener and the redirector.

pub mod layered;
pub mod moka;
pub mod null;
pub mod redis;

pub use layered::LayeredCache;
pub use self::moka::{MokaCacheConfig, MokaLinkCache};
pub use null::NullCache;
pub use portal_core::{CacheError, LinkCache};
pub use self::redis::RedisLinkCache;

pub type Result<T> = std::result::Result<T, CacheError>;
