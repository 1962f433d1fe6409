use crate::Result;
use async_trait::async_trait;
use portal_core::RedirectKind;

/// Where to send a client, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub long_url: String,
    pub kind: RedirectKind,
}

#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a raw short code taken from the request path.
    ///
    /// Malformed, unknown and deleted codes all report `NotFound`. Links
    /// whose expiry has passed report `Expired`.
    async fn resolve(&self, code: &str) -> Result<Resolved>;
}
