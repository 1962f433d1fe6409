use crate::error::{CoreError, Result};
use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// How a resolved link should be redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `301 Moved Permanently`, cacheable by browsers and CDNs.
    Permanent,
    /// `302 Found`, used for links that carry an expiry.
    Temporary,
}

/// One short code to long URL mapping, as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortLink {
    pub code: ShortCode,
    pub long_url: String,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
}

impl ShortLink {
    /// Builds a fresh link with a zero hit count.
    ///
    /// Timestamps are truncated to whole seconds, the precision the store
    /// keeps. Fails if `expires_at` is not strictly after `created_at`.
    pub fn new(
        code: ShortCode,
        long_url: impl Into<String>,
        created_at: Timestamp,
        expires_at: Option<Timestamp>,
    ) -> Result<Self> {
        let created_at = whole_seconds(created_at);
        let expires_at = expires_at.map(whole_seconds);

        if let Some(expires_at) = expires_at {
            if expires_at <= created_at {
                return Err(CoreError::InvalidExpiry(format!(
                    "expiry {expires_at} must be after creation time {created_at}"
                )));
            }
        }

        Ok(Self {
            code,
            long_url: long_url.into(),
            created_at,
            expires_at,
            hit_count: 0,
            deleted_at: None,
        })
    }

    /// Whether the link's expiry has been reached at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn redirect_kind(&self) -> RedirectKind {
        match self.expires_at {
            None => RedirectKind::Permanent,
            Some(_) => RedirectKind::Temporary,
        }
    }
}

/// Drops sub-second precision from a timestamp.
pub fn whole_seconds(ts: Timestamp) -> Timestamp {
    Timestamp::from_second(ts.as_second()).unwrap_or(ts)
}
