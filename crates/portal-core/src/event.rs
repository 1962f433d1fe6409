use crate::link::ShortLink;
use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

pub const LINK_CREATED_TOPIC: &str = "link.created";
pub const LINK_EXPIRED_TOPIC: &str = "link.expired";

/// Lifecycle events exchanged between the shortener and the redirector.
///
/// Events are delivered at least once; every consumer must treat a
/// redelivered event keyed by `code` as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LinkEvent {
    #[serde(rename = "link_created")]
    Created {
        code: ShortCode,
        #[serde(rename = "longUrl")]
        long_url: String,
        #[serde(rename = "createdAt")]
        created_at: Timestamp,
        #[serde(rename = "expiresAt")]
        expires_at: Option<Timestamp>,
    },
    #[serde(rename = "link_expired")]
    Expired { code: ShortCode },
}

impl LinkEvent {
    pub fn created(link: &ShortLink) -> Self {
        Self::Created {
            code: link.code.clone(),
            long_url: link.long_url.clone(),
            created_at: link.created_at,
            expires_at: link.expires_at,
        }
    }

    pub fn expired(code: ShortCode) -> Self {
        Self::Expired { code }
    }

    /// The bus topic this event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Created { .. } => LINK_CREATED_TOPIC,
            Self::Expired { .. } => LINK_EXPIRED_TOPIC,
        }
    }

    /// The link a `Created` event describes, as a consumer would cache it.
    pub fn link(&self) -> Option<ShortLink> {
        match self {
            Self::Created {
                code,
                long_url,
                created_at,
                expires_at,
            } => Some(ShortLink {
                code: code.clone(),
                long_url: long_url.clone(),
                created_at: *created_at,
                expires_at: *expires_at,
                hit_count: 0,
                deleted_at: None,
            }),
            Self::Expired { .. } => None,
        }
    }

    pub fn code(&self) -> &ShortCode {
        match self {
            Self::Created { code, .. } | Self::Expired { code } => code,
        }
    }
}
