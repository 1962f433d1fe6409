use jiff::Timestamp;
use portal_core::ShortLink;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub long_url: String,
    #[serde(default)]
    pub custom_code: Option<String>,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    pub code: String,
    pub short_url: String,
    pub long_url: String,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<u64>,
}

impl LinkResponse {
    pub fn created(link: ShortLink, short_url: String) -> Self {
        Self {
            code: link.code.to_string(),
            short_url,
            long_url: link.long_url,
            created_at: link.created_at,
            expires_at: link.expires_at,
            hit_count: None,
        }
    }

    pub fn details(link: ShortLink, short_url: String) -> Self {
        let hit_count = Some(link.hit_count);
        Self {
            hit_count,
            ..Self::created(link, short_url)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
