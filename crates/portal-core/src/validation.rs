use crate::error::{CoreError, Result};
use url::Url;

/// Longest URL accepted for shortening, in bytes.
pub const MAX_URL_LENGTH: usize = 2048;

/// Validates that `raw` is an absolute `http`/`https` URL with a host.
///
/// The input is checked, not normalized: callers store `raw` exactly as given
/// so that resolution returns the same string.
pub fn validate_long_url(raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(CoreError::InvalidUrl("URL cannot be empty".to_string()));
    }

    if raw.len() > MAX_URL_LENGTH {
        return Err(CoreError::InvalidUrl(format!(
            "URL exceeds {MAX_URL_LENGTH} bytes"
        )));
    }

    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CoreError::InvalidUrl(
            "URL must not contain whitespace or control characters".to_string(),
        ));
    }

    let parsed = Url::parse(raw).map_err(|e| CoreError::InvalidUrl(format!("{raw}: {e}")))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(CoreError::InvalidUrl(format!(
            "URL scheme must be http or https: {scheme}"
        )));
    }

    // `Url::parse` accepts `http:example.com`; require the authority marker.
    if !raw[scheme.len()..].starts_with("://") {
        return Err(CoreError::InvalidUrl(format!(
            "URL must have the form {scheme}://host: {raw}"
        )));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(CoreError::InvalidUrl(format!("URL has no host: {raw}")));
    }

    Ok(())
}
