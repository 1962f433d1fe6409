use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Display;
use std::str::FromStr;

/// The base62 alphabet every short code is drawn from.
pub const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub const MIN_LENGTH: usize = 6;
pub const MAX_LENGTH: usize = 10;

/// A validated short code identifier for a shortened URL.
///
/// Short codes are 6-10 characters long and contain only base62
/// characters (`[0-9A-Za-z]`), which keeps them URL-safe without escaping.
/// Generated and custom codes follow the same rule.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortCode(SmolStr);

impl ShortCode {
    /// Creates a new `ShortCode` after validating the input.
    pub fn new(code: impl AsRef<str>) -> Result<Self> {
        let code = code.as_ref();
        Self::validate(code)?;
        Ok(Self(SmolStr::new(code)))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (generators, rows read back from the store).
    pub fn new_unchecked(code: impl AsRef<str>) -> Self {
        Self(SmolStr::new(code.as_ref()))
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<()> {
        if code.len() < MIN_LENGTH || code.len() > MAX_LENGTH {
            return Err(CoreError::InvalidShortCode(format!(
                "length must be between {} and {}, got {}",
                MIN_LENGTH,
                MAX_LENGTH,
                code.len()
            )));
        }

        if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidShortCode(format!(
                "must contain only base62 characters: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl std::fmt::Debug for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShortCode").field(&self.0).finish()
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ShortCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl Serialize for ShortCode {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ShortCode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = SmolStr::deserialize(deserializer)?;
        Self::new(s.as_str()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_codes() {
        assert!(ShortCode::new("aZ3kQ1").is_ok());
        assert!(ShortCode::new("0123456789").is_ok());
        assert!(ShortCode::new("abcdefg").is_ok());
    }

    #[test]
    fn too_short() {
        assert!(ShortCode::new("abcde").is_err());
        assert!(ShortCode::new("").is_err());
    }

    #[test]
    fn too_long() {
        assert!(ShortCode::new("a".repeat(11)).is_err());
    }

    #[test]
    fn invalid_characters() {
        assert!(ShortCode::new("abc def").is_err());
        assert!(ShortCode::new("abc/def").is_err());
        assert!(ShortCode::new("abc-def").is_err());
        assert!(ShortCode::new("abc_def").is_err());
        assert!(ShortCode::new("abcdé1").is_err());
    }

    #[test]
    fn to_url_trims_trailing_slash() {
        let code = ShortCode::new("aZ3kQ1").unwrap();
        assert_eq!(code.to_url("https://short.ly"), "https://short.ly/aZ3kQ1");
        assert_eq!(code.to_url("https://short.ly/"), "https://short.ly/aZ3kQ1");
    }

    #[test]
    fn deserialize_rejects_invalid_code() {
        let ok: ShortCode = serde_json::from_str("\"aZ3kQ1\"").unwrap();
        assert_eq!(ok.as_str(), "aZ3kQ1");

        let err = serde_json::from_str::<ShortCode>("\"a/b\"");
        assert!(err.is_err());
    }

    #[test]
    fn parse_from_str() {
        let code: ShortCode = "Custom01".parse().unwrap();
        assert_eq!(code.to_string(), "Custom01");
    }
}
