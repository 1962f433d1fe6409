use std::time::Duration;
use typed_builder::TypedBuilder;

/// Header carrying the caller's time budget in milliseconds.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

/// Per-request time budget for HTTP handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct RequestTimeouts {
    /// Applied when the caller sends no usable budget.
    #[builder(default = Duration::from_secs(5))]
    pub default: Duration,
    /// Upper bound on any caller-supplied budget.
    #[builder(default = Duration::from_secs(30))]
    pub max: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RequestTimeouts {
    /// Resolves the budget for one request from the raw header value.
    ///
    /// Missing, non-numeric or zero values fall back to `default`; anything
    /// above `max` is clamped.
    pub fn budget(&self, header: Option<&str>) -> Duration {
        header
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|millis| *millis > 0)
            .map(|millis| Duration::from_millis(millis).min(self.max))
            .unwrap_or(self.default)
    }
}
