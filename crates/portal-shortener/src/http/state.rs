use portal_core::RequestTimeouts;
use std::sync::Arc;

use crate::service::Shortener;

#[derive(Clone)]
pub struct AppState {
    pub(crate) shortener: Arc<dyn Shortener>,
    pub(crate) timeouts: RequestTimeouts,
}

impl AppState {
    pub fn new(shortener: Arc<dyn Shortener>, timeouts: RequestTimeouts) -> Self {
        Self {
            shortener,
            timeouts,
        }
    }
}
