use portal_core::RequestTimeouts;
use std::sync::Arc;

use crate::redirector::Redirector;

#[derive(Clone)]
pub struct AppState {
    pub(crate) redirector: Arc<dyn Redirector>,
    pub(crate) timeouts: RequestTimeouts,
}

impl AppState {
    pub fn new(redirector: Arc<dyn Redirector>, timeouts: RequestTimeouts) -> Self {
        Self {
            redirector,
            timeouts,
        }
    }
}
