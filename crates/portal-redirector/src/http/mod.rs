//! Redirect endpoint over a [`Redirector`](crate::redirector::Redirector).

pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use handlers::{health_handler, redirect_handler};
pub use state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/{code}", get(redirect_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
