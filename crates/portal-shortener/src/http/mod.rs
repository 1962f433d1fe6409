//! JSON API over a [`Shortener`](crate::service::Shortener).

pub mod error;
pub mod handlers;
pub mod model;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use handlers::{create_link_handler, delete_link_handler, get_link_handler, health_handler};
pub use state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/api/v1/links", post(create_link_handler))
            .route(
                "/api/v1/links/{code}",
                get(get_link_handler).delete(delete_link_handler),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
