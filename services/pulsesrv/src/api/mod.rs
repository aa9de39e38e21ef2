//! Read-only HTTP query service
//!
//! - `GET /`    all five counters as a JSON array
//! - `GET /<n>` counter `n` as a JSON number
//!
//! Bad indices answer 400, unknown paths 404, handler failures 500.

pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::catch_panic::CatchPanicLayer;

use crate::store::CounterStore;

pub use handlers::{resolve, Query};

/// Create the query router over `store`
pub fn create_routes(store: Arc<CounterStore>) -> Router {
    let query = get(handlers::query_counters).fallback(handlers::method_not_allowed);

    with_layers(
        Router::new()
            .route("/", query.clone())
            .route("/{*path}", query),
    )
    .with_state(store)
}

/// Panic recovery and access logging, outermost last
fn with_layers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(middleware::from_fn(common::logging::http_request_logger))
}
