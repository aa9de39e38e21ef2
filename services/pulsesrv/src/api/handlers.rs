//! Counter query handlers
//!
//! Every response body is JSON, errors included: `{"message": "..."}`.

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};

use crate::store::CounterStore;
use crate::telegram::CHANNEL_COUNT;

/// What a request path asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// `/`: all counters
    All,
    /// `/<n>` with `n` a valid channel
    Channel(usize),
    /// `/<n>` with `n` past the last channel
    BadIndex,
    /// Anything else
    NotFound,
}

/// Map a request path to a [`Query`].
///
/// The path is the URI path only; the query string plays no part.
pub fn resolve(path: &str) -> Query {
    let target = path.strip_prefix('/').unwrap_or(path);

    if target.is_empty() {
        return Query::All;
    }
    if !target.bytes().all(|b| b.is_ascii_digit()) {
        return Query::NotFound;
    }

    match target.parse::<usize>() {
        Ok(channel) if channel < CHANNEL_COUNT => Query::Channel(channel),
        // Digits beyond usize are out of range as well
        _ => Query::BadIndex,
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

/// JSON error response: `{"message": <message>}`
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody { message })).into_response()
}

/// GET handler for `/` and `/<n>`
pub async fn query_counters(State(store): State<Arc<CounterStore>>, uri: Uri) -> Response {
    match resolve(uri.path()) {
        Query::All => Json(store.snapshot()).into_response(),
        Query::Channel(channel) => match store.get(channel) {
            Some(value) => Json(value).into_response(),
            None => error_response(StatusCode::BAD_REQUEST, "bad index"),
        },
        Query::BadIndex => {
            debug!("bad counter index requested: {}", uri.path());
            error_response(StatusCode::BAD_REQUEST, "bad index")
        },
        Query::NotFound => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}

/// Anything but GET on a counter path
pub async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

/// Turns a handler panic into a 500; the server keeps running
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };

    error!("error while handling GET: {}", detail);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "error")
}
