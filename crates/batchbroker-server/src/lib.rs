//! batchbroker HTTP Adapter
//!
//! Thin HTTP surface over the storage engine. Two endpoints:
//!
//! - `POST /add` - body is the raw record bytes; blocks until the record's
//!   batch has been persisted. 200 empty on success, 500 with the error
//!   text on persistence failure.
//! - `GET /get?record-id=N` - 200 with the raw record bytes; 404 when the
//!   ID is out of bounds; 400 when the parameter is missing or
//!   non-numeric; 500 on other errors.
//!
//! The adapter holds no broker logic: it forwards bytes to the blocking
//! batcher and record IDs to the topic storage.

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use batchbroker_storage::{BlockingBatcher, TopicStorage};

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub batcher: BlockingBatcher,
    pub storage: Arc<TopicStorage>,
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/add", post(handlers::add_record))
        .route("/get", get(handlers::get_record))
        .with_state(state)
}
