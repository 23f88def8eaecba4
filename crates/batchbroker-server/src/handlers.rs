//! Record add/get endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, error};

use crate::AppState;

/// `POST /add` - submit one record; blocks until its batch is persisted.
pub async fn add_record(State(state): State<AppState>, body: Bytes) -> Response {
    debug!(bytes = body.len(), "add record");

    match state.batcher.add(body).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            error!(error = %err, "failed to add record");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GetRecordParams {
    #[serde(rename = "record-id")]
    record_id: Option<String>,
}

/// `GET /get?record-id=N` - read one record by ID.
pub async fn get_record(
    State(state): State<AppState>,
    Query(params): Query<GetRecordParams>,
) -> Response {
    let record_id = match params.record_id.as_deref().map(str::parse::<u64>) {
        Some(Ok(record_id)) => record_id,
        Some(Err(err)) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("url parameter 'record-id' required, must be a number: {}", err),
            )
                .into_response();
        }
        None => {
            return (
                StatusCode::BAD_REQUEST,
                "url parameter 'record-id' required, must be a number".to_string(),
            )
                .into_response();
        }
    };

    debug!(record_id, "get record");

    match state.storage.read_record(record_id).await {
        Ok(record) => record.into_response(),
        Err(err) if err.is_out_of_bounds() => {
            debug!(record_id, "record not found");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(err) => {
            error!(record_id, error = %err, "failed to read record");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to read record '{}': {}", record_id, err),
            )
                .into_response()
        }
    }
}
