use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use notesync_contracts::sync::{AuthOutcome, BatchOutcome};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{auth, responses, AppState};

/// Resolve the caller or produce the 401 response carrying the authentication payload.
async fn authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<i64, Response> {
    let credentials = auth::credentials_from_headers(headers);
    match state.kernel().authenticate_async(credentials).await {
        Ok(AuthOutcome::Authenticated(user_id)) => Ok(user_id),
        Ok(AuthOutcome::Denied(payload)) => {
            Err(responses::payload(StatusCode::UNAUTHORIZED, payload))
        }
        Err(err) => Err(responses::internal_error("authentication", err)),
    }
}

/// POST /notes: push a batch of notes and note contents.
pub async fn notes_push(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let user_id = match authenticated_user(&state, &headers).await {
        Ok(id) => id,
        Err(res) => return res,
    };
    let batch: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => {
            debug!(user_id, %err, "push body is not JSON");
            return responses::problem(
                StatusCode::BAD_REQUEST,
                "Bad Request",
                format!("request body is not valid JSON: {err}"),
            );
        }
    };
    match state.kernel().process_batch_async(user_id, batch).await {
        Ok(BatchOutcome::Malformed(payload)) => {
            responses::payload(StatusCode::BAD_REQUEST, payload)
        }
        Ok(BatchOutcome::Processed(report)) if report.is_complete() => {
            responses::payload(StatusCode::OK, json!({}))
        }
        Ok(BatchOutcome::Processed(report)) => {
            info!(user_id, failed = report.failed(), "partial sync");
            responses::payload(StatusCode::ACCEPTED, report.to_response())
        }
        Err(err) => responses::internal_error("sync", err),
    }
}

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    /// Epoch seconds; only rows strictly newer are returned.
    pub after: Option<i64>,
}

/// GET /notes: everything the caller owns, optionally since `after`.
pub async fn notes_pull(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<PullQuery>,
) -> Response {
    let user_id = match authenticated_user(&state, &headers).await {
        Ok(id) => id,
        Err(res) => return res,
    };
    match state.kernel().snapshot_async(user_id, q.after).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => responses::internal_error("pull", err),
    }
}
