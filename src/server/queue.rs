//! Queue inspection and manual booking endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::AppState;
use crate::bus::RemoveMeta;
use crate::clients::{QueueSnapshot, StatusReporter};
use crate::engine::{AddOutcome, EngineError, RemoveOutcome};
use crate::types::{PrNumber, QueueItem, QueueKey};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("pull request {pr} is not queued on {key}")]
    NotQueued { key: QueueKey, pr: PrNumber },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotQueued { .. } => StatusCode::NOT_FOUND,
            ApiError::Engine(EngineError::InvalidItem(_)) => StatusCode::BAD_REQUEST,
            ApiError::Engine(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self, "Queue API request failed");
        }

        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct QueueListing {
    pub queue: String,
    pub length: usize,
    pub items: Vec<QueueItem>,
}

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub pull_request_number: u64,
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BookResponse {
    Added { index: usize },
    Duplicate,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnbookResponse {
    Removed { item: QueueItem },
}

/// `GET /api/v1/queues/{owner}/{repo}/{branch}`
pub async fn list_handler<R: StatusReporter>(
    State(app_state): State<AppState<R>>,
    Path((owner, repo, branch)): Path<(String, String, String)>,
) -> Result<Json<QueueListing>, ApiError> {
    let key = QueueKey::new(owner, repo, branch);
    let items = app_state.engine().get_items(&key).await?;

    Ok(Json(QueueListing {
        queue: key.to_string(),
        length: items.len(),
        items,
    }))
}

/// `POST /api/v1/queues/{owner}/{repo}/{branch}`
///
/// Returns 201 with the landing index, or 200 if the PR was already queued
/// anywhere in the repository.
pub async fn add_handler<R: StatusReporter>(
    State(app_state): State<AppState<R>>,
    Path((owner, repo, branch)): Path<(String, String, String)>,
    Json(request): Json<BookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let key = QueueKey::new(owner, repo, branch);
    let item = QueueItem::new(PrNumber(request.pull_request_number), request.username);

    match app_state.engine().add_item(&key, item).await? {
        AddOutcome::Added { index } => {
            info!(queue = %key, pr = request.pull_request_number, index, "Booked via API");
            Ok((StatusCode::CREATED, Json(BookResponse::Added { index })))
        }
        AddOutcome::Duplicate => Ok((StatusCode::OK, Json(BookResponse::Duplicate))),
    }
}

/// `DELETE /api/v1/queues/{owner}/{repo}/{branch}/{number}`
///
/// An explicit unbook: the PR stays open and is re-blocked.
pub async fn remove_handler<R: StatusReporter>(
    State(app_state): State<AppState<R>>,
    Path((owner, repo, branch, number)): Path<(String, String, String, u64)>,
) -> Result<Json<UnbookResponse>, ApiError> {
    let key = QueueKey::new(owner, repo, branch);
    let pr = PrNumber(number);

    match app_state
        .engine()
        .remove_item(&key, pr, RemoveMeta::default())
        .await?
    {
        RemoveOutcome::Removed { item, .. } => {
            info!(queue = %key, pr = %pr, "Unbooked via API");
            Ok(Json(UnbookResponse::Removed { item }))
        }
        RemoveOutcome::NotQueued => Err(ApiError::NotQueued { key, pr }),
    }
}

/// SSE event name carrying a [`QueueSnapshot`].
pub const SNAPSHOT_EVENT: &str = "snapshot";

fn snapshot_event(snapshot: &QueueSnapshot) -> Result<Event, axum::Error> {
    Event::default().event(SNAPSHOT_EVENT).json_data(snapshot)
}

/// `GET /api/v1/queues/{owner}/{repo}/{branch}/events`
///
/// Server-sent events: the current queue first, then a full snapshot after
/// every mutation of that queue. A subscriber that falls behind skips to the
/// newest snapshots.
pub async fn events_handler<R: StatusReporter>(
    State(app_state): State<AppState<R>>,
    Path((owner, repo, branch)): Path<(String, String, String)>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let key = QueueKey::new(owner, repo, branch);
    // Subscribe before reading so no mutation falls between the two.
    let receiver = app_state.snapshots().subscribe();
    let items = app_state.engine().get_items(&key).await?;
    let initial = snapshot_event(&QueueSnapshot {
        key: key.clone(),
        items,
    });
    debug!(queue = %key, "Snapshot subscriber connected");

    let updates = stream::unfold((receiver, key), |(mut receiver, key)| async move {
        loop {
            match receiver.recv().await {
                Ok(snapshot) if snapshot.key == key => {
                    return Some((snapshot_event(&snapshot), (receiver, key)));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(queue = %key, skipped, "Snapshot subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream::once(async move { initial }).chain(updates)).keep_alive(KeepAlive::default()))
}
