//! Webhook endpoint handler.
//!
//! Verifies the delivery signature, parses the payload, and drives the
//! status synchronizer inline. GitHub redelivers failed deliveries, so a
//! `503` when the queue store is unreachable lets the delivery be retried.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::clients::StatusReporter;
use crate::sync::SyncError;
use crate::webhooks::{
    ParseError, PullRequestAction, SignatureError, WebhookEvent, parse_webhook, verify_signature,
};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("invalid payload: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(HEADER_SIGNATURE) => StatusCode::UNAUTHORIZED,
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            WebhookError::Parse(_) => StatusCode::BAD_REQUEST,
            WebhookError::Sync(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            WebhookError::Sync(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 200 OK: the event was applied
/// - 202 Accepted: the event type or action is not one the queue acts on
/// - 400 Bad Request: missing event header or malformed payload
/// - 401 Unauthorized: missing or invalid signature
/// - 503 Service Unavailable: the queue store is unreachable
pub async fn webhook_handler<R: StatusReporter>(
    State(app_state): State<AppState<R>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let delivery_id = get_header(&headers, HEADER_DELIVERY).unwrap_or_default();

    // Verify before parsing anything.
    let signature_header = get_header(&headers, HEADER_SIGNATURE)?;
    if let Err(e) = verify_signature(&body, &signature_header, app_state.webhook_secret()) {
        warn!(delivery_id = %delivery_id, error = %e, "Invalid webhook signature");
        return Err(e.into());
    }

    let event_type = get_header(&headers, HEADER_EVENT)?;
    debug!(delivery_id = %delivery_id, event_type = %event_type, "Received webhook");

    let Some(event) = parse_webhook(&event_type, &body)? else {
        debug!(delivery_id = %delivery_id, event_type = %event_type, "Ignoring webhook");
        return Ok((StatusCode::ACCEPTED, "Ignored"));
    };

    apply(&app_state, event).await.inspect_err(|e| {
        warn!(delivery_id = %delivery_id, error = %e, "Failed to apply webhook");
    })?;
    Ok((StatusCode::OK, "OK"))
}

async fn apply<R: StatusReporter>(
    app_state: &AppState<R>,
    event: WebhookEvent,
) -> Result<(), SyncError> {
    let sync = app_state.sync();
    match event {
        WebhookEvent::PullRequest(event) => {
            let pr = event.info.pull_request_number;
            match event.action {
                PullRequestAction::Opened | PullRequestAction::Reopened => {
                    let outcome = sync.handle_opened(event.info).await?;
                    info!(pr = %pr, ?outcome, "Pull request booked");
                }
                PullRequestAction::Synchronize => {
                    sync.handle_sync(event.info).await?;
                }
                PullRequestAction::Closed(reason) => {
                    sync.handle_closed(&event.info, reason).await?;
                }
            }
        }
        WebhookEvent::Status(change) => {
            let outcome = sync.handle_status_change(&change).await?;
            debug!(?outcome, "Status change handled");
        }
        WebhookEvent::Ping => info!("Webhook ping received"),
    }
    Ok(())
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_header_present() {
        let mut headers = HeaderMap::new();
        headers.insert("x-github-event", "pull_request".parse().unwrap());

        assert_eq!(get_header(&headers, HEADER_EVENT).unwrap(), "pull_request");
    }

    #[test]
    fn get_header_missing() {
        let result = get_header(&HeaderMap::new(), HEADER_EVENT);
        assert!(matches!(result, Err(WebhookError::MissingHeader(HEADER_EVENT))));
    }

    #[test]
    fn error_status_codes() {
        let status = |e: WebhookError| e.into_response().status();

        assert_eq!(status(WebhookError::MissingHeader(HEADER_EVENT)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(WebhookError::MissingHeader(HEADER_SIGNATURE)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(SignatureError::Mismatch.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(
                ParseError::InvalidField {
                    field: "state",
                    value: "weird".into()
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
    }
}
