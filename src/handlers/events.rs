//! SSE endpoints over the event hub
//!
//! A stream is the subscription handle: the client cancels by dropping the
//! connection, and the hub unregisters idle channels on the next publish.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Extension, Json,
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use super::submissions::load_visible_submission;
use super::AppState;
use crate::events::Topic;
use crate::models::{ApiResponse, Profile};

/// Live feed of one submission's events (messages, status changes)
pub async fn submission_events(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
    Path(id): Path<Uuid>,
) -> Response {
    let submission = match load_visible_submission(&state.pool, id, &profile).await {
        Some(s) => s,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error("Submission not found")),
            )
                .into_response()
        }
    };

    sse_for(&state, Topic::Submission(submission.id))
}

/// Live feed of the caller's user-scoped events (in-app notifications,
/// own-submission status changes)
pub async fn user_events(
    State(state): State<AppState>,
    Extension(profile): Extension<Profile>,
) -> Response {
    sse_for(&state, Topic::User(profile.id))
}

fn sse_for(state: &AppState, topic: Topic) -> Response {
    let rx = state.hub.subscribe(topic);

    // Lagged receivers skip the overwritten events rather than erroring out
    let stream = BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| Event::default().json_data(&event));

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
