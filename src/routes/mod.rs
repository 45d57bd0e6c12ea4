//! API routes
//!
//! The HTTP surface stands in for the chat screen: it mounts sessions,
//! forwards input, suggestion taps and feedback to the engine, and streams
//! conversation snapshots as server-sent events.

mod error;

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post, put},
    Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Suggestion;
use crate::conversation::Feedback;
use crate::core::{ConversationEngine, ConversationSnapshot};
use crate::AppState;

pub use error::ApiError;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sessions: usize,
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub text: String,
}

/// Body of a message submission; without `text` the input buffer is sent
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub kind: Feedback,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.registry.len().await,
    })
}

async fn suggestions(State(state): State<AppState>) -> Json<Vec<Suggestion>> {
    Json(state.registry.rules().suggestions.clone())
}

async fn session(state: &AppState, id: Uuid) -> Result<Arc<ConversationEngine>, ApiError> {
    state
        .registry
        .get(&id)
        .await
        .ok_or(ApiError::SessionNotFound(id))
}

async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<ConversationSnapshot>) {
    let engine = state.registry.mount().await;
    (StatusCode::CREATED, Json(engine.snapshot()))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationSnapshot>, ApiError> {
    let engine = session(&state, id).await?;
    Ok(Json(engine.snapshot()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.registry.unmount(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

async fn set_input(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<InputRequest>,
) -> Result<Json<ConversationSnapshot>, ApiError> {
    let engine = session(&state, id).await?;
    engine.set_input(&request.text);
    Ok(Json(engine.snapshot()))
}

async fn submit_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<ConversationSnapshot>), ApiError> {
    let engine = session(&state, id).await?;
    match request.text {
        Some(text) => engine.submit(&text),
        None => engine.submit_input(),
    }
    Ok((StatusCode::ACCEPTED, Json(engine.snapshot())))
}

async fn preset_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<QueryRequest>,
) -> Result<(StatusCode, Json<ConversationSnapshot>), ApiError> {
    let engine = session(&state, id).await?;
    engine.preset_query(&request.text);
    Ok((StatusCode::ACCEPTED, Json(engine.snapshot())))
}

async fn tap_suggestion(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<(StatusCode, Json<ConversationSnapshot>), ApiError> {
    let engine = session(&state, id).await?;
    let suggestion = state
        .registry
        .rules()
        .suggestions
        .get(index)
        .ok_or_else(|| ApiError::BadRequest(format!("no suggestion at index {}", index)))?;

    engine.preset_query(&suggestion.text);
    Ok((StatusCode::ACCEPTED, Json(engine.snapshot())))
}

async fn set_feedback(
    State(state): State<AppState>,
    Path((id, message_id)): Path<(Uuid, String)>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<ConversationSnapshot>, ApiError> {
    let engine = session(&state, id).await?;
    engine.set_feedback(&message_id, request.kind);
    Ok(Json(engine.snapshot()))
}

async fn events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let engine = session(&state, id).await?;
    let mut updates = engine.subscribe();
    drop(engine);

    let stream = async_stream::stream! {
        loop {
            let (snapshot, torn_down) = {
                let current = updates.borrow_and_update();
                (ConversationSnapshot::from(&*current), current.is_torn_down())
            };

            match Event::default().event("conversation").json_data(&snapshot) {
                Ok(event) => yield Ok::<_, Infallible>(event),
                Err(e) => tracing::warn!("failed to encode snapshot: {}", e),
            }

            if torn_down || updates.changed().await.is_err() {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/suggestions", get(suggestions))
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id", get(get_session).delete(delete_session))
        .route("/v1/sessions/:id/input", put(set_input))
        .route("/v1/sessions/:id/messages", post(submit_message))
        .route("/v1/sessions/:id/queries", post(preset_query))
        .route("/v1/sessions/:id/suggestions/:index", post(tap_suggestion))
        .route(
            "/v1/sessions/:id/messages/:message_id/feedback",
            post(set_feedback),
        )
        .route("/v1/sessions/:id/events", get(events))
}
