//! Chat endpoints. Sending a message answers with a Server-Sent Events stream that
//! mirrors every transcript mutation of that exchange, ending after `done` or `failed`.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::warn;

use crate::chat::{TranscriptEvent, TranscriptView};
use crate::errors::AppError;
use crate::profile::quick_actions::QuickAction;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuickActionRequest {
    /// Only read by the role pitch action.
    #[serde(default)]
    pub role: Option<String>,
}

/// GET /api/v1/chat
pub async fn handle_get_transcript(State(state): State<AppState>) -> Json<TranscriptView> {
    Json(state.chat.snapshot(Instant::now()).await)
}

/// POST /api/v1/chat/messages
pub async fn handle_send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let events = state.chat.submit(&request.text).await?;
    Ok(event_stream(events))
}

/// POST /api/v1/chat/quick-actions/:id
pub async fn handle_quick_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<QuickActionRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let action = QuickAction::from_id(&id)?;
    let prompt = action.prompt(&state.profile, request.role.as_deref())?;
    let events = state.chat.submit(&prompt).await?;
    Ok(event_stream(events))
}

fn event_stream(
    events: mpsc::UnboundedReceiver<TranscriptEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = futures::stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        Some((Ok(to_sse(&event)), events))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(event: &TranscriptEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            warn!("Could not encode transcript event: {e}");
            Event::default().event("failed").data("encoding error")
        })
}
