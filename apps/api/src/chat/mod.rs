//! Chat service: drives every exchange between the transcript and the session.
//!
//! Flow per message: begin_exchange (user turn) → send_turn → open_placeholder →
//! apply_fragment × N → finish | fail.
//!
//! Every transcript mutation happens under one lock, in arrival order, and is mirrored
//! as a `TranscriptEvent` to whoever submitted the message. The reply task owns the
//! exchange: if the listener goes away the reply still runs to completion.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::llm_client::TransportError;
use crate::profile::ProfileRecord;
use crate::render::MarkdownRenderer;
use crate::session::{InitializationError, SessionHandle, SessionManager};
use crate::transcript::{Banner, Role, Transcript, TranscriptError, Turn, WELCOME_TURN_ID};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat is not initialized: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

// ────────────────────────────────────────────────────────────────────────────
// Views & events
// ────────────────────────────────────────────────────────────────────────────

/// A turn as the page draws it. Assistant content also comes pre-rendered.
#[derive(Debug, Clone, Serialize)]
pub struct TurnView {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Full state the page needs to draw the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptView {
    pub turns: Vec<TurnView>,
    pub reply_in_progress: bool,
    pub show_typing_indicator: bool,
    pub chat_available: bool,
    pub banner: Option<BannerView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BannerView {
    pub message: String,
    /// Persistent banners stay until restart; others dismiss themselves.
    pub persistent: bool,
    /// Milliseconds until a transient banner dismisses itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_ms: Option<u64>,
}

impl BannerView {
    fn new(banner: &Banner, now: Instant) -> Self {
        Self {
            message: banner.message.clone(),
            persistent: banner.is_persistent(),
            expires_in_ms: banner
                .remaining(now)
                .map(|left| u64::try_from(left.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

/// One transcript mutation, in the order it was applied.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEvent {
    /// A turn was appended (user turn or empty assistant placeholder).
    Turn { turn: TurnView },
    /// The placeholder now holds `content`, the concatenation of all fragments so far.
    Fragment {
        id: String,
        content: String,
        html: String,
    },
    /// Reply finished; `id` is the finalized assistant turn.
    Done { id: Option<String> },
    /// Reply failed. `replaced` is the placeholder the error turn took the place of.
    Failed {
        turn: TurnView,
        replaced: Option<String>,
        message: String,
    },
}

impl TranscriptEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TranscriptEvent::Turn { .. } => "turn",
            TranscriptEvent::Fragment { .. } => "fragment",
            TranscriptEvent::Done { .. } => "done",
            TranscriptEvent::Failed { .. } => "failed",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ChatService
// ────────────────────────────────────────────────────────────────────────────

pub struct ChatService {
    sessions: SessionManager,
    transcript: Mutex<Transcript>,
    renderer: Arc<MarkdownRenderer>,
    profile: Arc<ProfileRecord>,
}

impl ChatService {
    pub fn new(
        sessions: SessionManager,
        renderer: Arc<MarkdownRenderer>,
        profile: Arc<ProfileRecord>,
    ) -> Self {
        Self {
            sessions,
            transcript: Mutex::new(Transcript::new()),
            renderer,
            profile,
        }
    }

    /// Starts the session and greets the visitor. On failure the error is kept as a
    /// persistent banner; the rest of the page keeps working.
    pub async fn initialize(&self) -> Result<(), InitializationError> {
        match self.sessions.start_session().await {
            Ok(session) => {
                let mut transcript = self.transcript.lock().await;
                if transcript.turn(WELCOME_TURN_ID).is_none() {
                    transcript.greet(&self.profile.personal_info.name);
                }
                info!("Chat ready (session {})", session.id());
                Ok(())
            }
            Err(e) => {
                error!("Chat initialization failed: {e}");
                self.transcript
                    .lock()
                    .await
                    .raise_banner(Banner::persistent(format!("Initialization failed: {e}")));
                Err(e)
            }
        }
    }

    pub fn chat_available(&self) -> bool {
        self.sessions.current().is_some()
    }

    /// Appends the user turn and starts the reply in the background.
    ///
    /// Rejected without touching the transcript when the chat is unavailable, the text
    /// is blank, or another reply is still in progress.
    pub async fn submit(
        self: &Arc<Self>,
        text: &str,
    ) -> Result<mpsc::UnboundedReceiver<TranscriptEvent>, ChatError> {
        let session = self
            .sessions
            .start_session()
            .await
            .map_err(|e| ChatError::Unavailable(e.to_string()))?;

        let (events, receiver) = mpsc::unbounded_channel();
        let user_text = {
            let mut transcript = self.transcript.lock().await;
            let turn = transcript.begin_exchange(text)?;
            let user_text = turn.content.clone();
            let _ = events.send(TranscriptEvent::Turn {
                turn: self.view(turn),
            });
            user_text
        };

        info!("Dispatching user turn ({} chars)", user_text.len());
        tokio::spawn(Arc::clone(self).drive_reply(session, user_text, events));

        Ok(receiver)
    }

    pub async fn snapshot(&self, now: Instant) -> TranscriptView {
        let mut transcript = self.transcript.lock().await;
        transcript.prune_banner(now);

        TranscriptView {
            turns: transcript.turns().iter().map(|t| self.view(t)).collect(),
            reply_in_progress: transcript.reply_in_progress(),
            show_typing_indicator: transcript.show_typing_indicator(),
            chat_available: self.chat_available(),
            banner: transcript.active_banner(now).map(|b| BannerView::new(b, now)),
        }
    }

    async fn drive_reply(
        self: Arc<Self>,
        session: SessionHandle,
        user_text: String,
        events: mpsc::UnboundedSender<TranscriptEvent>,
    ) {
        let mut stream = match session.send_turn(&user_text).await {
            Ok(stream) => stream,
            Err(e) => {
                self.fail_reply(e, &events).await;
                return;
            }
        };

        {
            let mut transcript = self.transcript.lock().await;
            match transcript.open_placeholder() {
                Ok(turn) => {
                    let _ = events.send(TranscriptEvent::Turn {
                        turn: self.view(turn),
                    });
                }
                Err(e) => {
                    error!("Could not open reply placeholder: {e}");
                    return;
                }
            }
        }

        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = match fragment {
                Ok(fragment) => fragment,
                Err(e) => {
                    self.fail_reply(e, &events).await;
                    return;
                }
            };
            reply.push_str(&fragment);

            let id = {
                let mut transcript = self.transcript.lock().await;
                match transcript.apply_fragment(&reply) {
                    Ok(turn) => turn.id.clone(),
                    Err(e) => {
                        error!("Dropping fragment: {e}");
                        continue;
                    }
                }
            };
            let _ = events.send(TranscriptEvent::Fragment {
                id,
                content: reply.clone(),
                html: self.renderer.render(&reply),
            });
        }

        let id = match self.transcript.lock().await.finish() {
            Ok(turn) => turn.map(|t| t.id.clone()),
            Err(e) => {
                error!("Could not finalize reply: {e}");
                return;
            }
        };
        info!("Reply finished ({} chars)", reply.len());
        let _ = events.send(TranscriptEvent::Done { id });
    }

    async fn fail_reply(&self, e: TransportError, events: &mpsc::UnboundedSender<TranscriptEvent>) {
        let message = e.to_string();
        warn!("Reply failed: {message}");

        let mut transcript = self.transcript.lock().await;
        let replaced = transcript.placeholder_id().map(str::to_string);
        match transcript.fail(&message, Instant::now()) {
            Ok(turn) => {
                let _ = events.send(TranscriptEvent::Failed {
                    turn: self.view(turn),
                    replaced,
                    message,
                });
            }
            Err(e) => error!("Could not record reply failure: {e}"),
        }
    }

    fn view(&self, turn: &Turn) -> TurnView {
        TurnView {
            id: turn.id.clone(),
            role: turn.role,
            content: turn.content.clone(),
            html: (turn.role == Role::Assistant).then(|| self.renderer.render(&turn.content)),
            created_at: turn.created_at,
        }
    }
}
