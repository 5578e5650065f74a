//! Transcript: the ordered turns of the one conversation plus its reply state machine.
//!
//! Phases: `Idle → AwaitingFirstFragment → Streaming → Idle`. A failure from either
//! in-progress phase also returns to `Idle`, with the assistant slot holding an error.
//! Only one assistant turn is ever in progress, so fragments never interleave.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

/// How long a transient error banner stays up.
pub const BANNER_TTL: Duration = Duration::from_secs(5);

pub const WELCOME_TURN_ID: &str = "init-message";

#[derive(Debug, Error, PartialEq)]
pub enum TranscriptError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("A reply is already in progress")]
    ReplyInProgress,

    #[error("No reply is in progress")]
    NoReplyInProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    fn new(prefix: &str, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: format!("{prefix}-{}", Uuid::new_v4()),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatPhase {
    Idle,
    /// User turn appended. `placeholder` is set once the reply stream is open.
    AwaitingFirstFragment { placeholder: Option<String> },
    Streaming { placeholder: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub message: String,
    expires_at: Option<Instant>,
}

impl Banner {
    pub fn persistent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expires_at: None,
        }
    }

    pub fn transient(message: impl Into<String>, now: Instant) -> Self {
        Self {
            message: message.into(),
            expires_at: Some(now + BANNER_TTL),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Time left before a transient banner dismisses itself. `None` when persistent.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(now))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Text shown in place of a reply that failed.
pub fn error_turn_text(reason: &str) -> String {
    format!("Sorry, I encountered an error: {reason}. Please try again.")
}

#[derive(Debug)]
pub struct Transcript {
    turns: Vec<Turn>,
    phase: ChatPhase,
    banner: Option<Banner>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            phase: ChatPhase::Idle,
            banner: None,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn phase(&self) -> &ChatPhase {
        &self.phase
    }

    pub fn reply_in_progress(&self) -> bool {
        self.phase != ChatPhase::Idle
    }

    /// True while a reply is pending and the user's turn is still the latest one.
    pub fn show_typing_indicator(&self) -> bool {
        self.reply_in_progress() && self.turns.last().is_some_and(|t| t.role == Role::User)
    }

    pub fn turn(&self, id: &str) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    /// Inserts the welcome message shown once the chat is ready.
    pub fn greet(&mut self, name: &str) -> &Turn {
        let content = format!(
            "Hello! I'm an AI assistant representing {name}. I'm here to help answer any \
             questions you might have about their professional experience, skills, and \
             projects, based strictly on the resume provided.\n\nPlease feel free to ask me anything!"
        );
        self.turns.insert(
            0,
            Turn {
                id: WELCOME_TURN_ID.to_string(),
                role: Role::Assistant,
                content,
                created_at: Utc::now(),
            },
        );
        &self.turns[0]
    }

    // ────────────────────────────────────────────────────────────────────────
    // Reply lifecycle
    // ────────────────────────────────────────────────────────────────────────

    /// Idle → AwaitingFirstFragment. Appends the user turn immediately.
    pub fn begin_exchange(&mut self, text: &str) -> Result<&Turn, TranscriptError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TranscriptError::EmptyMessage);
        }
        if self.reply_in_progress() {
            return Err(TranscriptError::ReplyInProgress);
        }

        self.turns.push(Turn::new("user", Role::User, text));
        self.phase = ChatPhase::AwaitingFirstFragment { placeholder: None };
        Ok(&self.turns[self.turns.len() - 1])
    }

    /// Appends the empty assistant turn that the reply will fill.
    pub fn open_placeholder(&mut self) -> Result<&Turn, TranscriptError> {
        match &self.phase {
            ChatPhase::AwaitingFirstFragment { placeholder: None } => {}
            _ => return Err(TranscriptError::NoReplyInProgress),
        }

        let turn = Turn::new("assistant", Role::Assistant, "");
        self.phase = ChatPhase::AwaitingFirstFragment {
            placeholder: Some(turn.id.clone()),
        };
        self.turns.push(turn);
        Ok(&self.turns[self.turns.len() - 1])
    }

    /// Overwrites the placeholder with everything received so far for this reply.
    pub fn apply_fragment(&mut self, cumulative: &str) -> Result<&Turn, TranscriptError> {
        let id = self
            .placeholder_id()
            .ok_or(TranscriptError::NoReplyInProgress)?
            .to_string();
        let index = self
            .index_of(&id)
            .ok_or(TranscriptError::NoReplyInProgress)?;

        self.turns[index].content = cumulative.to_string();
        self.phase = ChatPhase::Streaming { placeholder: id };
        Ok(&self.turns[index])
    }

    /// Stream closed cleanly: the reply is final as it stands, even if empty.
    pub fn finish(&mut self) -> Result<Option<&Turn>, TranscriptError> {
        if !self.reply_in_progress() {
            return Err(TranscriptError::NoReplyInProgress);
        }
        let index = self.placeholder_id().and_then(|id| self.index_of(id));
        self.phase = ChatPhase::Idle;
        Ok(index.map(|i| &self.turns[i]))
    }

    /// Replaces the placeholder (or appends, if none was opened) with an error turn
    /// and raises a transient banner carrying `reason`.
    pub fn fail(&mut self, reason: &str, now: Instant) -> Result<&Turn, TranscriptError> {
        if !self.reply_in_progress() {
            return Err(TranscriptError::NoReplyInProgress);
        }

        let error_turn = Turn::new("error", Role::Assistant, error_turn_text(reason));
        let placeholder = self.placeholder_id().and_then(|id| self.index_of(id));
        let index = match placeholder {
            Some(index) => {
                self.turns[index] = error_turn;
                index
            }
            None => {
                self.turns.push(error_turn);
                self.turns.len() - 1
            }
        };

        self.phase = ChatPhase::Idle;
        self.raise_banner(Banner::transient(reason, now));
        Ok(&self.turns[index])
    }

    // ────────────────────────────────────────────────────────────────────────
    // Banner
    // ────────────────────────────────────────────────────────────────────────

    /// A newer banner always replaces the current one.
    pub fn raise_banner(&mut self, banner: Banner) {
        self.banner = Some(banner);
    }

    pub fn active_banner(&self, now: Instant) -> Option<&Banner> {
        self.banner.as_ref().filter(|b| !b.is_expired(now))
    }

    pub fn prune_banner(&mut self, now: Instant) {
        if self.banner.as_ref().is_some_and(|b| b.is_expired(now)) {
            self.banner = None;
        }
    }

    /// Id of the assistant turn currently being filled, if one is open.
    pub fn placeholder_id(&self) -> Option<&str> {
        match &self.phase {
            ChatPhase::AwaitingFirstFragment { placeholder } => placeholder.as_deref(),
            ChatPhase::Streaming { placeholder } => Some(placeholder.as_str()),
            ChatPhase::Idle => None,
        }
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.turns.iter().rposition(|t| t.id == id)
    }
}
