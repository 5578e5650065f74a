//! Chat session: the one conversation context bound to a fixed system instruction.
//!
//! `SessionManager` creates the handle on first use and hands the same one back on
//! every later call. `SessionHandle::send_turn` is the turn dispatcher: it sends the
//! full accumulated history plus the new user text and returns the reply stream.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm_client::{ChatBackend, FragmentStream, HistoryTurn, ReplyRequest, TransportError};
use crate::profile::prompts::build_system_instruction;
use crate::profile::{ProfileError, ProfileRecord};

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("{0} environment variable not set.")]
    MissingCredential(&'static str),

    #[error("could not build system instruction: {0}")]
    Instruction(#[from] ProfileError),
}

// ────────────────────────────────────────────────────────────────────────────
// Session initializer
// ────────────────────────────────────────────────────────────────────────────

/// Owns the process-wide session slot.
pub struct SessionManager {
    /// `None` when the credential is absent from the environment.
    backend: Option<Arc<dyn ChatBackend>>,
    credential_var: &'static str,
    model: String,
    profile: Arc<ProfileRecord>,
    slot: OnceCell<SessionHandle>,
}

impl SessionManager {
    pub fn new(
        backend: Option<Arc<dyn ChatBackend>>,
        credential_var: &'static str,
        model: String,
        profile: Arc<ProfileRecord>,
    ) -> Self {
        Self {
            backend,
            credential_var,
            model,
            profile,
            slot: OnceCell::new(),
        }
    }

    /// Returns the session, creating it on the first successful call.
    ///
    /// Failures are not cached; with an unchanged environment a retry fails the same way.
    pub async fn start_session(&self) -> Result<SessionHandle, InitializationError> {
        let handle = self
            .slot
            .get_or_try_init(|| async {
                let backend = self
                    .backend
                    .clone()
                    .ok_or(InitializationError::MissingCredential(self.credential_var))?;
                let instruction = build_system_instruction(&self.profile)?;
                let handle = SessionHandle::new(backend, self.model.clone(), instruction);
                info!(
                    "Chat session {} created (model: {}, instruction: {} chars)",
                    handle.id(),
                    handle.model(),
                    handle.system_instruction().len()
                );
                Ok::<_, InitializationError>(handle)
            })
            .await?;

        Ok(handle.clone())
    }

    /// The session, if one has been created.
    pub fn current(&self) -> Option<SessionHandle> {
        self.slot.get().cloned()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session handle & turn dispatcher
// ────────────────────────────────────────────────────────────────────────────

struct SessionInner {
    id: Uuid,
    model: String,
    system_instruction: String,
    history: Mutex<Vec<HistoryTurn>>,
    backend: Arc<dyn ChatBackend>,
}

/// Cheap to clone; all clones refer to the same conversation.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    fn new(backend: Arc<dyn ChatBackend>, model: String, system_instruction: String) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                model,
                system_instruction,
                history: Mutex::new(Vec::new()),
                backend,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn model(&self) -> &str {
        &self.inner.model
    }

    pub fn system_instruction(&self) -> &str {
        &self.inner.system_instruction
    }

    pub fn ptr_eq(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Completed turns so far, oldest first.
    pub async fn history(&self) -> Vec<HistoryTurn> {
        self.inner.history.lock().await.clone()
    }

    /// Sends one user turn and returns the reply stream.
    ///
    /// The caller guarantees `text` is non-blank and that no other turn is in flight.
    pub async fn send_turn(&self, text: &str) -> Result<TurnStream, TransportError> {
        let mut history = self.history().await;
        history.push(HistoryTurn::user(text));

        debug!(
            "Session {}: dispatching turn ({} turns of history)",
            self.inner.id,
            history.len() - 1
        );

        let request = ReplyRequest {
            model: self.inner.model.clone(),
            system_instruction: self.inner.system_instruction.clone(),
            history,
        };
        let fragments = self.inner.backend.stream_reply(request).await?;

        Ok(TurnStream {
            session: self.clone(),
            user_text: text.to_string(),
            reply: String::new(),
            fragments,
            settled: false,
        })
    }
}

/// Reply stream for one turn. On clean close the exchange joins the session history.
/// A failed exchange, or one whose reply carried no text, leaves the history untouched:
/// the service rejects requests whose history holds an empty model turn.
pub struct TurnStream {
    session: SessionHandle,
    user_text: String,
    reply: String,
    fragments: FragmentStream,
    settled: bool,
}

impl TurnStream {
    pub async fn next(&mut self) -> Option<Result<String, TransportError>> {
        if self.settled {
            return None;
        }

        match self.fragments.next().await {
            Some(Ok(fragment)) => {
                self.reply.push_str(&fragment);
                Some(Ok(fragment))
            }
            Some(Err(e)) => {
                self.settled = true;
                Some(Err(e))
            }
            None => {
                self.settled = true;
                if self.reply.is_empty() {
                    warn!(
                        "Session {}: reply carried no text, exchange left out of history",
                        self.session.id()
                    );
                    return None;
                }
                let mut history = self.session.inner.history.lock().await;
                history.push(HistoryTurn::user(std::mem::take(&mut self.user_text)));
                history.push(HistoryTurn::model(std::mem::take(&mut self.reply)));
                None
            }
        }
    }
}
