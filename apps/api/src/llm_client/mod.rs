/// LLM Client: the single point of entry for all Gemini API calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// Everything goes through a `ChatBackend`; `GeminiClient` is the production one.
///
/// Replies are always streamed. There is no retry loop here: a failed exchange is
/// reported to the user, who decides whether to send again.
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod sse;
pub mod stream;

pub use stream::{FragmentSender, FragmentStream, FRAGMENT_BUFFER};

use sse::SseDecoder;

const CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response stream: {0}")]
    MalformedStream(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Backend seam
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Model,
}

/// One completed turn as the remote service sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTurn {
    pub role: HistoryRole,
    pub text: String,
}

impl HistoryTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::Model,
            text: text.into(),
        }
    }
}

/// Everything one streamed reply needs. `history` ends with the new user turn.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub model: String,
    pub system_instruction: String,
    pub history: Vec<HistoryTurn>,
}

/// The remote LLM service. Carried as `Arc<dyn ChatBackend>`.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Issues exactly one outbound request and returns the reply as a fragment stream.
    async fn stream_reply(&self, request: ReplyRequest) -> Result<FragmentStream, TransportError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: HistoryRole,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> From<&'a ReplyRequest> for GenerateContentRequest<'a> {
    fn from(request: &'a ReplyRequest) -> Self {
        Self {
            system_instruction: SystemInstruction {
                parts: [Part {
                    text: &request.system_instruction,
                }],
            },
            contents: request
                .history
                .iter()
                .map(|turn| Content {
                    role: turn.role,
                    parts: [Part { text: &turn.text }],
                })
                .collect(),
        }
    }
}

/// One `data:` payload of the streamed response.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    code: Option<i64>,
    message: Option<String>,
    status: Option<String>,
}

impl GeminiErrorBody {
    fn describe(self, fallback: &str) -> String {
        let message = self.message.unwrap_or_else(|| fallback.to_string());
        match self.status {
            Some(status) if !status.is_empty() => format!("{status}: {message}"),
            _ => message,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GeminiClient
// ────────────────────────────────────────────────────────────────────────────

/// Streams replies from the Gemini `streamGenerateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self, TransportError> {
        // No read timeout: a reply streams for as long as the service keeps sending.
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/models/{model}:streamGenerateContent?alt=sse",
            self.base_url
        )
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn stream_reply(&self, request: ReplyRequest) -> Result<FragmentStream, TransportError> {
        let body = GenerateContentRequest::from(&request);

        debug!(
            "Requesting streamed reply: model={}, history_turns={}",
            request.model,
            request.history.len()
        );

        let response = self
            .client
            .post(self.stream_url(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {}: {}", status, body);
            return Err(api_error(status.as_u16(), &body));
        }

        let (sender, stream) = FragmentStream::channel(FRAGMENT_BUFFER);
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from));
        tokio::spawn(pump_body(body, sender));

        Ok(stream)
    }
}

/// Builds an `Api` error, preferring the message from Gemini's JSON error body.
fn api_error(status: u16, body: &str) -> TransportError {
    let message = serde_json::from_str::<GeminiError>(body)
        .map(|e| e.error.describe(body))
        .unwrap_or_else(|_| body.to_string());

    TransportError::Api { status, message }
}

/// Decodes the SSE body and forwards every text fragment, in order, to `sender`.
async fn pump_body<S>(body: S, sender: FragmentSender)
where
    S: Stream<Item = Result<Bytes, TransportError>> + Send,
{
    futures::pin_mut!(body);
    let mut decoder = SseDecoder::default();
    let mut fragments = 0usize;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Reply stream broke after {fragments} fragments: {e}");
                sender.fail(e).await;
                return;
            }
        };

        for payload in decoder.push(&chunk) {
            match parse_chunk(&payload) {
                Ok(Some(text)) => {
                    fragments += 1;
                    if !sender.fragment(text).await {
                        debug!("Fragment consumer dropped, stopping body pump");
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Reply stream failed after {fragments} fragments: {e}");
                    sender.fail(e).await;
                    return;
                }
            }
        }
    }

    if let Some(payload) = decoder.finish() {
        match parse_chunk(&payload) {
            Ok(Some(text)) => {
                fragments += 1;
                sender.fragment(text).await;
            }
            Ok(None) => {}
            Err(e) => {
                sender.fail(e).await;
                return;
            }
        }
    }

    debug!("Reply stream closed after {fragments} fragments");
}

/// Extracts the text of one streamed chunk. `Ok(None)` for chunks carrying no text.
fn parse_chunk(payload: &str) -> Result<Option<String>, TransportError> {
    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| TransportError::MalformedStream(format!("undecodable chunk: {e}")))?;

    if let Some(error) = chunk.error {
        let status = error
            .code
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        return Err(TransportError::Api {
            status,
            message: error.describe("error reported mid-stream"),
        });
    }

    let text: String = chunk
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Ok(if text.is_empty() { None } else { Some(text) })
}
