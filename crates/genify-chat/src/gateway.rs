//! Provider gateway: the single call to the generative-language service.
//!
//! The gateway owns the credential, performs the pre-flight credential
//! check, issues exactly one transport call per send, and normalizes both
//! outcomes. Success becomes an [`InsightResult`] with deduplicated sources;
//! failure becomes one of the three [`GatewayError`] kinds.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use genify_core::config::ProviderConfig;
use genify_core::Source;

use crate::error::{GatewayError, TransportError};
use crate::request::{InsightRequest, ProviderRole};

/// Answer text used when the provider returns nothing.
pub const EMPTY_ANSWER: &str = "I was unable to generate a response. Please try again.";

/// Title used for grounding chunks that carry no title.
pub const DEFAULT_SOURCE_TITLE: &str = "Reference";

/// Shortest credential, in characters, accepted by the pre-flight check.
const MIN_KEY_LENGTH: usize = 10;

/// Placeholder some environments substitute for an unset variable.
const UNSET_SENTINEL: &str = "undefined";

// =============================================================================
// Credential
// =============================================================================

/// API credential handed to the gateway at construction.
#[derive(Clone, Default)]
pub struct Credential(Option<String>);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Some(key.into()))
    }

    pub fn missing() -> Self {
        Self(None)
    }

    /// Read the credential from the named environment variable.
    pub fn from_env(var: &str) -> Self {
        Self(std::env::var(var).ok())
    }

    /// The key, if it passes the plausibility check.
    pub fn validated(&self) -> Result<&str, GatewayError> {
        match self.0.as_deref() {
            Some(key) if key != UNSET_SENTINEL && key.chars().count() >= MIN_KEY_LENGTH => Ok(key),
            _ => Err(GatewayError::KeyMissing),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.0.is_some() { "<redacted>" } else { "<missing>" };
        f.debug_tuple("Credential").field(&shown).finish()
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<WireContent<'a>>,
    system_instruction: WireInstruction<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    role: ProviderRole,
    parts: [WireTextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct WireInstruction<'a> {
    parts: [WireTextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct WireTextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct WireTool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
struct WireGenerationConfig {
    temperature: f32,
}

impl<'a> From<&'a InsightRequest> for GenerateContentRequest<'a> {
    fn from(request: &'a InsightRequest) -> Self {
        let contents = request
            .contents
            .iter()
            .map(|c| WireContent {
                role: c.role,
                parts: [WireTextPart { text: &c.text }],
            })
            .collect();
        let tools = if request.web_search {
            vec![WireTool {
                google_search: GoogleSearch {},
            }]
        } else {
            vec![]
        };

        Self {
            contents,
            system_instruction: WireInstruction {
                parts: [WireTextPart {
                    text: &request.system_instruction,
                }],
            },
            tools,
            generation_config: WireGenerationConfig {
                temperature: request.temperature,
            },
        }
    }
}

/// Provider response. Every field is optional on the wire and defaulted here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CandidateContent {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Part {
    pub text: Option<String>,
    /// Set on reasoning parts, which are not part of the answer.
    pub thought: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroundingMetadata {
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroundingChunk {
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebChunk {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    message: String,
}

impl GenerateContentResponse {
    /// Concatenated answer text of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// Web citations of the first candidate, in provider order.
    ///
    /// Chunks without a URI are dropped; missing titles get a placeholder.
    pub fn sources(&self) -> Vec<Source> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .filter_map(|web| {
                        let uri = web.uri.as_deref().filter(|u| !u.is_empty())?;
                        let title = web
                            .title
                            .as_deref()
                            .filter(|t| !t.is_empty())
                            .unwrap_or(DEFAULT_SOURCE_TITLE);
                        Some(Source::new(title, uri))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// Result + normalization
// =============================================================================

/// Normalized successful answer.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightResult {
    pub text: String,
    pub sources: Vec<Source>,
}

impl From<GenerateContentResponse> for InsightResult {
    fn from(response: GenerateContentResponse) -> Self {
        let text = response.text();
        let text = if text.trim().is_empty() {
            EMPTY_ANSWER.to_string()
        } else {
            text
        };
        Self {
            text,
            sources: dedup_sources(response.sources()),
        }
    }
}

/// Deduplicate sources by URI.
///
/// A repeated URI keeps the position of its first occurrence and takes the
/// title of its last occurrence.
pub fn dedup_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(sources.len());
    let mut unique: Vec<Source> = Vec::with_capacity(sources.len());

    for source in sources {
        match positions.get(&source.uri) {
            Some(&idx) => unique[idx].title = source.title,
            None => {
                positions.insert(source.uri.clone(), unique.len());
                unique.push(source);
            }
        }
    }
    unique
}

// =============================================================================
// Transport
// =============================================================================

/// One request/response exchange with the provider.
///
/// Implementations return raw failure detail; classification happens in
/// [`ProviderGateway`].
pub trait InsightTransport: Send + Sync {
    fn generate(
        &self,
        api_key: &str,
        request: &InsightRequest,
    ) -> impl Future<Output = Result<GenerateContentResponse, TransportError>> + Send;
}

/// HTTP transport for the Gemini `generateContent` REST endpoint.
pub struct GeminiTransport {
    client: reqwest::Client,
    api_base: String,
    model: String,
}

impl GeminiTransport {
    pub fn new(config: &ProviderConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("genify/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

impl InsightTransport for GeminiTransport {
    async fn generate(
        &self,
        api_key: &str,
        request: &InsightRequest,
    ) -> Result<GenerateContentResponse, TransportError> {
        let body = GenerateContentRequest::from(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_message(&raw),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Extract `error.message` from a provider error body, else the raw body.
fn error_message(raw: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(raw)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| raw.to_string())
}

// =============================================================================
// Mock transport
// =============================================================================

/// Scripted reply for [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Answer { text: String, sources: Vec<Source> },
    Fail { status: u16, message: String },
}

impl MockReply {
    pub fn answer(text: impl Into<String>, sources: Vec<Source>) -> Self {
        MockReply::Answer {
            text: text.into(),
            sources,
        }
    }

    pub fn fail(status: u16, message: impl Into<String>) -> Self {
        MockReply::Fail {
            status,
            message: message.into(),
        }
    }
}

/// In-memory transport for tests and offline development.
///
/// Replays scripted replies in order (a fixed answer once the script runs
/// out) and records every request it receives.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<InsightRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of provider calls made so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<InsightRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl InsightTransport for MockTransport {
    async fn generate(
        &self,
        _api_key: &str,
        request: &InsightRequest,
    ) -> Result<GenerateContentResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let reply = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| MockReply::answer("[mock insight]", vec![]));

        match reply {
            MockReply::Answer { text, sources } => Ok(response_with(&text, &sources)),
            MockReply::Fail { status, message } => {
                Err(TransportError::Status { status, message })
            }
        }
    }
}

/// Build a provider-shaped response carrying `text` and `sources`.
pub fn response_with(text: &str, sources: &[Source]) -> GenerateContentResponse {
    let chunks = sources
        .iter()
        .map(|s| GroundingChunk {
            web: Some(WebChunk {
                uri: Some(s.uri.clone()),
                title: Some(s.title.clone()),
            }),
        })
        .collect();
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(CandidateContent {
                parts: vec![Part {
                    text: Some(text.to_string()),
                    thought: false,
                }],
            }),
            grounding_metadata: Some(GroundingMetadata {
                grounding_chunks: chunks,
            }),
        }],
    }
}

// =============================================================================
// Gateway
// =============================================================================

/// Owns the credential and the transport; translates every outcome.
pub struct ProviderGateway<T> {
    transport: T,
    credential: Credential,
}

impl<T: InsightTransport> ProviderGateway<T> {
    pub fn new(transport: T, credential: Credential) -> Self {
        Self {
            transport,
            credential,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Perform one provider call.
    ///
    /// A missing or implausible credential fails with
    /// [`GatewayError::KeyMissing`] before the transport is touched.
    pub async fn send(&self, request: &InsightRequest) -> Result<InsightResult, GatewayError> {
        let api_key = self.credential.validated().inspect_err(|_| {
            tracing::warn!("API credential missing or malformed; skipping provider call");
        })?;

        match self.transport.generate(api_key, request).await {
            Ok(response) => {
                let result = InsightResult::from(response);
                tracing::debug!(
                    text_len = result.text.len(),
                    sources = result.sources.len(),
                    "Provider answered"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Provider call failed");
                Err(GatewayError::classify(&e))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
