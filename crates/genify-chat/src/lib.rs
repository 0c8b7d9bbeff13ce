//! Conversational interface for Genify.
//!
//! Holds the session transcript, builds grounded insight requests in the
//! selected language, calls the provider through a single gateway, and
//! drives the send lifecycle.

pub mod context;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod request;
pub mod voice;

pub use context::Conversation;
pub use error::{ChatError, GatewayError, TransportError};
pub use gateway::{
    dedup_sources, Credential, GeminiTransport, InsightResult, InsightTransport, MockReply,
    MockTransport, ProviderGateway,
};
pub use orchestrator::{ChatOrchestrator, IgnoredReason, Phase, SubmitOutcome, CONNECTION_APOLOGY};
pub use request::{InsightRequest, InsightRequestBuilder, ProviderRole};
pub use voice::{SpeechCapture, UnsupportedSpeech, VoiceInterface};
