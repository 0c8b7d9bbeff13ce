//! Error types for the conversational interface.

use genify_core::ErrorStatus;

/// Substring the provider uses when it rejects a credential.
const INVALID_KEY_SIGNAL: &str = "API key not valid";

/// Errors from the chat engine outside the send pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("speech recognition is not available on this platform")]
    VoiceUnavailable,
    #[error("voice capture is already active")]
    VoiceBusy,
    #[error("voice error: {0}")]
    VoiceError(String),
}

/// Raw failure detail from a provider transport.
///
/// Never leaves the gateway: it is folded into [`GatewayError`] before
/// anything above the gateway sees it.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed provider response: {0}")]
    Decode(String),
}

/// The three-way failure taxonomy of a send attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Credential absent or malformed; no request was made.
    #[error("API key missing")]
    KeyMissing,
    /// The provider rejected the credential.
    #[error("API key invalid")]
    KeyInvalid,
    /// Anything else: network, status, decoding.
    #[error("provider request failed: {0}")]
    Generic(String),
}

impl GatewayError {
    /// Fold raw transport detail into the taxonomy.
    pub fn classify(err: &TransportError) -> Self {
        let detail = err.to_string();
        if detail.contains(INVALID_KEY_SIGNAL) {
            GatewayError::KeyInvalid
        } else {
            GatewayError::Generic(detail)
        }
    }

    /// Banner state this failure maps to.
    pub fn status(&self) -> ErrorStatus {
        match self {
            GatewayError::KeyMissing => ErrorStatus::KeyMissing,
            GatewayError::KeyInvalid => ErrorStatus::KeyInvalid,
            GatewayError::Generic(_) => ErrorStatus::Generic,
        }
    }
}
