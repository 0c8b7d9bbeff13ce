//! Speech capture boundary.
//!
//! Speech recognition is an external capability. [`VoiceInterface`] checks
//! availability before every capture, tracks whether a capture is in
//! progress, and hands back exactly one transcript per capture.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use genify_core::Language;

use crate::error::ChatError;

/// A host speech recognizer.
pub trait SpeechCapture: Send + Sync {
    /// Synchronous capability check. Must be true before `capture` is called.
    fn is_available(&self) -> bool;

    /// Recognize one utterance in the given locale.
    fn capture(&self, locale: &str) -> impl Future<Output = Result<String, ChatError>> + Send;
}

/// Recognizer for hosts without a speech API, such as a plain terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedSpeech;

impl SpeechCapture for UnsupportedSpeech {
    fn is_available(&self) -> bool {
        false
    }

    async fn capture(&self, _locale: &str) -> Result<String, ChatError> {
        Err(ChatError::VoiceUnavailable)
    }
}

/// Voice input state around a [`SpeechCapture`].
pub struct VoiceInterface<S> {
    recognizer: S,
    listening: AtomicBool,
}

/// Clears the listening flag when a capture ends, however it ends.
struct ListeningGuard<'a>(&'a AtomicBool);

impl Drop for ListeningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: SpeechCapture> VoiceInterface<S> {
    pub fn new(recognizer: S) -> Self {
        Self {
            recognizer,
            listening: AtomicBool::new(false),
        }
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_available()
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Capture one transcript using the locale of `language`.
    pub async fn listen(&self, language: Language) -> Result<String, ChatError> {
        if !self.recognizer.is_available() {
            return Err(ChatError::VoiceUnavailable);
        }
        if self
            .listening
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChatError::VoiceBusy);
        }
        let _guard = ListeningGuard(&self.listening);

        let locale = language.speech_locale();
        tracing::debug!(locale, "Listening for voice input");
        let transcript = self.recognizer.capture(locale).await?;
        tracing::debug!(chars = transcript.chars().count(), "Voice input recognized");
        Ok(transcript)
    }
}

// =============================================================================
// Tests
// =============================================================================
