//! Chat orchestrator: drives the turn lifecycle of one session.
//!
//! `Idle --submit--> Sending --success|failure--> Idle`. Only one send may be
//! in flight; a submit while sending is ignored rather than queued, so turns
//! are appended strictly in the order their sends were issued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use genify_core::{ErrorStatus, Language, Turn};

use crate::context::Conversation;
use crate::error::ChatError;
use crate::gateway::{InsightTransport, ProviderGateway};
use crate::request::InsightRequestBuilder;
use crate::voice::{SpeechCapture, VoiceInterface};

/// Assistant turn appended when a send fails, whatever the failure kind.
pub const CONNECTION_APOLOGY: &str = "I'm having trouble connecting to the intelligence network. Please check your environment configuration.";

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
}

/// Why a submit was dropped without touching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    EmptyQuery,
    Busy,
}

/// What a call to [`ChatOrchestrator::submit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The provider answered; an assistant turn with its text was appended.
    Answered,
    /// The send failed; the apology turn was appended and the banner set.
    Failed(ErrorStatus),
    /// The session was reset while the send was in flight; the reply was
    /// dropped so it cannot land in the new transcript.
    Discarded,
    /// Nothing happened.
    Ignored(IgnoredReason),
}

/// Mutable state of the session.
#[derive(Debug)]
struct SessionState {
    id: Uuid,
    conversation: Conversation,
    language: Language,
    error_status: ErrorStatus,
    input: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation: Conversation::new(),
            language: Language::default(),
            error_status: ErrorStatus::None,
            input: String::new(),
        }
    }
}

/// Clears the in-flight flag when a send ends.
struct SendingGuard<'a>(&'a AtomicBool);

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Central coordinator for one user session.
pub struct ChatOrchestrator<T> {
    gateway: ProviderGateway<T>,
    builder: InsightRequestBuilder,
    state: Mutex<SessionState>,
    sending: AtomicBool,
}

impl<T: InsightTransport> ChatOrchestrator<T> {
    /// Start a fresh session: empty transcript, English, no error.
    pub fn new(gateway: ProviderGateway<T>, builder: InsightRequestBuilder) -> Self {
        let state = SessionState::default();
        tracing::info!(session_id = %state.id, "Chat session started");
        Self {
            gateway,
            builder,
            state: Mutex::new(state),
            sending: AtomicBool::new(false),
        }
    }

    pub fn gateway(&self) -> &ProviderGateway<T> {
        &self.gateway
    }

    /// Submit `query` as the next user turn and await the answer.
    ///
    /// Blank queries and submits while another send is in flight are
    /// ignored. Otherwise exactly one user turn and one assistant turn are
    /// appended, in that order.
    pub async fn submit(&self, query: &str) -> SubmitOutcome {
        if query.trim().is_empty() {
            return SubmitOutcome::Ignored(IgnoredReason::EmptyQuery);
        }
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Send already in flight; ignoring submit");
            return SubmitOutcome::Ignored(IgnoredReason::Busy);
        }
        let _guard = SendingGuard(&self.sending);

        let (session_id, request) = {
            let mut state = self.lock_state();
            let request = self
                .builder
                .build(query, state.language, state.conversation.turns());
            state.conversation.push(Turn::user(query));
            state.input.clear();
            state.error_status = ErrorStatus::None;
            tracing::info!(
                session_id = %state.id,
                language = state.language.directive_name(),
                history = request.contents.len() - 1,
                "Sending query"
            );
            (state.id, request)
        };

        let result = self.gateway.send(&request).await;

        let mut state = self.lock_state();
        if state.id != session_id {
            tracing::info!(session_id = %session_id, "Session reset mid-flight; reply dropped");
            return SubmitOutcome::Discarded;
        }
        match result {
            Ok(insight) => {
                tracing::info!(
                    session_id = %state.id,
                    sources = insight.sources.len(),
                    "Answer received"
                );
                state
                    .conversation
                    .push(Turn::assistant(insight.text, Some(insight.sources)));
                SubmitOutcome::Answered
            }
            Err(e) => {
                let status = e.status();
                tracing::warn!(session_id = %state.id, error = %e, "Send failed");
                state.error_status = status;
                state.conversation.push(Turn::assistant(CONNECTION_APOLOGY, None));
                SubmitOutcome::Failed(status)
            }
        }
    }

    /// Submit whatever is in the input buffer.
    pub async fn submit_input(&self) -> SubmitOutcome {
        let query = self.input();
        self.submit(&query).await
    }

    /// Capture one utterance and place it in the input buffer.
    ///
    /// Allowed while a send is in flight; it only touches the buffer.
    pub async fn capture_voice<S: SpeechCapture>(
        &self,
        voice: &VoiceInterface<S>,
    ) -> Result<(), ChatError> {
        let transcript = voice.listen(self.language()).await?;
        self.set_input(transcript);
        Ok(())
    }

    /// Clear the transcript and the error banner. The language is kept.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        let previous = state.id;
        state.id = Uuid::new_v4();
        state.conversation.clear();
        state.error_status = ErrorStatus::None;
        tracing::info!(previous = %previous, session_id = %state.id, "Session reset");
    }

    /// Select the language for subsequent requests.
    pub fn set_language(&self, language: Language) {
        let mut state = self.lock_state();
        if state.language != language {
            tracing::info!(session_id = %state.id, language = language.directive_name(), "Language changed");
            state.language = language;
        }
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.lock_state().input = text.into();
    }

    pub fn input(&self) -> String {
        self.lock_state().input.clone()
    }

    pub fn language(&self) -> Language {
        self.lock_state().language
    }

    pub fn error_status(&self) -> ErrorStatus {
        self.lock_state().error_status
    }

    pub fn session_id(&self) -> Uuid {
        self.lock_state().id
    }

    /// Snapshot of the transcript.
    pub fn turns(&self) -> Vec<Turn> {
        self.lock_state().conversation.turns().to_vec()
    }

    pub fn turn_count(&self) -> usize {
        self.lock_state().conversation.len()
    }

    pub fn phase(&self) -> Phase {
        if self.sending.load(Ordering::Acquire) {
            Phase::Sending
        } else {
            Phase::Idle
        }
    }

    pub fn is_sending(&self) -> bool {
        self.phase() == Phase::Sending
    }

    // -- Private helpers --

    /// The state holds no invariants a panicking writer could break, so a
    /// poisoned lock is recovered rather than propagated.
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Credential, MockReply, MockTransport};
    use genify_core::{Role, Source};

    const KEY: &str = "AIzaSy-test-credential";

    fn orchestrator(replies: Vec<MockReply>) -> ChatOrchestrator<MockTransport> {
        let gateway = ProviderGateway::new(MockTransport::with_replies(replies), Credential::new(KEY));
        ChatOrchestrator::new(gateway, InsightRequestBuilder::default())
    }

    // ---- Initial state ----

    #[test]
    fn test_new_session_defaults() {
        let orch = orchestrator(vec![]);
        assert_eq!(orch.turn_count(), 0);
        assert_eq!(orch.language(), Language::English);
        assert_eq!(orch.error_status(), ErrorStatus::None);
        assert_eq!(orch.phase(), Phase::Idle);
        assert!(orch.input().is_empty());
    }

    // ---- Submit ----

    #[tokio::test]
    async fn test_submit_appends_user_then_assistant() {
        let orch = orchestrator(vec![MockReply::answer(
            "## VCs\n- Foo Capital",
            vec![Source::new("Inc42", "https://inc42.com/x")],
        )]);

        let outcome = orch.submit("Active SaaS VCs in India 2024").await;
        assert_eq!(outcome, SubmitOutcome::Answered);

        let turns = orch.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "Active SaaS VCs in India 2024");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "## VCs\n- Foo Capital");
        assert_eq!(turns[1].sources().len(), 1);
        assert_eq!(orch.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_blank_submit_is_ignored() {
        let orch = orchestrator(vec![]);
        orch.set_input("   ");
        for query in ["", "   ", "\n\t"] {
            assert_eq!(
                orch.submit(query).await,
                SubmitOutcome::Ignored(IgnoredReason::EmptyQuery)
            );
        }
        assert_eq!(orch.submit_input().await, SubmitOutcome::Ignored(IgnoredReason::EmptyQuery));
        assert_eq!(orch.turn_count(), 0);
        assert_eq!(orch.gateway().transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_while_sending_is_ignored() {
        let orch = orchestrator(vec![]);
        orch.sending.store(true, Ordering::Release);

        assert_eq!(orch.submit("query").await, SubmitOutcome::Ignored(IgnoredReason::Busy));
        assert_eq!(orch.turn_count(), 0);
        assert_eq!(orch.gateway().transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_user_text_is_kept_raw() {
        let orch = orchestrator(vec![]);
        orch.submit("  padded query  ").await;
        assert_eq!(orch.turns()[0].content, "  padded query  ");
    }

    #[tokio::test]
    async fn test_request_uses_prior_history_only() {
        let orch = orchestrator(vec![]);
        orch.submit("first").await;
        orch.submit("second").await;

        let requests = orch.gateway().transport().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].contents.len(), 1);
        assert_eq!(requests[1].contents.len(), 3);
        assert_eq!(requests[1].contents[0].text, "first");
        assert_eq!(
            requests[1].active_query(),
            Some("Selected Response Language: English. Query: second")
        );
    }

    #[tokio::test]
    async fn test_submit_input_clears_buffer() {
        let orch = orchestrator(vec![]);
        orch.set_input("Startup India tax exemptions");
        assert_eq!(orch.submit_input().await, SubmitOutcome::Answered);
        assert!(orch.input().is_empty());
        assert_eq!(orch.turns()[0].content, "Startup India tax exemptions");
    }

    // ---- Failure ----

    #[tokio::test]
    async fn test_missing_key_appends_apology() {
        let gateway = ProviderGateway::new(MockTransport::new(), Credential::missing());
        let orch = ChatOrchestrator::new(gateway, InsightRequestBuilder::default());

        let outcome = orch.submit("anything").await;
        assert_eq!(outcome, SubmitOutcome::Failed(ErrorStatus::KeyMissing));
        assert_eq!(orch.error_status(), ErrorStatus::KeyMissing);
        assert_eq!(orch.turns().last().unwrap().content, CONNECTION_APOLOGY);
        assert!(orch.turns().last().unwrap().sources.is_none());
        assert_eq!(orch.gateway().transport().calls(), 0);
        assert_eq!(orch.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_invalid_key_sets_status() {
        let orch = orchestrator(vec![MockReply::fail(400, "API key not valid. Please pass a valid API key.")]);
        assert_eq!(orch.submit("q").await, SubmitOutcome::Failed(ErrorStatus::KeyInvalid));
        assert_eq!(orch.error_status(), ErrorStatus::KeyInvalid);
        assert_eq!(orch.turn_count(), 2);
    }

    #[tokio::test]
    async fn test_next_send_clears_error_status() {
        let orch = orchestrator(vec![MockReply::fail(500, "boom"), MockReply::answer("ok", vec![])]);
        orch.submit("first").await;
        assert_eq!(orch.error_status(), ErrorStatus::Generic);

        orch.submit("second").await;
        assert_eq!(orch.error_status(), ErrorStatus::None);
        assert_eq!(orch.turn_count(), 4);
    }

    // ---- Language / reset ----

    #[tokio::test]
    async fn test_language_change_affects_only_later_requests() {
        let orch = orchestrator(vec![]);
        orch.submit("first").await;
        let before = orch.turns();

        orch.set_language(Language::Bengali);
        orch.submit("second").await;

        assert_eq!(orch.turns()[..2], before[..]);
        let requests = orch.gateway().transport().requests();
        assert!(requests[0].system_instruction.contains("language: English."));
        assert!(requests[1].system_instruction.contains("language: Bengali."));
        assert_eq!(
            requests[1].active_query(),
            Some("Selected Response Language: Bengali. Query: second")
        );
    }

    #[tokio::test]
    async fn test_reset_keeps_language() {
        let orch = orchestrator(vec![MockReply::fail(500, "boom")]);
        orch.set_language(Language::Gujarati);
        orch.submit("q").await;
        let old_session = orch.session_id();

        orch.reset();
        assert_eq!(orch.turn_count(), 0);
        assert_eq!(orch.error_status(), ErrorStatus::None);
        assert_eq!(orch.language(), Language::Gujarati);
        assert_ne!(orch.session_id(), old_session);
    }

    // ---- Voice ----

    #[tokio::test]
    async fn test_capture_voice_unavailable_leaves_input() {
        let orch = orchestrator(vec![]);
        orch.set_input("typed");
        let voice = VoiceInterface::new(crate::voice::UnsupportedSpeech);
        let err = orch.capture_voice(&voice).await.unwrap_err();
        assert!(matches!(err, ChatError::VoiceUnavailable));
        assert_eq!(orch.input(), "typed");
    }
}
