//! End-to-end session tests for the chat orchestrator.
//!
//! Every test drives a fresh orchestrator through the public API with an
//! in-memory transport; no network access is made.

use std::sync::Arc;

use tokio::sync::Notify;

use genify_chat::gateway::{response_with, GenerateContentResponse};
use genify_chat::{
    ChatError, ChatOrchestrator, Credential, IgnoredReason, InsightRequest,
    InsightRequestBuilder, InsightTransport, MockReply, MockTransport, Phase, ProviderGateway,
    SpeechCapture, SubmitOutcome, TransportError, VoiceInterface, CONNECTION_APOLOGY,
};
use genify_core::{ErrorStatus, Language, Role, Source};

// =============================================================================
// Helpers
// =============================================================================

const TEST_KEY: &str = "AIzaSy-integration-key";

fn session(replies: Vec<MockReply>) -> ChatOrchestrator<MockTransport> {
    let gateway = ProviderGateway::new(
        MockTransport::with_replies(replies),
        Credential::new(TEST_KEY),
    );
    ChatOrchestrator::new(gateway, InsightRequestBuilder::default())
}

/// Transport that parks inside the provider call until released.
#[derive(Default)]
struct GatedTransport {
    entered: Notify,
    release: Notify,
}

impl InsightTransport for GatedTransport {
    async fn generate(
        &self,
        _api_key: &str,
        _request: &InsightRequest,
    ) -> Result<GenerateContentResponse, TransportError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(response_with("late answer", &[]))
    }
}

fn gated_session() -> Arc<ChatOrchestrator<GatedTransport>> {
    let gateway = ProviderGateway::new(GatedTransport::default(), Credential::new(TEST_KEY));
    Arc::new(ChatOrchestrator::new(gateway, InsightRequestBuilder::default()))
}

struct FixedSpeech(&'static str);

impl SpeechCapture for FixedSpeech {
    fn is_available(&self) -> bool {
        true
    }

    async fn capture(&self, _locale: &str) -> Result<String, ChatError> {
        Ok(self.0.to_string())
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_grounded_answer_scenario() {
    let orch = session(vec![MockReply::answer(
        "## VCs\n- Foo Capital",
        vec![Source::new("Inc42", "https://inc42.com/x")],
    )]);

    let outcome = orch.submit("Active SaaS VCs in India 2024").await;

    assert_eq!(outcome, SubmitOutcome::Answered);
    let turns = orch.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].sources().len(), 1);
    assert_eq!(turns[1].sources()[0].uri, "https://inc42.com/x");
    assert_eq!(orch.error_status(), ErrorStatus::None);
}

#[tokio::test]
async fn test_unset_credential_scenario() {
    let gateway = ProviderGateway::new(MockTransport::new(), Credential::missing());
    let orch = ChatOrchestrator::new(gateway, InsightRequestBuilder::default());

    orch.submit("Latest funding rounds in Bengaluru").await;

    assert_eq!(orch.error_status(), ErrorStatus::KeyMissing);
    assert_eq!(orch.turns().last().unwrap().content, CONNECTION_APOLOGY);
    assert_eq!(orch.gateway().transport().calls(), 0);
}

#[tokio::test]
async fn test_rejected_credential_scenario() {
    let orch = session(vec![MockReply::fail(
        400,
        "API key not valid. Please pass a valid API key.",
    )]);

    orch.submit("Top Fintech angel investors in Mumbai").await;

    assert_eq!(orch.error_status(), ErrorStatus::KeyInvalid);
    let last = orch.turns().last().cloned().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, CONNECTION_APOLOGY);
}

#[tokio::test]
async fn test_duplicate_citations_are_collapsed() {
    let orch = session(vec![MockReply::answer(
        "answer",
        vec![
            Source::new("X", "a"),
            Source::new("Y", "b"),
            Source::new("Z", "a"),
        ],
    )]);

    orch.submit("q").await;

    let sources = orch.turns()[1].sources().to_vec();
    assert_eq!(sources.len(), 2);
    let uris: Vec<&str> = sources.iter().map(|s| s.uri.as_str()).collect();
    assert_eq!(uris, vec!["a", "b"]);
    assert_eq!(sources[0].title, "Z");
}

#[tokio::test]
async fn test_every_send_appends_exactly_two_turns() {
    let orch = session(vec![
        MockReply::answer("one", vec![]),
        MockReply::fail(502, "bad gateway"),
        MockReply::answer("three", vec![]),
    ]);

    for (i, query) in ["a", "b", "c"].into_iter().enumerate() {
        orch.submit(query).await;
        assert_eq!(orch.turn_count(), (i + 1) * 2);
        assert_eq!(orch.phase(), Phase::Idle);
    }

    let roles: Vec<Role> = orch.turns().iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
        ]
    );
}

#[tokio::test]
async fn test_reset_then_continue() {
    let orch = session(vec![]);
    orch.set_language(Language::Telugu);
    orch.submit("first").await;
    orch.reset();

    assert_eq!(orch.turn_count(), 0);
    orch.submit("again").await;

    let requests = orch.gateway().transport().requests();
    assert_eq!(requests[1].contents.len(), 1);
    assert!(requests[1].system_instruction.contains("Telugu"));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_submit_while_sending_is_ignored() {
    let orch = gated_session();

    let first = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.submit("first").await })
    };
    orch.gateway().transport().entered.notified().await;

    assert_eq!(orch.phase(), Phase::Sending);
    assert_eq!(
        orch.submit("second").await,
        SubmitOutcome::Ignored(IgnoredReason::Busy)
    );
    assert_eq!(orch.turn_count(), 1);

    orch.gateway().transport().release.notify_one();
    assert_eq!(first.await.unwrap(), SubmitOutcome::Answered);
    assert_eq!(orch.turn_count(), 2);
    assert_eq!(orch.turns()[1].content, "late answer");
    assert_eq!(orch.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_reset_during_send_drops_reply() {
    let orch = gated_session();

    let first = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.submit("first").await })
    };
    orch.gateway().transport().entered.notified().await;

    orch.reset();
    orch.gateway().transport().release.notify_one();

    assert_eq!(first.await.unwrap(), SubmitOutcome::Discarded);
    assert_eq!(orch.turn_count(), 0);
    assert_eq!(orch.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_voice_transcript_lands_in_input_while_sending() {
    let orch = gated_session();

    let first = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.submit("first").await })
    };
    orch.gateway().transport().entered.notified().await;

    let voice = VoiceInterface::new(FixedSpeech("Startup India tax exemptions"));
    orch.capture_voice(&voice).await.unwrap();
    assert_eq!(orch.input(), "Startup India tax exemptions");

    orch.gateway().transport().release.notify_one();
    first.await.unwrap();
    assert_eq!(orch.input(), "Startup India tax exemptions");
}
