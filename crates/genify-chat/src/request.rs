//! Insight request construction.
//!
//! Turns the current query, the selected language and the prior transcript
//! into the provider-ready [`InsightRequest`]. Pure: the transcript is only
//! read.

use serde::{Deserialize, Serialize};

use genify_core::{Language, Role, Turn};

/// Sampling temperature used unless configuration overrides it.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Speaker role in the provider's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    User,
    Model,
}

impl From<Role> for ProviderRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ProviderRole::User,
            Role::Assistant => ProviderRole::Model,
        }
    }
}

/// One text-only content entry of the outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: ProviderRole,
    pub text: String,
}

/// Everything the gateway needs to make one provider call, minus the model
/// identifier and credential which the gateway owns.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightRequest {
    pub system_instruction: String,
    pub contents: Vec<Content>,
    pub temperature: f32,
    /// Enable the provider's live web-search grounding tool.
    pub web_search: bool,
}

impl InsightRequest {
    /// The active user entry, i.e. the last content.
    pub fn active_query(&self) -> Option<&str> {
        self.contents.last().map(|c| c.text.as_str())
    }
}

/// Builds [`InsightRequest`]s with a fixed sampling temperature.
#[derive(Debug, Clone)]
pub struct InsightRequestBuilder {
    temperature: f32,
}

impl Default for InsightRequestBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPERATURE)
    }
}

impl InsightRequestBuilder {
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }

    /// Build the request for `query` given the transcript that precedes it.
    ///
    /// The caller is responsible for rejecting blank queries.
    pub fn build(&self, query: &str, language: Language, history: &[Turn]) -> InsightRequest {
        let directive = language.directive_name();

        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| Content {
                role: turn.role.into(),
                text: turn.content.clone(),
            })
            .collect();
        contents.push(Content {
            role: ProviderRole::User,
            text: format!("Selected Response Language: {directive}. Query: {query}"),
        });

        InsightRequest {
            system_instruction: system_instruction(directive),
            contents,
            temperature: self.temperature,
            web_search: true,
        }
    }
}

/// System-level instruction declaring persona, language, formatting and
/// grounding rules for the given directive language.
pub fn system_instruction(directive: &str) -> String {
    format!(
        "You are Genify, an elite AI Startup Funding Intelligence expert for the Indian ecosystem.

CORE MISSION:
Provide accurate, real-time data on VCs, funding rounds, angel networks, and government startup policies (Startup India, MSME, etc.).

CRITICAL LANGUAGE RULE:
- You MUST respond ENTIRELY in the following language: {directive}.
- Even if technical terms are used, the explanation and surrounding text must be in {directive}.
- If the user provides a prompt in another language, you still MUST respond in {directive} as requested by their session setting.

FORMATTING RULES:
1. Use professional, clean Markdown.
2. Use bullet points for lists of investors or steps.
3. Use bolding for key figures (e.g., funding amounts, dates).
4. Use headers (##) to separate sections of a long answer.
5. Always ensure the answer is directly relevant to the startup ecosystem.

GROUNDING:
- Use the Google Search tool for every query to get the latest data.
- Refer to credible sources like Inc42, YourStory, Entrackr, or official government portals."
    )
}
