use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GenifyError;

// =============================================================================
// Enums
// =============================================================================

/// Who authored a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Display language for assistant answers and speech capture.
///
/// The declaration order is the order shown in language pickers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Hindi,
    Tamil,
    Telugu,
    Bengali,
    Marathi,
    Gujarati,
    Kannada,
    Malayalam,
    Punjabi,
    #[default]
    English,
}

impl Language {
    /// Every supported language, in picker order.
    pub const ALL: [Language; 10] = [
        Language::Hindi,
        Language::Tamil,
        Language::Telugu,
        Language::Bengali,
        Language::Marathi,
        Language::Gujarati,
        Language::Kannada,
        Language::Malayalam,
        Language::Punjabi,
        Language::English,
    ];

    /// Human-readable label, with the native-script name in parentheses.
    pub fn label(&self) -> &'static str {
        match self {
            Language::Hindi => "Hindi (हिन्दी)",
            Language::Tamil => "Tamil (தமிழ்)",
            Language::Telugu => "Telugu (తెలుగు)",
            Language::Bengali => "Bengali (বাংলা)",
            Language::Marathi => "Marathi (मराठी)",
            Language::Gujarati => "Gujarati (ગુજરાતી)",
            Language::Kannada => "Kannada (ಕನ್ನಡ)",
            Language::Malayalam => "Malayalam (മലയാളം)",
            Language::Punjabi => "Punjabi (ਪੰਜਾਬੀ)",
            Language::English => "English",
        }
    }

    /// Language name embedded in outbound instructions: the first
    /// whitespace-delimited token of the label.
    pub fn directive_name(&self) -> &'static str {
        self.label()
            .split_whitespace()
            .next()
            .unwrap_or(self.label())
    }

    /// Locale tag handed to the speech recognizer.
    pub fn speech_locale(&self) -> &'static str {
        match self {
            Language::Hindi => "hi-IN",
            Language::Tamil => "ta-IN",
            Language::Telugu => "te-IN",
            Language::Bengali => "bn-IN",
            Language::Marathi => "mr-IN",
            Language::Gujarati => "gu-IN",
            Language::Kannada => "kn-IN",
            Language::Malayalam => "ml-IN",
            Language::Punjabi => "pa-IN",
            Language::English => "en-IN",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Language {
    type Err = GenifyError;

    /// Accepts either the full label or the directive name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Language::ALL
            .into_iter()
            .find(|lang| {
                lang.label() == wanted || lang.directive_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| GenifyError::UnknownLanguage(wanted.to_string()))
    }
}

/// Outcome of the most recent provider call, as shown in the error banner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
    #[default]
    None,
    KeyMissing,
    KeyInvalid,
    Generic,
}

impl ErrorStatus {
    /// Banner text naming the category with a remediation hint, or `None`
    /// when there is nothing to show.
    pub fn banner(&self) -> Option<&'static str> {
        match self {
            ErrorStatus::None => None,
            ErrorStatus::KeyMissing => {
                Some("API KEY NOT FOUND. PLEASE SET THE API_KEY ENVIRONMENT VARIABLE.")
            }
            ErrorStatus::KeyInvalid => {
                Some("INVALID API KEY. CHECK YOUR GOOGLE AI STUDIO CREDENTIALS.")
            }
            ErrorStatus::Generic => Some("CONNECTION ERROR. PLEASE TRY AGAIN."),
        }
    }
}

// =============================================================================
// Conversation records
// =============================================================================

/// A grounding citation attached to an assistant turn. Identity is `uri`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

impl Source {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }
}

/// One message in the conversation. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// A user-authored turn. User turns never carry sources.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
            created_at: Utc::now(),
        }
    }

    /// An assistant turn, optionally carrying grounding sources.
    pub fn assistant(content: impl Into<String>, sources: Option<Vec<Source>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
            created_at: Utc::now(),
        }
    }

    /// Sources as a slice, empty when none were attached.
    pub fn sources(&self) -> &[Source] {
        self.sources.as_deref().unwrap_or(&[])
    }
}

// =============================================================================
// Tests
// =============================================================================
