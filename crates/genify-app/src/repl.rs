//! Interactive terminal session.
//!
//! A line starting with `/` is a command; any other non-blank line is a
//! query. The edit line is the session's input buffer: `/hint` and `/voice`
//! fill it without sending, and the next prompt opens pre-filled with it.

use std::borrow::Cow::{self, Borrowed, Owned};

use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use genify_chat::{
    ChatError, ChatOrchestrator, InsightTransport, SpeechCapture, SubmitOutcome, VoiceInterface,
};
use genify_core::Language;

use crate::render;

const COMMANDS: [&str; 9] = [
    "/help", "/history", "/hint", "/lang", "/langs", "/quit", "/reset", "/voice", "/exit",
];

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    History,
    Reset,
    Languages,
    Language(String),
    Voice,
    Hint(usize),
    /// Send this text, as typed, as the next query.
    Submit(String),
    /// Blank line; nothing to send.
    Empty,
    Unknown(String),
}

/// Parse one raw input line.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Submit(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        "history" => Command::History,
        "reset" => Command::Reset,
        "langs" => Command::Languages,
        "lang" if arg.is_empty() => Command::Languages,
        "lang" => Command::Language(arg.to_string()),
        "voice" => Command::Voice,
        "hint" => match arg.parse::<usize>() {
            Ok(n) if (1..=render::STARTER_PROMPTS.len()).contains(&n) => Command::Hint(n),
            _ => Command::Unknown(trimmed.to_string()),
        },
        _ => Command::Unknown(trimmed.to_string()),
    }
}

// =============================================================================
// Line editor helper
// =============================================================================

/// Completes slash commands and language names.
struct CommandHelper;

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if let Some(partial) = line.strip_prefix("/lang ") {
            let partial = partial.to_lowercase();
            let candidates = Language::ALL
                .iter()
                .map(|lang| lang.directive_name())
                .filter(|name| name.to_lowercase().starts_with(&partial))
                .map(|name| Pair {
                    display: name.to_string(),
                    replacement: name.to_string(),
                })
                .collect();
            return Ok(("/lang ".len(), candidates));
        }

        if line.starts_with('/') {
            let candidates = COMMANDS
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.to_string(),
                    replacement: cmd.to_string(),
                })
                .collect();
            return Ok((0, candidates));
        }

        Ok((0, Vec::new()))
    }
}

impl Highlighter for CommandHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CommandHelper {
    type Hint = String;
}

impl Validator for CommandHelper {}

// =============================================================================
// Session loop
// =============================================================================

/// Whether the loop keeps reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run the interactive loop until `/quit` or end of input.
pub async fn run<T, S>(
    orchestrator: &ChatOrchestrator<T>,
    voice: &VoiceInterface<S>,
) -> rustyline::Result<()>
where
    T: InsightTransport,
    S: SpeechCapture,
{
    let mut rl = Editor::new()?;
    rl.set_helper(Some(CommandHelper));

    println!("{}", render::welcome());

    loop {
        let prompt = render::prompt(orchestrator.language(), voice.is_listening());
        let readline = rl.readline_with_initial(&prompt, (&orchestrator.input(), ""));

        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "Interrupted. Type /quit to exit.".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e),
        };
        if !line.trim().is_empty() {
            let _ = rl.add_history_entry(line.as_str());
        }

        if handle_line(orchestrator, voice, &line).await == Flow::Quit {
            break;
        }
    }

    println!("{}", "Goodbye!".bright_green());
    Ok(())
}

/// Apply one edited line to the session.
///
/// The line replaces the input buffer before anything else happens, so
/// text erased in the editor is never sent.
pub async fn handle_line<T, S>(
    orchestrator: &ChatOrchestrator<T>,
    voice: &VoiceInterface<S>,
    line: &str,
) -> Flow
where
    T: InsightTransport,
    S: SpeechCapture,
{
    let command = parse_command(line);
    match command {
        Command::Submit(_) => orchestrator.set_input(line),
        _ => orchestrator.set_input(""),
    }

    match command {
        Command::Quit => return Flow::Quit,
        Command::Empty => {}
        Command::Help => println!("{}", render::welcome()),
        Command::History => {
            let turns = orchestrator.turns();
            if turns.is_empty() {
                println!("{}", "No conversation yet.".dimmed());
            }
            for turn in &turns {
                println!("{}", render::render_turn(turn));
            }
        }
        Command::Reset => {
            orchestrator.reset();
            println!("{}", "Conversation cleared.".green());
            println!("{}", render::welcome());
        }
        Command::Languages => print!("{}", render::languages(orchestrator.language())),
        Command::Language(name) => match name.parse::<Language>() {
            Ok(lang) => {
                orchestrator.set_language(lang);
                println!("{} {}", "Response language:".green(), lang.label());
            }
            Err(e) => println!("{}", e.to_string().yellow()),
        },
        Command::Voice => match orchestrator.capture_voice(voice).await {
            Ok(()) => {}
            Err(ChatError::VoiceUnavailable) => {
                println!("{}", "Voice recognition is not supported on this host.".yellow())
            }
            Err(e) => println!("{}", e.to_string().yellow()),
        },
        Command::Hint(n) => {
            if let Some(prompt) = render::STARTER_PROMPTS.get(n - 1) {
                orchestrator.set_input(*prompt);
            }
        }
        Command::Submit(_) => send(orchestrator).await,
        Command::Unknown(raw) => {
            println!("{} {}", "Unknown command:".yellow(), raw);
        }
    }
    Flow::Continue
}

async fn send<T: InsightTransport>(orchestrator: &ChatOrchestrator<T>) {
    println!("{}", "Synthesizing insights...".dimmed());
    match orchestrator.submit_input().await {
        SubmitOutcome::Answered | SubmitOutcome::Failed(_) => {
            if let Some(turn) = orchestrator.turns().last() {
                println!("{}", render::render_turn(turn));
            }
            if let Some(banner) = render::banner(orchestrator.error_status()) {
                println!("{banner}\n");
            }
        }
        SubmitOutcome::Discarded | SubmitOutcome::Ignored(_) => {}
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use genify_chat::{
        Credential, InsightRequestBuilder, MockTransport, ProviderGateway, UnsupportedSpeech,
    };

    fn session() -> ChatOrchestrator<MockTransport> {
        let gateway = ProviderGateway::new(MockTransport::new(), Credential::new("AIzaSy-repl-key"));
        ChatOrchestrator::new(gateway, InsightRequestBuilder::default())
    }

    fn no_voice() -> VoiceInterface<UnsupportedSpeech> {
        VoiceInterface::new(UnsupportedSpeech)
    }

    // ---- Queries ----

    #[test]
    fn test_plain_text_is_submitted_as_typed() {
        assert_eq!(
            parse_command("  Startup India tax exemptions  "),
            Command::Submit("  Startup India tax exemptions  ".to_string())
        );
    }

    #[test]
    fn test_blank_line_is_empty() {
        assert_eq!(parse_command(""), Command::Empty);
        assert_eq!(parse_command("   \t"), Command::Empty);
    }

    // ---- Commands ----

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command("/reset"), Command::Reset);
        assert_eq!(parse_command("/voice"), Command::Voice);
        assert_eq!(parse_command("/help"), Command::Help);
        assert_eq!(parse_command("/history"), Command::History);
        assert_eq!(parse_command("/langs"), Command::Languages);
    }

    #[test]
    fn test_lang_with_and_without_argument() {
        assert_eq!(parse_command("/lang"), Command::Languages);
        assert_eq!(
            parse_command("/lang  Kannada "),
            Command::Language("Kannada".to_string())
        );
    }

    #[test]
    fn test_hint_range_is_checked() {
        assert_eq!(parse_command("/hint 1"), Command::Hint(1));
        assert_eq!(parse_command("/hint 4"), Command::Hint(4));
        assert_eq!(parse_command("/hint 0"), Command::Unknown("/hint 0".to_string()));
        assert_eq!(parse_command("/hint 5"), Command::Unknown("/hint 5".to_string()));
        assert_eq!(parse_command("/hint x"), Command::Unknown("/hint x".to_string()));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse_command("/fund"), Command::Unknown("/fund".to_string()));
    }

    // ---- Line handling ----

    #[tokio::test]
    async fn test_erased_hint_is_not_sent() {
        colored::control::set_override(false);
        let orch = session();
        let voice = no_voice();

        handle_line(&orch, &voice, "/hint 1").await;
        assert_eq!(orch.input(), "Active SaaS VCs in India 2024");

        // The editor opened pre-filled; the user cleared it and pressed Enter.
        assert_eq!(handle_line(&orch, &voice, "").await, Flow::Continue);
        assert_eq!(orch.input(), "");
        assert_eq!(orch.turn_count(), 0);
        assert_eq!(orch.gateway().transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_submitted_hint_is_sent_once() {
        colored::control::set_override(false);
        let orch = session();
        let voice = no_voice();

        handle_line(&orch, &voice, "/hint 3").await;
        handle_line(&orch, &voice, "Startup India tax exemptions").await;

        assert_eq!(orch.turn_count(), 2);
        assert_eq!(orch.turns()[0].content, "Startup India tax exemptions");
        assert_eq!(orch.input(), "");
    }

    #[tokio::test]
    async fn test_query_is_recorded_raw() {
        colored::control::set_override(false);
        let orch = session();

        handle_line(&orch, &no_voice(), "  Latest funding rounds in Bengaluru ").await;

        assert_eq!(orch.turns()[0].content, "  Latest funding rounds in Bengaluru ");
    }

    #[tokio::test]
    async fn test_command_clears_stale_input() {
        colored::control::set_override(false);
        let orch = session();
        let voice = no_voice();

        handle_line(&orch, &voice, "/hint 2").await;
        handle_line(&orch, &voice, "/lang Tamil").await;

        assert_eq!(orch.language(), Language::Tamil);
        assert_eq!(orch.input(), "");
    }

    #[tokio::test]
    async fn test_quit_stops_the_loop() {
        let orch = session();
        assert_eq!(handle_line(&orch, &no_voice(), "/quit").await, Flow::Quit);
    }

    // ---- Completion ----

    #[test]
    fn test_completes_commands_and_languages() {
        let history = rustyline::history::DefaultHistory::new();
        let ctx = Context::new(&history);

        let (start, pairs) = CommandHelper.complete("/la", 3, &ctx).unwrap();
        assert_eq!(start, 0);
        let names: Vec<&str> = pairs.iter().map(|p| p.replacement.as_str()).collect();
        assert_eq!(names, vec!["/lang", "/langs"]);

        let (start, pairs) = CommandHelper.complete("/lang ma", 8, &ctx).unwrap();
        assert_eq!(start, 6);
        let names: Vec<&str> = pairs.iter().map(|p| p.replacement.as_str()).collect();
        assert_eq!(names, vec!["Marathi", "Malayalam"]);
    }
}
