//! Terminal rendering of the transcript.
//!
//! Assistant turns are markdown and go through [`render_markdown`]; user
//! turns are printed verbatim and never interpreted as markup.

use colored::{ColoredString, Colorize};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use genify_core::{ErrorStatus, Language, Role, Source, Turn};

/// Starter prompts offered on an empty conversation.
pub const STARTER_PROMPTS: [&str; 4] = [
    "Active SaaS VCs in India 2024",
    "Latest funding rounds in Bengaluru",
    "Startup India tax exemptions",
    "Top Fintech angel investors in Mumbai",
];

/// Welcome screen shown while the transcript is empty.
pub fn welcome() -> String {
    let mut out = format!(
        "{}\n{}\n\n",
        "Genify Intelligence".bold(),
        "Real-time grounded insights into the Indian startup ecosystem, in your preferred language."
            .dimmed()
    );
    for (i, prompt) in STARTER_PROMPTS.iter().enumerate() {
        out.push_str(&format!("  {} {}\n", format!("/hint {}", i + 1).cyan(), prompt));
    }
    out.push_str(&format!(
        "\n{}\n",
        "Commands: /lang <name>, /langs, /voice, /history, /reset, /help, /quit".dimmed()
    ));
    out
}

/// Input prompt label for the active language.
pub fn prompt(language: Language, listening: bool) -> String {
    if listening {
        "Listening closely... ".to_string()
    } else {
        format!("Ask Genify in {}... > ", language.directive_name())
    }
}

/// Error banner for the current status, if any.
pub fn banner(status: ErrorStatus) -> Option<String> {
    status
        .banner()
        .map(|text| format!("{} {}", "!".red().bold(), text.red().bold()))
}

/// Language picker listing, marking the active one.
pub fn languages(active: Language) -> String {
    Language::ALL
        .iter()
        .map(|lang| {
            let marker = if *lang == active { "*" } else { " " };
            format!(" {marker} {}\n", lang.label())
        })
        .collect()
}

/// Render one turn with its speaker header and, for assistant turns, sources.
pub fn render_turn(turn: &Turn) -> String {
    match turn.role {
        Role::User => format!("{}\n{}\n", "DIRECT QUERY".dimmed().bold(), turn.content),
        Role::Assistant => {
            let mut out = format!(
                "{}\n{}\n",
                "GENIFY INTELLIGENCE".magenta().bold(),
                render_markdown(&turn.content)
            );
            if !turn.sources().is_empty() {
                out.push_str(&render_sources(turn.sources()));
            }
            out
        }
    }
}

fn render_sources(sources: &[Source]) -> String {
    let mut out = format!("\n{}\n", "── Grounding Sources ──".dimmed());
    for source in sources {
        out.push_str(&format!("  ↗ {} {}\n", source.title.bold(), source.uri.dimmed()));
    }
    out
}

/// Convert markdown to styled terminal text.
///
/// Tables, strikethrough and task lists are enabled.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut writer = TerminalWriter::default();
    for event in Parser::new_ext(markdown, options) {
        writer.handle(event);
    }
    writer.finish()
}

#[derive(Default)]
struct TerminalWriter {
    out: String,
    /// One entry per open list: the next ordinal for ordered lists.
    lists: Vec<Option<u64>>,
    strong: usize,
    emphasis: usize,
    strike: usize,
    heading: bool,
    code_block: bool,
    link: Option<String>,
    cell: usize,
}

impl TerminalWriter {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.code_block {
                    for line in text.lines() {
                        self.out.push_str("    ");
                        self.out.push_str(&line.yellow().to_string());
                        self.out.push('\n');
                    }
                } else {
                    let styled = self.style(&text);
                    self.out.push_str(&styled.to_string());
                }
            }
            Event::Code(code) => self.out.push_str(&code.yellow().to_string()),
            Event::Html(html) | Event::InlineHtml(html) => self.out.push_str(&html),
            Event::SoftBreak => self.out.push(' '),
            Event::HardBreak => self.out.push('\n'),
            Event::Rule => self.out.push_str(&format!("{}\n\n", "─".repeat(40).dimmed())),
            Event::TaskListMarker(done) => {
                self.out.push_str(if done { "[x] " } else { "[ ] " });
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { .. } => self.heading = true,
            Tag::List(first) => {
                if !self.lists.is_empty() && !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
                self.lists.push(first);
            }
            Tag::Item => {
                let depth = self.lists.len().saturating_sub(1);
                self.out.push_str(&"  ".repeat(depth + 1));
                match self.lists.last_mut() {
                    Some(Some(n)) => {
                        self.out.push_str(&format!("{n}. "));
                        *n += 1;
                    }
                    _ => self.out.push_str("• "),
                }
            }
            Tag::Strong => self.strong += 1,
            Tag::Emphasis => self.emphasis += 1,
            Tag::Strikethrough => self.strike += 1,
            Tag::Link { dest_url, .. } => self.link = Some(dest_url.to_string()),
            Tag::CodeBlock(kind) => {
                self.code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.out.push_str(&format!("    {}\n", lang.dimmed()));
                    }
                }
            }
            Tag::TableHead | Tag::TableRow => self.cell = 0,
            Tag::TableCell => {
                if self.cell > 0 {
                    self.out.push_str(" | ");
                }
                self.cell += 1;
            }
            Tag::BlockQuote(_) => self.out.push_str("  > "),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.heading = false;
                self.out.push_str("\n\n");
            }
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.out.push_str("\n\n");
                } else {
                    self.out.push('\n');
                }
            }
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.out.push('\n');
                }
            }
            TagEnd::Item => {
                if !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
            }
            TagEnd::Strong => self.strong = self.strong.saturating_sub(1),
            TagEnd::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            TagEnd::Strikethrough => self.strike = self.strike.saturating_sub(1),
            TagEnd::Link => {
                if let Some(url) = self.link.take() {
                    self.out.push_str(&format!(" ({})", url.dimmed()));
                }
            }
            TagEnd::CodeBlock => {
                self.code_block = false;
                self.out.push('\n');
            }
            TagEnd::TableHead => {
                self.out.push('\n');
                self.out.push_str(&format!("{}\n", "─".repeat(40).dimmed()));
            }
            TagEnd::TableRow => self.out.push('\n'),
            TagEnd::Table => self.out.push('\n'),
            _ => {}
        }
    }

    fn style(&self, text: &str) -> ColoredString {
        let mut styled = text.normal();
        if self.heading {
            styled = styled.bold().cyan();
        }
        if self.strong > 0 {
            styled = styled.bold();
        }
        if self.emphasis > 0 {
            styled = styled.italic();
        }
        if self.strike > 0 {
            styled = styled.strikethrough();
        }
        if self.link.is_some() {
            styled = styled.underline();
        }
        styled
    }

    fn finish(self) -> String {
        self.out.trim_end().to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
