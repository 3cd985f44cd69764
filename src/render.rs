//! Markdown-lite rendering for assistant replies.
//!
//! Recognises fenced code blocks plus `**bold**`, `*italic*` and `` `code` ``
//! spans. Everything else is passed through as plain text.

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```([a-zA-Z]*)\s*\n([\s\S]*?)\n```").expect("Invalid regex"));

static INLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|\*(.+?)\*|`(.+?)`").expect("Invalid regex"));

const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const CODE: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Plain(String),
    Bold(String),
    Italic(String),
    Code(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(Vec<Span>),
    Code { language: Option<String>, code: String },
}

pub fn parse_response(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in CODE_BLOCK.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        push_text(&mut segments, &text[last..whole.start()]);

        let language = caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        let code = caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string();
        segments.push(Segment::Code { language, code });

        last = whole.end();
    }
    push_text(&mut segments, &text[last..]);

    segments
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    segments.push(Segment::Text(parse_inline(text)));
}

pub fn parse_inline(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in INLINE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            spans.push(Span::Plain(text[last..whole.start()].to_string()));
        }

        let span = if let Some(m) = caps.get(1) {
            Span::Bold(m.as_str().to_string())
        } else if let Some(m) = caps.get(2) {
            Span::Italic(m.as_str().to_string())
        } else if let Some(m) = caps.get(3) {
            Span::Code(m.as_str().to_string())
        } else {
            Span::Plain(whole.as_str().to_string())
        };
        spans.push(span);

        last = whole.end();
    }

    if last < text.len() {
        spans.push(Span::Plain(text[last..].to_string()));
    }
    spans
}

/// Render segments with ANSI styling for a terminal.
pub fn to_terminal(segments: &[Segment]) -> String {
    let mut out = String::new();

    for segment in segments {
        match segment {
            Segment::Text(spans) => {
                for span in spans {
                    match span {
                        Span::Plain(s) => out.push_str(s),
                        Span::Bold(s) => out.push_str(&format!("{}{}{}", BOLD, s, RESET)),
                        Span::Italic(s) => out.push_str(&format!("{}{}{}", ITALIC, s, RESET)),
                        Span::Code(s) => out.push_str(&format!("{}{}{}", CODE, s, RESET)),
                    }
                }
            }
            Segment::Code { language, code } => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&format!("--- {} ---\n", language.as_deref().unwrap_or("code")));
                out.push_str(CODE);
                out.push_str(code);
                out.push_str(RESET);
                out.push_str("\n---\n");
            }
        }
    }

    out
}
