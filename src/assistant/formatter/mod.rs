
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Returned whenever the model produced nothing usable
pub const FALLBACK_ANSWER: &str = "I don't know.";

/// Answers up to this many sentences and characters stay on one line
const SHORT_SENTENCES: usize = 2;
const SHORT_CHARS: usize = 240;
const SENTENCES_PER_PARAGRAPH: usize = 2;

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s+").expect("valid regex"));

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?<=[.!?])\s+").expect("valid regex"));

/// How model output is laid out for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStyle {
    /// Plain paragraphs; list markers are removed
    #[default]
    Prose,
    /// Lists and long answers rendered as `- ` bullets
    Bulleted,
}

/// Tidy raw model output for display. Pure and idempotent.
///
/// In prose, only text without line breaks is regrouped into two-sentence
/// paragraphs. Text that already has consecutive non-blank lines, such as a
/// list whose markers were removed, keeps its lines as they are.
#[inline]
pub fn format_answer(raw: &str, style: AnswerStyle) -> String {
    let lines = clean_lines(raw);
    if lines.is_empty() {
        return FALLBACK_ANSWER.to_string();
    }

    let has_list = lines.iter().any(|line| strip_marker(line).is_some());

    let formatted = match style {
        AnswerStyle::Prose => {
            let lines: Vec<String> = if has_list {
                lines
                    .iter()
                    .map(|line| strip_all_markers(line).to_string())
                    .collect()
            } else {
                lines
            };
            if has_line_breaks(&lines) {
                join_lines(lines.into_iter())
            } else {
                prose(&lines)
            }
        }
        AnswerStyle::Bulleted if has_list => join_lines(lines.iter().map(|line| {
            strip_marker(line).map_or_else(|| line.clone(), |item| format!("- {}", item))
        })),
        AnswerStyle::Bulleted => bulleted(&lines),
    };

    if formatted.trim().is_empty() {
        FALLBACK_ANSWER.to_string()
    } else {
        formatted
    }
}

/// Normalise line endings, trim every line, collapse blank-line runs and
/// drop leading and trailing blank lines. Blank lines are empty strings.
fn clean_lines(raw: &str) -> Vec<String> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<String> = Vec::new();
    for line in normalized.split('\n').map(str::trim) {
        if line.is_empty() && lines.last().is_none_or(String::is_empty) {
            continue;
        }
        lines.push(line.to_string());
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

/// Two consecutive non-blank lines
fn has_line_breaks(lines: &[String]) -> bool {
    lines
        .windows(2)
        .any(|pair| !pair[0].is_empty() && !pair[1].is_empty())
}

fn strip_marker(line: &str) -> Option<&str> {
    let marker = LIST_MARKER.find(line).ok().flatten()?;
    line.get(marker.end()..)
}

/// Strip markers until none is left, so `- 2) item` becomes `item`.
fn strip_all_markers(line: &str) -> &str {
    let mut rest = line;
    while let Some(stripped) = strip_marker(rest) {
        rest = stripped;
    }
    rest
}

/// Whether a line starting with `sentence` would read as a list item
fn starts_like_list_item(sentence: &str) -> bool {
    LIST_MARKER
        .is_match(&format!("{} ", sentence))
        .unwrap_or(false)
}

fn join_lines(lines: impl Iterator<Item = String>) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in lines {
        if line.is_empty() && out.last().is_none_or(String::is_empty) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(String::is_empty) {
        out.pop();
    }
    out.join("\n")
}

/// Split on whitespace that follows `.`, `!` or `?`.
fn sentences(lines: &[String]) -> Vec<String> {
    let text = lines
        .iter()
        .filter(|line| !line.is_empty())
        .flat_map(|line| line.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");

    let mut sentences = Vec::new();
    let mut start = 0;
    for found in SENTENCE_BREAK.find_iter(&text).flatten() {
        if let Some(sentence) = text.get(start..found.start()) {
            sentences.push(sentence);
        }
        start = found.end();
    }
    if let Some(rest) = text.get(start..) {
        sentences.push(rest);
    }

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_short(sentences: &[String]) -> bool {
    let chars = sentences.iter().map(|s| s.chars().count()).sum::<usize>()
        + sentences.len().saturating_sub(1);
    sentences.len() <= SHORT_SENTENCES && chars <= SHORT_CHARS
}

fn prose(lines: &[String]) -> String {
    let sentences = sentences(lines);
    if sentences.is_empty() {
        return FALLBACK_ANSWER.to_string();
    }
    if is_short(&sentences) {
        return sentences.join(" ");
    }

    // A paragraph never opens with something that looks like a list marker
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    for sentence in sentences.iter().map(String::as_str) {
        match paragraphs.last_mut() {
            Some(paragraph)
                if paragraph.len() < SENTENCES_PER_PARAGRAPH
                    || starts_like_list_item(sentence) =>
            {
                paragraph.push(sentence);
            }
            _ => paragraphs.push(vec![sentence]),
        }
    }

    paragraphs
        .iter()
        .map(|paragraph| paragraph.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn bulleted(lines: &[String]) -> String {
    let sentences = sentences(lines);
    if sentences.is_empty() {
        return FALLBACK_ANSWER.to_string();
    }
    if is_short(&sentences) {
        return sentences.join(" ");
    }

    sentences
        .iter()
        .map(|sentence| format!("- {}", sentence))
        .collect::<Vec<_>>()
        .join("\n")
}
