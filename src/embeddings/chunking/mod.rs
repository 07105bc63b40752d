
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::documents::{Document, Fragment};

/// Configuration for splitting documents into fragments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum fragment length in characters
    pub chunk_size: usize,
    /// Characters carried over from the end of one fragment into the next
    pub chunk_overlap: usize,
    /// Boundaries tried in order, largest first. The empty string splits
    /// between characters.
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

/// Split every document into fragments, numbering fragments per document.
#[inline]
pub fn split_documents(documents: &[Document], config: &ChunkingConfig) -> Vec<Fragment> {
    let mut fragments = Vec::new();

    for document in documents {
        let pieces = split_text(&document.content, config);
        debug!(
            "Split {} (page {:?}) into {} fragments",
            document.source.display(),
            document.page,
            pieces.len()
        );

        fragments.extend(
            pieces
                .into_iter()
                .enumerate()
                .map(|(chunk_index, text)| Fragment {
                    text,
                    source: document.source.clone(),
                    page: document.page,
                    chunk_index,
                }),
        );
    }

    fragments
}

/// Split text into chunks of at most `chunk_size` characters, preferring the
/// largest separator that occurs in the text.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    Splitter { config }.split(text, &config.separators)
}

struct Splitter<'a> {
    config: &'a ChunkingConfig,
}

impl Splitter<'_> {
    fn split(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();

        // Falls back to character splitting when no listed separator occurs
        let mut separator = "";
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = separators.get(i + 1..).unwrap_or_default();
                break;
            }
        }

        let mut short_pieces = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size {
                short_pieces.push(piece);
                continue;
            }

            if !short_pieces.is_empty() {
                chunks.extend(self.merge(&short_pieces));
                short_pieces.clear();
            }

            if separator.is_empty() {
                // A single character with chunk_size == 1
                if !piece.trim().is_empty() {
                    chunks.push(piece);
                }
            } else {
                chunks.extend(self.split(&piece, remaining));
            }
        }

        if !short_pieces.is_empty() {
            chunks.extend(self.merge(&short_pieces));
        }

        chunks
    }

    /// Greedily pack pieces into chunks, keeping up to `chunk_overlap`
    /// trailing characters of each chunk as the start of the next.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > chunk_size && !window.is_empty() {
                if let Some(chunk) = join_window(&window) {
                    merged.push(chunk);
                }

                while total > overlap || (total + len > chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            merged.push(chunk);
        }

        merged
    }
}

/// Split on `separator`, keeping it at the end of each piece so sentence
/// punctuation stays with its sentence.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    text.split_inclusive(separator)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}
