// Persistent conversation history


use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Keep only user and assistant turns with content, then the last
/// `max_pairs` question/answer pairs.
#[inline]
pub fn recent_turns(turns: &[ChatTurn], max_pairs: usize) -> Vec<ChatTurn> {
    let conversational: Vec<&ChatTurn> = turns
        .iter()
        .filter(|turn| matches!(turn.role, Role::User | Role::Assistant))
        .filter(|turn| !turn.content.trim().is_empty())
        .collect();

    let keep = max_pairs.saturating_mul(2);
    let skip = conversational.len().saturating_sub(keep);
    conversational.into_iter().skip(skip).cloned().collect()
}

/// Conversation history backed by a JSON file, rewritten on every save
#[derive(Debug, Clone)]
pub struct ChatHistory {
    path: PathBuf,
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    /// Read the history at `path`. A missing or unreadable file yields an
    /// empty history.
    #[inline]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let turns = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<ChatTurn>>(&content) {
                Ok(turns) => turns,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        reason = %e,
                        "Ignoring unreadable chat history"
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    reason = %e,
                    "Failed to read chat history"
                );
                Vec::new()
            }
        };

        debug!("Loaded {} chat turns from {}", turns.len(), path.display());
        Self { path, turns }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// Append a question and its answer.
    #[inline]
    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(ChatTurn::user(question));
        self.turns.push(ChatTurn::assistant(answer));
    }

    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[inline]
    pub fn recent(&self, max_pairs: usize) -> Vec<ChatTurn> {
        recent_turns(&self.turns, max_pairs)
    }

    /// Write the full history, creating the parent directory if needed.
    #[inline]
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.turns)
            .map_err(|e| anyhow::anyhow!("Failed to serialize chat history: {}", e))?;
        fs::write(&self.path, content)?;
        debug!(
            "Saved {} chat turns to {}",
            self.turns.len(),
            self.path.display()
        );
        Ok(())
    }
}
