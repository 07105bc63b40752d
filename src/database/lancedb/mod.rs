// LanceDB vector database module
// Handles vector storage and similarity search for document fragments


pub mod vector_store;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::documents::Fragment;
use crate::embeddings::Embedding;

/// Prefix of the fragment tables. Every rebuild writes a new generation
/// `fragments_<n>`; the highest `n` is the current index.
pub const TABLE_PREFIX: &str = "fragments_";

/// Name of the table holding generation `generation`
#[inline]
pub fn table_name(generation: u64) -> String {
    format!("{}{:020}", TABLE_PREFIX, generation)
}

/// Generation encoded in a fragment table name
#[inline]
pub fn table_generation(name: &str) -> Option<u64> {
    name.strip_prefix(TABLE_PREFIX)?.parse().ok()
}

/// Fragment row stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentRecord {
    /// Unique identifier for this row
    pub id: String,
    pub vector: Vec<f32>,
    /// The fragment text
    pub content: String,
    /// Path of the originating document
    pub source: String,
    /// 1-based PDF page, if any
    pub page: Option<u32>,
    pub chunk_index: u32,
    /// Whether `vector` is a degraded all-zero placeholder
    pub placeholder: bool,
    /// RFC 3339 timestamp of indexing
    pub created_at: String,
}

impl FragmentRecord {
    #[inline]
    pub fn new(fragment: &Fragment, embedding: Embedding, created_at: &str) -> Self {
        let placeholder = embedding.is_placeholder();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector: embedding.into_values(),
            content: fragment.text.clone(),
            source: fragment.source.display().to_string(),
            page: fragment.page,
            chunk_index: u32::try_from(fragment.chunk_index).unwrap_or(u32::MAX),
            placeholder,
            created_at: created_at.to_string(),
        }
    }

    #[inline]
    pub fn to_fragment(&self) -> Fragment {
        Fragment {
            text: self.content.clone(),
            source: PathBuf::from(&self.source),
            page: self.page,
            chunk_index: self.chunk_index as usize,
        }
    }
}
