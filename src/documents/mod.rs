// Document loading
// Reads .txt and .pdf files from the documents folder and splits them into fragments


use anyhow::{Context, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{Config, OnError};
use crate::embeddings::chunking::split_documents;
use crate::{RagError, Result};

/// Raw text of one source file, or of one page of a PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub source: PathBuf,
    /// 1-based page number for PDF pages
    pub page: Option<u32>,
}

/// A bounded slice of a document used as the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub source: PathBuf,
    pub page: Option<u32>,
    /// Position of this fragment within its document
    pub chunk_index: usize,
}

impl Fragment {
    /// File name of the originating document
    #[inline]
    pub fn source_name(&self) -> String {
        self.source.file_name().map_or_else(
            || self.source.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    /// First `max_chars` characters of the text, with an ellipsis when cut.
    #[inline]
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("txt") {
            Some(Self::Text)
        } else if extension.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else {
            None
        }
    }
}

/// Load and chunk every supported document in the configured folder.
#[inline]
pub fn get_fragments(config: &Config) -> Result<Vec<Fragment>> {
    let documents_dir = config.documents_dir();
    let documents = load_documents(&documents_dir, config.ingestion.on_error)?;

    if documents.is_empty() {
        warn!(
            "No documents found to ingest in {}",
            documents_dir.display()
        );
        return Ok(Vec::new());
    }

    let fragments = split_documents(&documents, &config.chunking);
    info!(
        "Loaded {} docs → {} fragments",
        documents.len(),
        fragments.len()
    );
    Ok(fragments)
}

/// Read every `.txt` and `.pdf` file directly inside `dir`.
///
/// A missing folder is created so documents can be dropped into it later, and
/// yields no documents. Files that fail to load are skipped or abort the
/// whole load depending on `on_error`.
#[inline]
pub fn load_documents(dir: &Path, on_error: OnError) -> Result<Vec<Document>> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        info!("Created empty documents folder at {}", dir.display());
        return Ok(Vec::new());
    }

    let mut paths = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        let Some(kind) = DocumentKind::from_path(&path) else {
            debug!("Ignoring unsupported file {}", path.display());
            continue;
        };

        match load_file(&path, kind) {
            Ok(loaded) => {
                debug!("Loaded {} document(s) from {}", loaded.len(), path.display());
                documents.extend(loaded);
            }
            Err(e) => match on_error {
                OnError::Skip => {
                    warn!(path = %path.display(), error = %format!("{e:#}"), "Skipping unreadable document");
                }
                OnError::Abort => {
                    return Err(RagError::Ingestion(format!(
                        "Failed to load {}: {:#}",
                        path.display(),
                        e
                    )));
                }
            },
        }
    }

    Ok(documents)
}

fn load_file(path: &Path, kind: DocumentKind) -> anyhow::Result<Vec<Document>> {
    match kind {
        DocumentKind::Text => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file {}", path.display()))?;
            Ok(vec![Document {
                content,
                source: path.to_path_buf(),
                page: None,
            }])
        }
        DocumentKind::Pdf => {
            let bytes =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

            // pdf-extract panics on some malformed files
            let pages = std::panic::catch_unwind(|| {
                pdf_extract::extract_text_from_mem_by_pages(&bytes)
            })
            .map_err(|_| anyhow!("PDF parser panicked"))?
            .map_err(|e| anyhow!("PDF extraction failed: {}", e))?;

            Ok(pages
                .into_iter()
                .zip(1u32..)
                .filter(|(text, _)| !text.trim().is_empty())
                .map(|(content, page)| Document {
                    content,
                    source: path.to_path_buf(),
                    page: Some(page),
                })
                .collect())
        }
    }
}
