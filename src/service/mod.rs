// Session state for the assistant
// Owns the configuration, the remote clients and the swappable index handle


use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::assistant::history::ChatTurn;
use crate::assistant::{Answer, Assistant, ChatClient};
use crate::config::Config;
use crate::database::{IndexState, VectorIndex};
use crate::documents::get_fragments;
use crate::embeddings::EmbeddingClient;
use crate::{RagError, Result};

/// Progress of a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexEvent {
    /// Documents were loaded and split into this many fragments
    Chunked { fragments: usize },
    /// Another batch of this many fragments was embedded
    Embedded(usize),
}

/// Outcome of a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub fragments: usize,
    pub placeholders: usize,
}

/// Snapshot for the `status` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStatus {
    pub ready: bool,
    pub fragments: usize,
    pub placeholders: usize,
}

pub struct RagService {
    config: Config,
    embedder: EmbeddingClient,
    chat: ChatClient,
    index: RwLock<Option<Arc<VectorIndex>>>,
    /// Serialises rebuilds. Holds replaced handles until no query uses them.
    retired: Mutex<Vec<Arc<VectorIndex>>>,
}

impl RagService {
    /// Build the clients and open the existing index, if any.
    #[inline]
    pub async fn new(config: Config) -> Result<Self> {
        let embedder = EmbeddingClient::new(&config);
        let chat = ChatClient::new(&config)?;
        Self::with_clients(config, embedder, chat).await
    }

    /// Same as [`RagService::new`] with explicit clients.
    #[inline]
    pub async fn with_clients(
        config: Config,
        embedder: EmbeddingClient,
        chat: ChatClient,
    ) -> Result<Self> {
        let index = match VectorIndex::load(&config, embedder.clone()).await? {
            IndexState::Ready(index) => Some(Arc::new(index)),
            IndexState::Absent => {
                info!("No index found, run the index command to build one");
                None
            }
        };

        Ok(Self {
            config,
            embedder,
            chat,
            index: RwLock::new(index),
            retired: Mutex::new(Vec::new()),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub async fn is_ready(&self) -> bool {
        self.index.read().await.is_some()
    }

    /// Current index handle. It stays searchable after a rebuild swaps in a
    /// new one; its table is dropped once the last handle is gone.
    #[inline]
    pub async fn index(&self) -> Option<Arc<VectorIndex>> {
        self.index.read().await.clone()
    }

    /// Rebuild the index from the documents folder.
    #[inline]
    pub async fn reindex(&self) -> Result<IndexReport> {
        self.reindex_with_progress(|_| {}).await
    }

    /// Same as [`RagService::reindex`], reporting progress to `on_event`.
    #[inline]
    pub async fn reindex_with_progress<F>(&self, mut on_event: F) -> Result<IndexReport>
    where
        F: FnMut(IndexEvent),
    {
        let mut retired = self.retired.lock().await;

        let fragments = get_fragments(&self.config)?;
        on_event(IndexEvent::Chunked {
            fragments: fragments.len(),
        });

        let index = VectorIndex::create_with_progress(
            &self.config,
            &fragments,
            &self.embedder,
            |n| on_event(IndexEvent::Embedded(n)),
        )
        .await?;

        let report = IndexReport {
            fragments: index.count().await?,
            placeholders: index.placeholder_count().await?,
        };

        let current = Arc::new(index);
        let previous = self.index.write().await.replace(Arc::clone(&current));
        retired.extend(previous);
        info!(
            "Index rebuilt with {} fragments ({} placeholders)",
            report.fragments, report.placeholders
        );

        retired.retain(|index| Arc::strong_count(index) > 1);
        let mut keep: Vec<&str> = retired.iter().map(|index| index.table_name()).collect();
        keep.push(current.table_name());
        if let Err(e) = VectorIndex::prune_tables(&self.config, &keep).await {
            warn!(reason = %e, "Failed to drop stale index tables");
        }

        Ok(report)
    }

    /// Answer `query` using the current index.
    #[inline]
    pub async fn ask(&self, query: &str, history: &[ChatTurn]) -> Result<Answer> {
        let index = self.index().await.ok_or(RagError::NotInitialized)?;
        debug!("Answering query against {}", index.path().display());

        let assistant = Assistant::new(&self.config, index.as_ref(), &self.chat);
        Ok(assistant.answer(query, history).await)
    }

    #[inline]
    pub async fn status(&self) -> Result<IndexStatus> {
        match self.index().await {
            Some(index) => Ok(IndexStatus {
                ready: true,
                fragments: index.count().await?,
                placeholders: index.placeholder_count().await?,
            }),
            None => Ok(IndexStatus {
                ready: false,
                fragments: 0,
                placeholders: 0,
            }),
        }
    }
}
