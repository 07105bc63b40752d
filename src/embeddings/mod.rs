// Embeddings module
// Splits documents into fragments and turns text into vectors via the hosted inference API

pub mod chunking;
pub mod inference;

pub use chunking::{ChunkingConfig, split_documents, split_text};
pub use inference::{DEFAULT_EMBEDDING_DIMENSION, Embedding, EmbeddingClient};
