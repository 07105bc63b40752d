// Database module
// Persistent vector storage for document fragments (LanceDB)

pub mod lancedb;

pub use self::lancedb::vector_store::{IndexState, ScoredFragment, VectorIndex};
