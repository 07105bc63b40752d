
use super::{FragmentRecord, table_generation};
use crate::config::Config;
use crate::documents::Fragment;
use crate::embeddings::{Embedding, EmbeddingClient};
use crate::{RagError, Result};
use arrow::array::{
    Array, BooleanArray, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A fragment returned by similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    /// L2 distance to the query vector, smaller is closer
    pub distance: f32,
    /// The stored vector is a degraded placeholder
    pub placeholder: bool,
}

/// Result of opening the on-disk index
pub enum IndexState {
    Ready(VectorIndex),
    /// Nothing has been indexed yet
    Absent,
}

impl IndexState {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Persistent nearest-neighbour index over document fragments.
///
/// Each handle reads one table generation. Rebuilds write a new generation,
/// so an open handle stays searchable until its table is pruned.
pub struct VectorIndex {
    path: PathBuf,
    table_name: String,
    table: Table,
    embedder: EmbeddingClient,
    dimension: usize,
}

impl VectorIndex {
    /// Embed `fragments` and write them as the newest index generation.
    /// Older generations are left in place, see [`VectorIndex::prune_tables`].
    #[inline]
    pub async fn create(
        config: &Config,
        fragments: &[Fragment],
        embedder: &EmbeddingClient,
    ) -> Result<Self> {
        Self::create_with_progress(config, fragments, embedder, |_| {}).await
    }

    /// Same as [`VectorIndex::create`], calling `on_batch` with the number of
    /// fragments embedded after every embedding batch.
    #[inline]
    pub async fn create_with_progress<F>(
        config: &Config,
        fragments: &[Fragment],
        embedder: &EmbeddingClient,
        mut on_batch: F,
    ) -> Result<Self>
    where
        F: FnMut(usize),
    {
        let path = config.index_dir();
        std::fs::create_dir_all(&path).map_err(|e| {
            RagError::Database(format!("Failed to create index directory: {}", e))
        })?;
        let connection = connect(&path).await?;
        let generation = fragment_tables(&connection)
            .await?
            .last()
            .map_or(0, |(generation, _)| generation + 1);
        let table_name = super::table_name(generation);

        let dimension = embedder.dimension();
        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();

        info!(
            "Embedding {} fragments with {}",
            texts.len(),
            embedder.model()
        );
        let mut embeddings: Vec<Embedding> = Vec::with_capacity(texts.len());
        for batch in texts.chunks(embedder.batch_size()) {
            embeddings.extend(embedder.embed(batch));
            on_batch(batch.len());
        }

        let placeholders = embeddings.iter().filter(|e| e.is_placeholder()).count();
        if placeholders > 0 {
            warn!(
                degraded = placeholders,
                total = embeddings.len(),
                "Index contains placeholder vectors, search results may be unreliable"
            );
        }

        let created_at = chrono::Utc::now().to_rfc3339();
        let records: Vec<FragmentRecord> = fragments
            .iter()
            .zip(embeddings)
            .map(|(fragment, embedding)| FragmentRecord::new(fragment, embedding, &created_at))
            .collect();

        let schema = create_schema(dimension)?;
        let table = if records.is_empty() {
            connection
                .create_empty_table(&table_name, schema)
                .execute()
                .await
                .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?
        } else {
            let record_batch = create_record_batch(&records, dimension)?;
            let batch_schema = record_batch.schema();
            let reader =
                RecordBatchIterator::new(std::iter::once(Ok(record_batch)), batch_schema);
            connection
                .create_table(&table_name, reader)
                .execute()
                .await
                .map_err(|e| RagError::Database(format!("Failed to write index: {}", e)))?
        };

        info!(
            "Indexed {} fragments ({} placeholder vectors) into {} at {}",
            records.len(),
            placeholders,
            table_name,
            path.display()
        );

        Ok(Self {
            path,
            table_name,
            table,
            embedder: embedder.clone(),
            dimension,
        })
    }

    /// Open the index written by a previous [`VectorIndex::create`].
    ///
    /// Opens the newest generation. Never creates files. A missing directory
    /// or table is [`IndexState::Absent`].
    #[inline]
    pub async fn load(config: &Config, embedder: EmbeddingClient) -> Result<IndexState> {
        let path = config.index_dir();
        if !path.is_dir() {
            debug!("No index directory at {}", path.display());
            return Ok(IndexState::Absent);
        }

        let connection = connect(&path).await?;
        let Some((_, table_name)) = fragment_tables(&connection).await?.pop() else {
            debug!("Index directory {} has no fragment table", path.display());
            return Ok(IndexState::Absent);
        };

        let table = connection
            .open_table(&table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open index: {}", e)))?;

        let dimension = detect_vector_dimension(&table).await?;
        if dimension != embedder.dimension() {
            return Err(RagError::Database(format!(
                "Index holds {}-dimensional vectors but the embedding model produces {}; rebuild the index",
                dimension,
                embedder.dimension()
            )));
        }

        info!("Loaded index {} from {}", table_name, path.display());
        Ok(IndexState::Ready(Self {
            path,
            table_name,
            table,
            embedder,
            dimension,
        }))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Generation table this handle reads
    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Fragment tables on disk, oldest first
    #[inline]
    pub async fn table_names(config: &Config) -> Result<Vec<String>> {
        let path = config.index_dir();
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let connection = connect(&path).await?;
        Ok(fragment_tables(&connection)
            .await?
            .into_iter()
            .map(|(_, name)| name)
            .collect())
    }

    /// Drop every fragment table not named in `keep`. Returns how many were
    /// dropped.
    #[inline]
    pub async fn prune_tables(config: &Config, keep: &[&str]) -> Result<usize> {
        let path = config.index_dir();
        if !path.is_dir() {
            return Ok(0);
        }
        let connection = connect(&path).await?;

        let mut dropped = 0;
        for (_, name) in fragment_tables(&connection).await? {
            if keep.contains(&name.as_str()) {
                continue;
            }
            debug!("Dropping stale fragment table {}", name);
            connection
                .drop_table(&name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table {}: {}", name, e)))?;
            dropped += 1;
        }

        if dropped > 0 {
            info!("Dropped {} stale fragment tables", dropped);
        }
        Ok(dropped)
    }

    /// Return the `k` fragments nearest to `query`, closest first.
    #[inline]
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredFragment>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_one(query);
        if embedding.is_placeholder() {
            warn!(
                degraded = 1,
                reason = "query embedding unavailable",
                "Searching with a placeholder query vector"
            );
        }

        debug!("Searching for {} nearest fragments", k);
        let results = self
            .table
            .vector_search(embedding.values())
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut scored = parse_search_results_stream(results).await?;
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }

    /// Number of fragments in the index
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Number of fragments stored with placeholder vectors
    #[inline]
    pub async fn placeholder_count(&self) -> Result<usize> {
        self.table
            .count_rows(Some("placeholder = true".to_string()))
            .await
            .map_err(|e| RagError::Database(format!("Failed to count placeholder rows: {}", e)))
    }
}

async fn connect(path: &Path) -> Result<Connection> {
    let uri = path.display().to_string();
    debug!("Connecting to LanceDB at {}", uri);
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))
}

/// Fragment tables with their generation, oldest first
async fn fragment_tables(connection: &Connection) -> Result<Vec<(u64, String)>> {
    let table_names = connection
        .table_names()
        .execute()
        .await
        .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

    let mut tables: Vec<(u64, String)> = table_names
        .into_iter()
        .filter_map(|name| table_generation(&name).map(|generation| (generation, name)))
        .collect();
    tables.sort_unstable();
    Ok(tables)
}

async fn detect_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

    let field = schema
        .field_with_name("vector")
        .map_err(|_| RagError::Database("Index has no vector column".to_string()))?;
    match field.data_type() {
        DataType::FixedSizeList(_, size) => usize::try_from(*size)
            .map_err(|_| RagError::Database(format!("Invalid vector dimension {}", size))),
        other => Err(RagError::Database(format!(
            "Unexpected vector column type {}",
            other
        ))),
    }
}

fn list_size(dimension: usize) -> Result<i32> {
    i32::try_from(dimension)
        .map_err(|_| RagError::Database(format!("Vector dimension {} is too large", dimension)))
}

fn create_schema(dimension: usize) -> Result<Arc<Schema>> {
    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                list_size(dimension)?,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, true),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("placeholder", DataType::Boolean, false),
        Field::new("created_at", DataType::Utf8, false),
    ])))
}

fn create_record_batch(records: &[FragmentRecord], dimension: usize) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * dimension);
    let mut contents = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut pages = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut placeholders = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);

    for record in records {
        if record.vector.len() != dimension {
            return Err(RagError::Database(format!(
                "Vector of dimension {} does not fit index dimension {}",
                record.vector.len(),
                dimension
            )));
        }
        ids.push(record.id.as_str());
        flat_values.extend_from_slice(&record.vector);
        contents.push(record.content.as_str());
        sources.push(record.source.as_str());
        pages.push(record.page);
        chunk_indices.push(record.chunk_index);
        placeholders.push(record.placeholder);
        created_ats.push(record.created_at.as_str());
    }

    let schema = create_schema(dimension)?;

    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array =
        FixedSizeListArray::try_new(field, list_size(dimension)?, Arc::new(values_array), None)
            .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(sources)),
        Arc::new(UInt32Array::from(pages)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(BooleanArray::from(placeholders)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

async fn parse_search_results_stream(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<ScoredFragment>> {
    let mut scored = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
    {
        scored.extend(parse_search_batch(&batch)?);
    }

    debug!("Parsed {} search results", scored.len());
    Ok(scored)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredFragment>> {
    let contents = column::<StringArray>(batch, "content")?;
    let sources = column::<StringArray>(batch, "source")?;
    let pages = column::<UInt32Array>(batch, "page")?;
    let chunk_indices = column::<UInt32Array>(batch, "chunk_index")?;
    let placeholders = column::<BooleanArray>(batch, "placeholder")?;
    let distances = column::<Float32Array>(batch, "_distance").ok();

    let scored = (0..batch.num_rows())
        .map(|row| ScoredFragment {
            fragment: Fragment {
                text: contents.value(row).to_string(),
                source: PathBuf::from(sources.value(row)),
                page: (!pages.is_null(row)).then(|| pages.value(row)),
                chunk_index: chunk_indices.value(row) as usize,
            },
            distance: distances
                .filter(|d| !d.is_null(row))
                .map_or(0.0, |d| d.value(row)),
            placeholder: placeholders.value(row),
        })
        .collect();

    Ok(scored)
}
