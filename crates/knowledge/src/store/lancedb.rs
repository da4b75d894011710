//! LanceDB-backed vector store.
//!
//! Each collection is one table with columns `id`, `question`, `answer`,
//! `source_index`, `vector` and `payload` (JSON text of source and metadata).

use super::{cosine_similarity, rank_points, VectorStore};
use crate::types::{Point, PointPayload, QuestionMetadata, ScoredPoint};
use aptwise_core::{AppError, AppResult};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Extra payload fields kept as JSON so the table schema stays fixed.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredExtras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default)]
    metadata: QuestionMetadata,
}

/// Persistent vector store on a local LanceDB database directory.
pub struct LanceDbStore {
    conn: Connection,
    path: PathBuf,
    /// Serializes upserts made through this store.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for LanceDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceDbStore").field("path", &self.path).finish()
    }
}

fn unavailable(action: &str, e: impl std::fmt::Display) -> AppError {
    AppError::IndexUnavailable(format!("{}: {}", action, e))
}

/// A stored row that cannot be decoded is an index fault, not caller input.
fn malformed(what: impl std::fmt::Display) -> AppError {
    AppError::IndexUnavailable(format!("Malformed row in index: {}", what))
}

impl LanceDbStore {
    /// Open (or create) the database directory at `db_path`.
    pub async fn connect(db_path: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(db_path).map_err(|e| {
            unavailable(&format!("Failed to create index directory {:?}", db_path), e)
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| unavailable("Failed to connect to LanceDB", e))?;

        debug!("Connected to LanceDB at {:?}", db_path);

        Ok(Self {
            conn,
            path: db_path.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn create_schema(dimensions: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("question", DataType::Utf8, false),
            Field::new("answer", DataType::Utf8, false),
            Field::new("source_index", DataType::UInt64, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimensions as i32,
                ),
                false,
            ),
            Field::new("payload", DataType::Utf8, false),
        ]))
    }

    async fn open(&self, name: &str) -> AppResult<Option<Table>> {
        if !self.collection_exists(name).await? {
            return Ok(None);
        }

        let table = self
            .conn
            .open_table(name)
            .execute()
            .await
            .map_err(|e| unavailable(&format!("Failed to open table '{}'", name), e))?;
        Ok(Some(table))
    }

    async fn open_existing(&self, name: &str) -> AppResult<Table> {
        self.open(name).await?.ok_or_else(|| {
            AppError::IndexUnavailable(format!("collection '{}' does not exist", name))
        })
    }

    /// Vector size declared by the table schema.
    async fn table_dimensions(table: &Table) -> AppResult<usize> {
        let schema = table
            .schema()
            .await
            .map_err(|e| unavailable("Failed to read table schema", e))?;

        match schema.field_with_name("vector").map(|f| f.data_type().clone()) {
            Ok(DataType::FixedSizeList(_, size)) => Ok(size as usize),
            _ => Err(AppError::IndexUnavailable(
                "Table has no fixed-size vector column".to_string(),
            )),
        }
    }

    fn points_to_batch(points: &[Point], dimensions: usize) -> AppResult<RecordBatch> {
        let schema = Self::create_schema(dimensions);

        let mut flat = Vec::with_capacity(points.len() * dimensions);
        let mut payloads = Vec::with_capacity(points.len());
        for point in points {
            flat.extend_from_slice(&point.vector);
            payloads.push(serde_json::to_string(&StoredExtras {
                source: point.payload.source.clone(),
                metadata: point.payload.metadata.clone(),
            })?);
        }

        let ids = StringArray::from_iter_values(points.iter().map(|p| p.id.as_str()));
        let questions =
            StringArray::from_iter_values(points.iter().map(|p| p.payload.question.as_str()));
        let answers =
            StringArray::from_iter_values(points.iter().map(|p| p.payload.answer.as_str()));
        let source_indexes =
            UInt64Array::from_iter_values(points.iter().map(|p| p.payload.source_index));
        let vectors = FixedSizeListArray::new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            dimensions as i32,
            Arc::new(Float32Array::from(flat)),
            None,
        );
        let payload_array = StringArray::from_iter_values(payloads.iter().map(String::as_str));

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(ids),
                Arc::new(questions),
                Arc::new(answers),
                Arc::new(source_indexes),
                Arc::new(vectors),
                Arc::new(payload_array),
            ],
        )
        .map_err(|e| AppError::Other(format!("Failed to create RecordBatch: {}", e)))
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| malformed(format!("invalid {} column", name)))
    }

    fn batch_to_scored(batch: &RecordBatch, query: &[f32]) -> AppResult<Vec<ScoredPoint>> {
        let ids = Self::string_column(batch, "id")?;
        let questions = Self::string_column(batch, "question")?;
        let answers = Self::string_column(batch, "answer")?;
        let payloads = Self::string_column(batch, "payload")?;
        let source_indexes = batch
            .column_by_name("source_index")
            .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
            .ok_or_else(|| malformed("invalid source_index column"))?;
        let vectors = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| malformed("invalid vector column"))?;

        let mut scored = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let values = vectors.value(row);
            let values = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| malformed("invalid vector values"))?;
            let vector: Vec<f32> = values.values().to_vec();

            let extras: StoredExtras = serde_json::from_str(payloads.value(row))
                .map_err(|e| malformed(format!("payload of '{}': {}", ids.value(row), e)))?;

            scored.push(ScoredPoint {
                id: ids.value(row).to_string(),
                score: cosine_similarity(query, &vector),
                payload: PointPayload {
                    question: questions.value(row).to_string(),
                    answer: answers.value(row).to_string(),
                    source_index: source_indexes.value(row),
                    source: extras.source,
                    metadata: extras.metadata,
                },
            });
        }

        Ok(scored)
    }
}

#[async_trait]
impl VectorStore for LanceDbStore {
    fn backend_name(&self) -> &str {
        "lancedb"
    }

    async fn collection_exists(&self, name: &str) -> AppResult<bool> {
        let table_names = self
            .conn
            .table_names()
            .execute()
            .await
            .map_err(|e| unavailable("Failed to list tables", e))?;

        Ok(table_names.iter().any(|t| t == name))
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> AppResult<()> {
        if self.collection_exists(name).await? {
            return Ok(());
        }

        let schema = Self::create_schema(dimensions);
        let empty_batch = RecordBatch::new_empty(schema.clone());

        self.conn
            .create_table(name, RecordBatchIterator::new(vec![Ok(empty_batch)], schema))
            .execute()
            .await
            .map_err(|e| unavailable(&format!("Failed to create table '{}'", name), e))?;

        info!("Created LanceDB table '{}' ({} dimensions)", name, dimensions);
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> AppResult<()> {
        let Some(table) = self.open(name).await? else {
            return Ok(());
        };

        // Rows are removed instead of dropping the table; the empty table is
        // recreated as-is by the next create_collection.
        table
            .delete("id IS NOT NULL")
            .await
            .map_err(|e| unavailable(&format!("Failed to clear table '{}'", name), e))?;

        info!("Cleared LanceDB table '{}'", name);
        Ok(())
    }

    async fn count(&self, name: &str) -> AppResult<Option<u64>> {
        let Some(table) = self.open(name).await? else {
            return Ok(None);
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| unavailable("Failed to count rows", e))?;
        Ok(Some(count as u64))
    }

    #[instrument(skip(self, points), fields(points = points.len()))]
    async fn upsert(&self, name: &str, points: &[Point]) -> AppResult<()> {
        if points.is_empty() {
            return Ok(());
        }

        let table = self.open_existing(name).await?;
        let dimensions = Self::table_dimensions(&table).await?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != dimensions) {
            return Err(AppError::InvalidInput(format!(
                "point '{}' has {} dimensions, collection '{}' expects {}",
                bad.id,
                bad.vector.len(),
                name,
                dimensions
            )));
        }

        let batch = Self::points_to_batch(points, dimensions)?;
        let schema = batch.schema();

        // One commit: matching ids are replaced, new ids appended.
        let _guard = self.write_lock.lock().await;
        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
            .await
            .map_err(|e| unavailable("Failed to upsert points", e))?;

        debug!("Upserted {} points into LanceDB table '{}'", points.len(), name);
        Ok(())
    }

    #[instrument(skip(self, vector), fields(dims = vector.len()))]
    async fn search(&self, name: &str, vector: &[f32], top_k: usize) -> AppResult<Vec<ScoredPoint>> {
        let table = self.open_existing(name).await?;

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| unavailable("Failed to count rows", e))?;
        if rows == 0 {
            return Ok(Vec::new());
        }

        let batches: Vec<RecordBatch> = table
            .query()
            .nearest_to(vector.to_vec())
            .map_err(|e| AppError::InvalidInput(format!("Failed to create query: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| unavailable("Failed to execute search", e))?
            .try_collect()
            .await
            .map_err(|e| unavailable("Failed to collect results", e))?;

        let mut scored = Vec::new();
        for batch in &batches {
            scored.extend(Self::batch_to_scored(batch, vector)?);
        }

        debug!("Retrieved {} rows (requested top-{})", scored.len(), top_k);
        Ok(rank_points(scored, top_k))
    }
}
