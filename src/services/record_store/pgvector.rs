use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use super::{RecordStore, StoreInfo, validate_search_params};
use crate::error::StoreError;
use crate::models::{NewRecord, SearchHit, StoreConfig, StoredRecord};

/// PostgreSQL/pgvector backend.
///
/// Scoring happens in SQL as `1 - (embedding <=> $1)` with an HNSW cosine
/// index. Rows are ordered by distance; equal distances fall back to the
/// planner's scan order.
pub struct PgVectorBackend {
    pool: PgPool,
    table_name: String,
    collection: String,
    dimension: usize,
}

impl PgVectorBackend {
    pub async fn new(config: &StoreConfig, dimension: usize) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let backend = Self {
            pool,
            table_name: config.qualified_table_name(),
            collection: config.collection.clone(),
            dimension,
        };

        backend.check_pgvector_extension().await?;

        if let Some(ref schema) = config.schema {
            backend.ensure_schema(schema).await?;
        }

        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), StoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        if result.is_none() {
            return Err(StoreError::CollectionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    async fn ensure_schema(&self, schema: &str) -> Result<(), StoreError> {
        let query = format!("CREATE SCHEMA IF NOT EXISTS {}", schema);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::CollectionError(e.to_string()))?;
        Ok(())
    }

    fn check_dimension(&self, len: usize) -> Result<(), StoreError> {
        if len != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                got: len,
            });
        }
        Ok(())
    }

    fn record_from_row(row: &PgRow) -> StoredRecord {
        let embedding: Vector = row.get("embedding");
        let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");
        StoredRecord {
            id: row.get("id"),
            text: row.get("content"),
            reference_id: row.get("reference_id"),
            embedding: embedding.to_vec(),
            language: row.get("language"),
            meta: row.get("meta"),
            created_at: created_at.to_rfc3339(),
        }
    }
}

#[async_trait]
impl RecordStore for PgVectorBackend {
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| StoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_ready(&self) -> Result<(), StoreError> {
        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                reference_id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding vector({}) NOT NULL,
                language TEXT,
                meta JSONB NOT NULL DEFAULT '{{}}',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            self.table_name, self.dimension
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::CollectionError(e.to_string()))?;

        let indices = [
            format!(
                "CREATE INDEX IF NOT EXISTS {}_embedding_idx ON {} USING hnsw (embedding vector_cosine_ops)",
                self.collection, self.table_name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {}_reference_id_idx ON {} (reference_id)",
                self.collection, self.table_name
            ),
        ];

        for index_sql in &indices {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::CollectionError(e.to_string()))?;
        }

        Ok(())
    }

    async fn info(&self) -> Result<Option<StoreInfo>, StoreError> {
        let table_exists: Option<(String,)> = sqlx::query_as(
            "SELECT table_name FROM information_schema.tables WHERE table_name = $1",
        )
        .bind(&self.collection)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        if table_exists.is_none() {
            return Ok(None);
        }

        let query = format!("SELECT COUNT(*) FROM {}", self.table_name);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        Ok(Some(StoreInfo {
            record_count: row.0 as u64,
        }))
    }

    async fn insert(&self, record: NewRecord) -> Result<String, StoreError> {
        self.check_dimension(record.embedding.len())?;

        let id = uuid::Uuid::new_v4();
        let embedding = Vector::from(record.embedding);

        let query = format!(
            r#"
            INSERT INTO {} (id, reference_id, content, embedding, language, meta)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .bind(id)
            .bind(&record.reference_id)
            .bind(&record.text)
            .bind(&embedding)
            .bind(&record.language)
            .bind(&record.meta)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::InsertError(e.to_string()))?;

        Ok(id.to_string())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        // An id that is not a UUID cannot name a stored record; treat it
        // like any other absent id.
        let Ok(uuid) = uuid::Uuid::parse_str(id) else {
            return Ok(());
        };

        let query = format!("DELETE FROM {} WHERE id = $1", self.table_name);
        sqlx::query(&query)
            .bind(uuid)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::DeleteError(e.to_string()))?;

        Ok(())
    }

    async fn delete_by_reference(&self, reference_id: &str) -> Result<u64, StoreError> {
        let query = format!("DELETE FROM {} WHERE reference_id = $1", self.table_name);
        let result = sqlx::query(&query)
            .bind(reference_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::DeleteError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn list_by_reference(&self, reference_id: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let query = format!(
            r#"
            SELECT id::text as id, reference_id, content, embedding, language, meta, created_at
            FROM {}
            WHERE reference_id = $1
            ORDER BY created_at
            "#,
            self.table_name
        );

        let rows = sqlx::query(&query)
            .bind(reference_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::SearchError(e.to_string()))?;

        Ok(rows.iter().map(Self::record_from_row).collect())
    }

    async fn search(
        &self,
        query: &[f32],
        cutoff: f32,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        validate_search_params(cutoff, top_k)?;
        self.check_dimension(query.len())?;

        let embedding = Vector::from(query.to_vec());

        let sql = format!(
            r#"
            SELECT
                id::text as id,
                content,
                reference_id,
                1 - (embedding <=> $1) as score
            FROM {}
            WHERE (1 - (embedding <=> $1)) > $2
            ORDER BY embedding <=> $1
            LIMIT {}
            "#,
            self.table_name, top_k
        );

        let rows = sqlx::query(&sql)
            .bind(&embedding)
            .bind(f64::from(cutoff))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::SearchError(e.to_string()))?;

        let hits = rows
            .into_iter()
            .map(|row: PgRow| {
                let score: f64 = row.get("score");
                SearchHit {
                    id: row.get("id"),
                    text: row.get("content"),
                    reference_id: row.get("reference_id"),
                    score: score as f32,
                }
            })
            .collect();

        Ok(hits)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
