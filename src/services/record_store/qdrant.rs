//! Qdrant record store backend.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, PointsIdsList, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder, value::Kind, vectors_output,
};

use super::{RecordStore, StoreInfo, validate_search_params};
use crate::error::StoreError;
use crate::models::{NewRecord, SearchHit, StoreConfig, StoredRecord, empty_meta};

/// Qdrant backend. Hits come back ordered by the engine's cosine score;
/// ties follow the engine's internal point order.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantBackend {
    pub fn new(config: &StoreConfig, dimension: usize) -> Result<Self, StoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension,
        })
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

    fn reference_filter(reference_id: &str) -> Filter {
        Filter::must([Condition::matches(
            "reference_id",
            reference_id.to_string(),
        )])
    }

    fn payload_str(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> String {
        payload
            .get(key)
            .and_then(|v| match &v.kind {
                Some(Kind::StringValue(s)) => Some(s.as_str()),
                _ => None,
            })
            .unwrap_or("")
            .to_string()
    }

    fn point_id_str(id: &Option<PointId>) -> String {
        match id {
            Some(id) => match &id.point_id_options {
                Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid)) => uuid.clone(),
                Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(num)) => num.to_string(),
                None => String::new(),
            },
            None => String::new(),
        }
    }
}

#[async_trait]
impl RecordStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, StoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| StoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_ready(&self) -> Result<(), StoreError> {
        if self.info().await?.is_some() {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| StoreError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn info(&self) -> Result<Option<StoreInfo>, StoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(Some(StoreInfo {
                record_count: info.result.map_or(0, |r| r.points_count.unwrap_or(0)),
            })),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(None)
                } else {
                    Err(StoreError::CollectionError(msg))
                }
            }
        }
    }

    async fn insert(&self, record: NewRecord) -> Result<String, StoreError> {
        self.check_dimension(record.embedding.len())?;

        let id = uuid::Uuid::new_v4().to_string();

        let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
        payload.insert("content".to_string(), record.text.into());
        payload.insert("reference_id".to_string(), record.reference_id.into());
        if let Some(language) = record.language {
            payload.insert("language".to_string(), language.into());
        }
        // Arbitrary metadata travels as a JSON string payload field.
        let meta = serde_json::to_string(&record.meta)
            .map_err(|e| StoreError::InsertError(e.to_string()))?;
        payload.insert("meta".to_string(), meta.into());
        payload.insert(
            "created_at".to_string(),
            chrono::Utc::now().to_rfc3339().into(),
        );

        let point = PointStruct::new(id.clone(), record.embedding, payload);
        let upsert = UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| StoreError::InsertError(e.to_string()))?;

        Ok(id)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let delete = DeletePointsBuilder::new(&self.collection)
            .points(PointsIdsList {
                ids: vec![PointId::from(id.to_string())],
            })
            .wait(true);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| StoreError::DeleteError(e.to_string()))?;

        Ok(())
    }

    async fn delete_by_reference(&self, reference_id: &str) -> Result<u64, StoreError> {
        let filter = Self::reference_filter(reference_id);

        // Qdrant's delete does not report how many points matched.
        let count = self
            .client
            .count(
                CountPointsBuilder::new(&self.collection)
                    .filter(filter.clone())
                    .exact(true),
            )
            .await
            .map_err(|e| StoreError::DeleteError(e.to_string()))?
            .result
            .map_or(0, |r| r.count);

        if count == 0 {
            return Ok(0);
        }

        let delete = DeletePointsBuilder::new(&self.collection)
            .points(filter)
            .wait(true);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| StoreError::DeleteError(e.to_string()))?;

        Ok(count)
    }

    async fn list_by_reference(&self, reference_id: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let mut records = Vec::new();
        let mut offset: Option<PointId> = None;
        let page_size = 100u32;

        loop {
            let mut scroll_builder = ScrollPointsBuilder::new(&self.collection)
                .filter(Self::reference_filter(reference_id))
                .limit(page_size)
                .with_payload(true)
                .with_vectors(true);

            if let Some(off) = offset {
                scroll_builder = scroll_builder.offset(off);
            }

            let response = self
                .client
                .scroll(scroll_builder)
                .await
                .map_err(|e| StoreError::SearchError(e.to_string()))?;

            let points = response.result;
            if points.is_empty() {
                break;
            }

            for point in points {
                let embedding = point
                    .vectors
                    .and_then(|v| match v.vectors_options {
                        Some(vectors_output::VectorsOptions::Vector(vector)) => Some(vector.data),
                        _ => None,
                    })
                    .unwrap_or_default();

                let language = match Self::payload_str(&point.payload, "language") {
                    s if s.is_empty() => None,
                    s => Some(s),
                };
                let meta = serde_json::from_str(&Self::payload_str(&point.payload, "meta"))
                    .unwrap_or_else(|_| empty_meta());

                records.push(StoredRecord {
                    id: Self::point_id_str(&point.id),
                    text: Self::payload_str(&point.payload, "content"),
                    reference_id: Self::payload_str(&point.payload, "reference_id"),
                    embedding,
                    language,
                    meta,
                    created_at: Self::payload_str(&point.payload, "created_at"),
                });
            }

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn search(
        &self,
        query: &[f32],
        cutoff: f32,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        validate_search_params(cutoff, top_k)?;
        self.check_dimension(query.len())?;

        let search_builder =
            SearchPointsBuilder::new(&self.collection, query.to_vec(), top_k as u64)
                .with_payload(true)
                .score_threshold(cutoff);

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| StoreError::SearchError(e.to_string()))?;

        // The engine's threshold is inclusive; the contract wants strictly
        // above the cutoff.
        let hits = results
            .result
            .into_iter()
            .filter(|point| point.score > cutoff)
            .map(|point| SearchHit {
                id: Self::point_id_str(&point.id),
                text: Self::payload_str(&point.payload, "content"),
                reference_id: Self::payload_str(&point.payload, "reference_id"),
                score: point.score,
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
