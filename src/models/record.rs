use serde::{Deserialize, Serialize};

/// A bounded substring of input text, produced by the chunker for
/// independent embedding. Transient: discarded once its record is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Zero-based position within the source text's chunk sequence.
    pub position: usize,
}

/// Insert payload for the record store. The store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub text: String,
    /// Caller-supplied grouping key; many records may share one.
    pub reference_id: String,
    pub embedding: Vec<f32>,
    pub language: Option<String>,
    /// Arbitrary key-value metadata carried alongside the record.
    #[serde(default = "empty_meta")]
    pub meta: serde_json::Value,
}

/// A persisted record as the store returns it. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub text: String,
    pub reference_id: String,
    pub embedding: Vec<f32>,
    pub language: Option<String>,
    pub meta: serde_json::Value,
    pub created_at: String,
}

/// Per-chunk ingestion result, in source-text order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedChunk {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Per-chunk result of a persistence-free encode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// One input item for bulk encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItem {
    pub id: String,
    pub text: String,
}

/// One chunk of a bulk-encoded item; `id` is inherited from the source item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEncodedChunk {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

pub fn empty_meta() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_meta_default() {
        let json = r#"{"text": "t", "reference_id": "r", "embedding": [0.0]}"#;
        let record: NewRecord = serde_json::from_str(json).unwrap();
        assert!(record.meta.is_object());
        assert!(record.language.is_none());
    }

    #[test]
    fn test_stored_record_roundtrip() {
        let record = StoredRecord {
            id: "a".to_string(),
            text: "hello".to_string(),
            reference_id: "doc-1".to_string(),
            embedding: vec![1.0, 0.0],
            language: Some("en".to_string()),
            meta: serde_json::json!({"k": "v"}),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: StoredRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.embedding, record.embedding);
    }
}
