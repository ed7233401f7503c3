//! Wire protocol for the daemon socket: 4-byte big-endian length prefix
//! followed by a JSON-encoded message.

use serde::{Deserialize, Serialize};

use crate::models::{BulkEncodedChunk, BulkItem, EncodedChunk, IngestedChunk, SearchHit};
use crate::services::MetricsSummary;
use crate::services::pipeline::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_CUTOFF, DEFAULT_TOP_K,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Shutdown,
    Status,
    Ingest(IngestRequest),
    Search(SearchRequest),
    Delete(DeleteRequest),
    DeleteByReference(DeleteByReferenceRequest),
    ListByReference(ListByReferenceRequest),
    Encode(EncodeRequest),
    EncodeQuery(EncodeQueryRequest),
    BulkEncode(BulkEncodeRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub text: String,
    pub reference_id: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "crate::models::empty_meta")]
    pub meta: serde_json::Value,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_cutoff")]
    pub cutoff: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteByReferenceRequest {
    pub reference_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListByReferenceRequest {
    pub reference_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeRequest {
    pub text: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeQueryRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEncodeRequest {
    pub items: Vec<BulkItem>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_cutoff() -> f32 {
    DEFAULT_CUTOFF
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    ShutdownAck,
    Status(StatusResponse),
    Ingested(IngestResponse),
    Results(SearchResponse),
    Deleted(DeleteResponse),
    Records(ListResponse),
    Encoded(EncodeResponse),
    QueryEmbedding(EncodeQueryResponse),
    BulkEncoded(BulkEncodeResponse),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub embedding_url: String,
    pub store_driver: String,
    pub collection: String,
    pub record_count: u64,
    pub idle_secs: u64,
    pub requests_served: u64,
    pub metrics: Option<MetricsSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub chunks: Vec<IngestedChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Records removed; absent for delete-by-id, which is a bare
    /// acknowledgment whether or not the id existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub records: Vec<crate::models::StoredRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeResponse {
    pub chunks: Vec<EncodedChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeQueryResponse {
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEncodeResponse {
    pub chunks: Vec<BulkEncodedChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(ErrorResponse {
            message: message.into(),
        })
    }
}

pub fn encode_message(msg: &impl Serialize) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(msg)?;
    let len = (json.len() as u32).to_be_bytes();
    let mut buf = Vec::with_capacity(4 + json.len());
    buf.extend_from_slice(&len);
    buf.extend_from_slice(&json);
    Ok(buf)
}

pub fn decode_length(buf: &[u8; 4]) -> usize {
    u32::from_be_bytes(*buf) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let request = Request::Search(SearchRequest {
            query: "find me".to_string(),
            language: None,
            cutoff: 0.3,
            top_k: 5,
        });

        let encoded = encode_message(&request).unwrap();
        let len = decode_length(&encoded[..4].try_into().unwrap());
        assert_eq!(len, encoded.len() - 4);

        let decoded: Request = serde_json::from_slice(&encoded[4..]).unwrap();
        match decoded {
            Request::Search(req) => {
                assert_eq!(req.query, "find me");
                assert_eq!(req.top_k, 5);
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_request_defaults() {
        let json = r#"{"type": "search", "query": "q"}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        match request {
            Request::Search(req) => {
                assert_eq!(req.cutoff, DEFAULT_CUTOFF);
                assert_eq!(req.top_k, DEFAULT_TOP_K);
                assert!(req.language.is_none());
            }
            other => panic!("unexpected request: {:?}", other),
        }

        let json = r#"{"type": "ingest", "text": "t", "reference_id": "r"}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        match request {
            Request::Ingest(req) => {
                assert_eq!(req.batch_size, DEFAULT_BATCH_SIZE);
                assert_eq!(req.chunk_size, DEFAULT_CHUNK_SIZE);
                assert!(req.meta.is_object());
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_delete_operations_have_distinct_tags() {
        let by_id = serde_json::to_value(Request::Delete(DeleteRequest {
            id: "x".to_string(),
        }))
        .unwrap();
        let by_reference =
            serde_json::to_value(Request::DeleteByReference(DeleteByReferenceRequest {
                reference_id: "r".to_string(),
            }))
            .unwrap();

        assert_eq!(by_id["type"], "delete");
        assert_eq!(by_reference["type"], "delete_by_reference");
    }
}
