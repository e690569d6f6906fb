//! Qdrant REST adapter.
//!
//! Uses Qdrant's server-side text inference: points are upserted with
//! `{"text", "model"}` document vectors and queries send the query text the
//! same way, so embedding happens inside the cluster and the pipeline never
//! sees a vector. The collection is created lazily on first use.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

use crate::types::PipelineError;

use super::{FieldFilter, IndexedFile, StoreHit, StoredRecord, VectorStore};

/// Payload key under which the raw document text is stored, so query hits
/// can return it without a separate lookup.
const DOCUMENT_PAYLOAD_KEY: &str = "document";

const SCROLL_PAGE_SIZE: usize = 100;

/// Connection settings for a Qdrant cluster.
#[derive(Clone, Debug)]
pub struct QdrantConfig {
    pub url: Url,
    pub collection: String,
    /// Embedding model served by the cluster's inference layer.
    pub model: String,
    /// Vector width of `model`; used when creating the collection.
    pub vector_size: usize,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl QdrantConfig {
    pub fn new(url: Url, collection: impl Into<String>) -> Self {
        Self {
            url,
            collection: collection.into(),
            model: "sentence-transformers/all-minilm-l6-v2".to_string(),
            vector_size: 384,
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Reads `QDRANT_URL` (default `http://localhost:6333`),
    /// `QDRANT_COLLECTION` (default `docsmith_docs`), and optional
    /// `QDRANT_API_KEY` / `QDRANT_MODEL`.
    pub fn from_env() -> Result<Self, PipelineError> {
        let url = std::env::var("QDRANT_URL")
            .unwrap_or_else(|_| "http://localhost:6333".to_string());
        let url = Url::parse(&url)
            .map_err(|err| PipelineError::Store(format!("invalid QDRANT_URL: {err}")))?;
        let collection =
            std::env::var("QDRANT_COLLECTION").unwrap_or_else(|_| "docsmith_docs".to_string());
        let mut config = Self::new(url, collection);
        if let Ok(key) = std::env::var("QDRANT_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("QDRANT_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>, vector_size: usize) -> Self {
        self.model = model.into();
        self.vector_size = vector_size;
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Vector store backed by a Qdrant collection.
pub struct QdrantStore {
    client: Client,
    config: QdrantConfig,
    ensured: OnceCell<()>,
}

impl QdrantStore {
    pub fn new(config: QdrantConfig) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|err| PipelineError::Store(format!("invalid api key: {err}")))?;
            headers.insert("api-key", value);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            config,
            ensured: OnceCell::new(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    fn collection_url(&self, suffix: &str) -> Result<Url, PipelineError> {
        let path = format!("collections/{}{suffix}", self.config.collection);
        self.config
            .url
            .join(&path)
            .map_err(|err| PipelineError::Store(err.to_string()))
    }

    async fn create_collection_if_missing(&self) -> Result<(), PipelineError> {
        let url = self.collection_url("")?;
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::OK => {
                debug!(collection = %self.config.collection, "collection already exists");
                return Ok(());
            }
            StatusCode::NOT_FOUND => {}
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(PipelineError::Store(format!(
                    "collection lookup returned {status}: {body}"
                )));
            }
        }

        let body = json!({
            "vectors": {
                "size": self.config.vector_size,
                "distance": "Cosine",
            }
        });
        let response = self.client.put(url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Store(format!(
                "creating collection failed with {status}: {body}"
            )));
        }
        info!(collection = %self.config.collection, "created qdrant collection");
        Ok(())
    }

    fn inference_document(&self, text: &str) -> Value {
        json!({
            "text": text,
            "model": &self.config.model,
        })
    }

    fn build_filter(filter: &FieldFilter) -> Value {
        json!({
            "must": [{
                "key": &filter.field,
                "match": { "any": &filter.any_of },
            }]
        })
    }

    fn hit_from_point(point: ScoredPoint) -> Option<StoreHit> {
        let mut payload = point.payload?;
        let document = payload
            .remove(DOCUMENT_PAYLOAD_KEY)
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        let metadata = match serde_json::from_value(Value::Object(payload)) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(error = %err, "dropping hit with undecodable payload");
                return None;
            }
        };
        Some(StoreHit {
            document,
            metadata,
            score: point.score.unwrap_or(1.0),
        })
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self) -> Result<(), PipelineError> {
        self.ensured
            .get_or_try_init(|| self.create_collection_if_missing())
            .await?;
        Ok(())
    }

    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<(), PipelineError> {
        if records.is_empty() {
            return Ok(());
        }
        self.ensure_collection().await?;

        let mut points = Vec::with_capacity(records.len());
        for record in &records {
            let mut payload = match serde_json::to_value(&record.metadata)? {
                Value::Object(map) => map,
                other => {
                    return Err(PipelineError::Store(format!(
                        "metadata serialized to non-object payload: {other}"
                    )))
                }
            };
            payload.insert(
                DOCUMENT_PAYLOAD_KEY.to_string(),
                Value::String(record.document_text.clone()),
            );
            points.push(json!({
                "id": record.id,
                "vector": self.inference_document(&record.document_text),
                "payload": payload,
            }));
        }

        let mut url = self.collection_url("/points")?;
        url.set_query(Some("wait=true"));
        let response = self
            .client
            .put(url)
            .json(&json!({ "points": points }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Store(format!(
                "upsert failed with {status}: {body}"
            )));
        }
        info!(
            collection = %self.config.collection,
            points = records.len(),
            "upserted points"
        );
        Ok(())
    }

    async fn query(
        &self,
        query_text: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<StoreHit>, PipelineError> {
        self.ensure_collection().await?;

        let mut body = json!({
            "query": self.inference_document(query_text),
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = Self::build_filter(filter);
        }

        let url = self.collection_url("/points/query")?;
        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Store(format!(
                "query failed with {status}: {body}"
            )));
        }
        let reply: QueryResponse = response.json().await?;
        let hits: Vec<StoreHit> = reply
            .result
            .points
            .into_iter()
            .filter_map(Self::hit_from_point)
            .collect();
        debug!(hits = hits.len(), "qdrant query returned");
        Ok(hits)
    }

    async fn list_files(&self) -> Result<Vec<IndexedFile>, PipelineError> {
        self.ensure_collection().await?;

        let url = self.collection_url("/points/scroll")?;
        let mut files: Vec<IndexedFile> = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE_SIZE,
                "with_payload": true,
                "with_vector": false,
            });
            if let Some(offset) = &offset {
                body["offset"] = offset.clone();
            }

            let response = self.client.post(url.clone()).json(&body).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(PipelineError::Store(format!(
                    "scroll failed with {status}: {body}"
                )));
            }
            let reply: ScrollResponse = response.json().await?;

            for point in reply.result.points {
                let Some(payload) = point.payload else { continue };
                let file_id = payload
                    .get("file_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if file_id.is_empty() || files.iter().any(|f| f.file_id == file_id) {
                    continue;
                }
                let filename = payload
                    .get("filename")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                files.push(IndexedFile {
                    file_id: file_id.to_string(),
                    filename: filename.to_string(),
                });
            }

            match reply.result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }
        Ok(files)
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    payload: Option<serde_json::Map<String, Value>>,
}

#[derive(Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Deserialize)]
struct ScrollResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkMetadata;
    use crate::stores::RecordMetadata;
    use httpmock::prelude::*;

    fn store_for(server: &MockServer) -> QdrantStore {
        let config = QdrantConfig::new(Url::parse(&server.base_url()).unwrap(), "test_docs");
        QdrantStore::new(config).unwrap()
    }

    fn sample_record() -> StoredRecord {
        StoredRecord {
            id: "11111111-1111-1111-1111-111111111111".into(),
            document_text: "Context: facts\n\nContent: body".into(),
            metadata: RecordMetadata {
                chunk: ChunkMetadata {
                    section_name: "Sec".into(),
                    filename: "doc.md".into(),
                    page_number: 1,
                    page_numbers: vec![1],
                    ..Default::default()
                },
                job_id: "job-1".into(),
                file_id: "job-1_doc.md".into(),
                keywords: vec!["facts".into()],
            },
        }
    }

    #[tokio::test]
    async fn upsert_creates_collection_lazily() {
        let server = MockServer::start();
        let lookup = server.mock(|when, then| {
            when.method(GET).path("/collections/test_docs");
            then.status(404);
        });
        let create = server.mock(|when, then| {
            when.method(PUT).path("/collections/test_docs");
            then.status(200).json_body(serde_json::json!({"result": true}));
        });
        let upsert = server.mock(|when, then| {
            when.method(PUT)
                .path("/collections/test_docs/points")
                .query_param("wait", "true")
                .json_body_partial(
                    r#"{"points": [{"id": "11111111-1111-1111-1111-111111111111"}]}"#,
                );
            then.status(200).json_body(serde_json::json!({"result": {"status": "ok"}}));
        });

        let store = store_for(&server);
        store.upsert(vec![sample_record()]).await.unwrap();
        // Further calls must not re-check the collection.
        store.ensure_collection().await.unwrap();

        lookup.assert_hits(1);
        create.assert_hits(1);
        upsert.assert_hits(1);
    }

    #[tokio::test]
    async fn query_decodes_hits_and_sends_filter() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/collections/test_docs");
            then.status(200).json_body(serde_json::json!({"result": {}}));
        });

        let payload = {
            let record = sample_record();
            let mut value = serde_json::to_value(&record.metadata).unwrap();
            value["document"] = serde_json::Value::String(record.document_text.clone());
            value
        };
        let query = server.mock(|when, then| {
            when.method(POST)
                .path("/collections/test_docs/points/query")
                .json_body_partial(
                    r#"{"filter": {"must": [{"key": "file_id", "match": {"any": ["job-1_doc.md"]}}]}}"#,
                );
            then.status(200).json_body(serde_json::json!({
                "result": {"points": [
                    {"id": "x", "score": 0.87, "payload": payload}
                ]}
            }));
        });

        let store = store_for(&server);
        let filter = FieldFilter::any_of("file_id", vec!["job-1_doc.md".into()]);
        let hits = store.query("facts", Some(&filter), 6).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.file_id, "job-1_doc.md");
        assert_eq!(hits[0].document, "Context: facts\n\nContent: body");
        assert!((hits[0].score - 0.87).abs() < 1e-6);
        query.assert();
    }

    #[tokio::test]
    async fn list_files_follows_scroll_pages() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/collections/test_docs");
            then.status(200).json_body(serde_json::json!({"result": {}}));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/collections/test_docs/points/scroll")
                .json_body_partial(r#"{"offset": "page-2"}"#);
            then.status(200).json_body(serde_json::json!({
                "result": {
                    "points": [
                        {"payload": {"file_id": "job-1_b.md", "filename": "b.md"}}
                    ],
                    "next_page_offset": null
                }
            }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/collections/test_docs/points/scroll");
            then.status(200).json_body(serde_json::json!({
                "result": {
                    "points": [
                        {"payload": {"file_id": "job-1_a.md", "filename": "a.md"}},
                        {"payload": {"file_id": "job-1_a.md", "filename": "a.md"}}
                    ],
                    "next_page_offset": "page-2"
                }
            }));
        });

        let store = store_for(&server);
        let files = store.list_files().await.unwrap();
        assert_eq!(
            files,
            vec![
                IndexedFile { file_id: "job-1_a.md".into(), filename: "a.md".into() },
                IndexedFile { file_id: "job-1_b.md".into(), filename: "b.md".into() },
            ]
        );
    }

    #[tokio::test]
    async fn upsert_failure_reports_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/collections/test_docs");
            then.status(200).json_body(serde_json::json!({"result": {}}));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/collections/test_docs/points");
            then.status(500).body("disk full");
        });

        let store = store_for(&server);
        let err = store.upsert(vec![sample_record()]).await.unwrap_err();
        match err {
            PipelineError::Store(message) => {
                assert!(message.contains("500"), "unexpected message: {message}");
            }
            other => panic!("expected store error, got {other:?}"),
        }
    }
}
