//! Vector store collaborators.
//!
//! The pipeline talks to an external vector database through the
//! [`VectorStore`] trait: the store embeds the supplied text itself, persists
//! the metadata payload verbatim, and answers text queries with scored hits.
//! Two implementations ship with the crate:
//!
//! - [`qdrant::QdrantStore`] — Qdrant over REST with server-side text
//!   inference, the production backend.
//! - [`memory::MemoryVectorStore`] — deterministic in-process store for
//!   tests and local development.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunking::ChunkMetadata;
use crate::types::PipelineError;

pub use memory::MemoryVectorStore;
pub use qdrant::{QdrantConfig, QdrantStore};

/// Chunk metadata as stored alongside the vector.
///
/// Flattens the canonical [`ChunkMetadata`] and adds the job labeling and
/// retrieval-time fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(flatten)]
    pub chunk: ChunkMetadata,
    pub job_id: String,
    /// Deterministic owning-file identity derived from `(job_id, filename)`.
    pub file_id: String,
    pub keywords: Vec<String>,
}

/// One record in the vector store. Created once at ingestion and never
/// mutated; reprocessing a file creates fresh records under new ids.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    /// The text that gets embedded: chunk content, optionally prefixed with
    /// its generated context.
    pub document_text: String,
    pub metadata: RecordMetadata,
}

/// A scored hit returned by a store query.
#[derive(Clone, Debug)]
pub struct StoreHit {
    pub document: String,
    pub metadata: RecordMetadata,
    pub score: f32,
}

/// Equality-membership filter: matches records whose `field` value equals
/// any of the given candidates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub any_of: Vec<String>,
}

impl FieldFilter {
    pub fn any_of(field: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            any_of: values,
        }
    }

    /// Whether a metadata value passes the filter.
    pub fn matches(&self, value: &str) -> bool {
        self.any_of.iter().any(|candidate| candidate == value)
    }
}

/// A distinct owning file present in the collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub file_id: String,
    pub filename: String,
}

/// Interface to the external vector database.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the backing collection if it does not exist yet. Called
    /// lazily by implementations on first use; safe to call repeatedly.
    async fn ensure_collection(&self) -> Result<(), PipelineError>;

    /// Embeds and persists a batch of records. The batch is all-or-nothing
    /// from the caller's point of view: on error the caller must treat every
    /// record as not stored.
    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<(), PipelineError>;

    /// Similarity query over the collection, optionally restricted by an
    /// equality-membership filter, returning up to `limit` scored hits.
    async fn query(
        &self,
        query_text: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<StoreHit>, PipelineError>;

    /// Enumerates the distinct owning files present in the collection.
    async fn list_files(&self) -> Result<Vec<IndexedFile>, PipelineError>;
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for &T {
    async fn ensure_collection(&self) -> Result<(), PipelineError> {
        (**self).ensure_collection().await
    }

    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<(), PipelineError> {
        (**self).upsert(records).await
    }

    async fn query(
        &self,
        query_text: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<StoreHit>, PipelineError> {
        (**self).query(query_text, filter, limit).await
    }

    async fn list_files(&self) -> Result<Vec<IndexedFile>, PipelineError> {
        (**self).list_files().await
    }
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for std::sync::Arc<T> {
    async fn ensure_collection(&self) -> Result<(), PipelineError> {
        (**self).ensure_collection().await
    }

    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<(), PipelineError> {
        (**self).upsert(records).await
    }

    async fn query(
        &self,
        query_text: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<StoreHit>, PipelineError> {
        (**self).query(query_text, filter, limit).await
    }

    async fn list_files(&self) -> Result<Vec<IndexedFile>, PipelineError> {
        (**self).list_files().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_any_candidate() {
        let filter = FieldFilter::any_of("file_id", vec!["a".into(), "b".into()]);
        assert!(filter.matches("a"));
        assert!(filter.matches("b"));
        assert!(!filter.matches("c"));
    }

    #[test]
    fn record_metadata_round_trips_flattened() {
        let metadata = RecordMetadata {
            chunk: ChunkMetadata {
                section_name: "Sec".into(),
                filename: "doc.md".into(),
                page_number: 2,
                page_numbers: vec![2],
                ..Default::default()
            },
            job_id: "job-1".into(),
            file_id: "job-1_doc.md".into(),
            keywords: vec!["alpha".into()],
        };

        let value = serde_json::to_value(&metadata).unwrap();
        // Flattened: chunk fields sit at the top level of the payload.
        assert_eq!(value["section_name"], "Sec");
        assert_eq!(value["file_id"], "job-1_doc.md");

        let back: RecordMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, metadata);
    }
}
