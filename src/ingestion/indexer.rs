use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::annotate::{AnnotationStatus, Annotator};
use crate::chunking::DocumentChunk;
use crate::stores::{RecordMetadata, StoredRecord, VectorStore};
use crate::types::PipelineError;

/// Derives the owning-file identity for records of one file in one job.
///
/// Deterministic so reprocessing the same upload under a new job id never
/// collides with the old records.
pub fn file_id(job_id: &str, filename: &str) -> String {
    if filename.is_empty() {
        job_id.to_string()
    } else {
        format!("{job_id}_{filename}")
    }
}

/// Turns built chunks into stored records and writes them to the vector
/// store in one batch per document.
///
/// Keywords are generated from the raw chunk content; a keyword failure
/// degrades that chunk to an empty list rather than failing the file. The
/// text handed to the store for embedding is the chunk content prefixed with
/// its composed context when one exists.
pub struct ChunkIndexer<A, S> {
    annotator: A,
    store: S,
    job_id: String,
}

impl<A: Annotator, S: VectorStore> ChunkIndexer<A, S> {
    pub fn new(annotator: A, store: S, job_id: impl Into<String>) -> Self {
        Self {
            annotator,
            store,
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Indexes every chunk of one document.
    ///
    /// Returns the number of records written and whether keyword annotation
    /// degraded along the way. The upsert is a single batch; on store failure
    /// the error carries the attempted record count and the caller must treat
    /// every chunk as not stored.
    pub async fn index_document(
        &self,
        filename: &str,
        chunks: &[DocumentChunk],
    ) -> Result<(usize, AnnotationStatus), PipelineError> {
        if chunks.is_empty() {
            debug!(file = filename, job_id = %self.job_id, "no chunks to index");
            return Ok((0, AnnotationStatus::Success));
        }

        let file_id = file_id(&self.job_id, filename);
        let mut records = Vec::with_capacity(chunks.len());
        let mut status = AnnotationStatus::Success;

        for chunk in chunks {
            let keywords = match self.annotator.generate_keywords(&chunk.content).await {
                Ok(keywords) => keywords,
                Err(err) => {
                    warn!(
                        file = filename,
                        job_id = %self.job_id,
                        index = chunk.chunk_index,
                        error = %err,
                        "keyword generation failed, storing chunk without keywords"
                    );
                    status = status.merge(AnnotationStatus::Degraded);
                    Vec::new()
                }
            };

            records.push(StoredRecord {
                id: Uuid::new_v4().to_string(),
                document_text: embedding_text(chunk),
                metadata: RecordMetadata {
                    chunk: chunk.metadata.clone(),
                    job_id: self.job_id.clone(),
                    file_id: file_id.clone(),
                    keywords,
                },
            });
        }

        let attempted = records.len();
        self.store.upsert(records).await.map_err(|err| {
            PipelineError::UpsertFailed {
                attempted,
                message: err.to_string(),
            }
        })?;

        info!(
            file = filename,
            job_id = %self.job_id,
            chunks = attempted,
            "indexed document"
        );
        Ok((attempted, status))
    }
}

/// The text the store embeds for a chunk.
fn embedding_text(chunk: &DocumentChunk) -> String {
    let context = chunk.metadata.context.trim();
    if context.is_empty() {
        chunk.content.clone()
    } else {
        format!("Context: {context}\n\nContent: {}", chunk.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkMetadata;
    use crate::stores::{FieldFilter, IndexedFile, MemoryVectorStore, StoreHit};
    use async_trait::async_trait;

    struct KeywordAnnotator;

    #[async_trait]
    impl Annotator for KeywordAnnotator {
        async fn generate_context(&self, _text: &str) -> Result<String, PipelineError> {
            Ok(String::new())
        }

        async fn generate_keywords(&self, text: &str) -> Result<Vec<String>, PipelineError> {
            Ok(text.split_whitespace().take(2).map(str::to_string).collect())
        }
    }

    struct FailingAnnotator;

    #[async_trait]
    impl Annotator for FailingAnnotator {
        async fn generate_context(&self, _text: &str) -> Result<String, PipelineError> {
            Err(PipelineError::Annotation("offline".into()))
        }

        async fn generate_keywords(&self, _text: &str) -> Result<Vec<String>, PipelineError> {
            Err(PipelineError::Annotation("offline".into()))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn ensure_collection(&self) -> Result<(), PipelineError> {
            Ok(())
        }

        async fn upsert(&self, _records: Vec<StoredRecord>) -> Result<(), PipelineError> {
            Err(PipelineError::Store("connection refused".into()))
        }

        async fn query(
            &self,
            _query_text: &str,
            _filter: Option<&FieldFilter>,
            _limit: usize,
        ) -> Result<Vec<StoreHit>, PipelineError> {
            Ok(Vec::new())
        }

        async fn list_files(&self) -> Result<Vec<IndexedFile>, PipelineError> {
            Ok(Vec::new())
        }
    }

    fn chunk(index: usize, content: &str, context: &str) -> DocumentChunk {
        DocumentChunk {
            content: content.to_string(),
            section_title: "Sec".to_string(),
            chunk_index: index,
            metadata: ChunkMetadata {
                context: context.to_string(),
                filename: "doc.md".to_string(),
                page_number: 1,
                page_numbers: vec![1],
                ..Default::default()
            },
        }
    }

    #[test]
    fn file_id_combines_job_and_filename() {
        assert_eq!(file_id("job-1", "doc.md"), "job-1_doc.md");
        assert_eq!(file_id("job-1", ""), "job-1");
    }

    #[tokio::test]
    async fn records_carry_keywords_and_prefixed_text() {
        let store = MemoryVectorStore::new();
        let indexer = ChunkIndexer::new(KeywordAnnotator, store.clone(), "job-1");

        let chunks = vec![
            chunk(0, "alpha beta gamma", "Section context: summary"),
            chunk(1, "delta epsilon", ""),
        ];
        let (stored, status) = indexer.index_document("doc.md", &chunks).await.unwrap();

        assert_eq!(stored, 2);
        assert!(!status.is_degraded());

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].metadata.file_id, "job-1_doc.md");
        assert_eq!(records[0].metadata.keywords, vec!["alpha", "beta"]);
        assert_eq!(
            records[0].document_text,
            "Context: Section context: summary\n\nContent: alpha beta gamma"
        );
        // No context: embed the raw content.
        assert_eq!(records[1].document_text, "delta epsilon");
        assert_ne!(records[0].id, records[1].id);
    }

    #[tokio::test]
    async fn keyword_failure_degrades_not_aborts() {
        let store = MemoryVectorStore::new();
        let indexer = ChunkIndexer::new(FailingAnnotator, store.clone(), "job-1");

        let (stored, status) = indexer
            .index_document("doc.md", &[chunk(0, "body", "")])
            .await
            .unwrap();

        assert_eq!(stored, 1);
        assert!(status.is_degraded());
        assert!(store.records()[0].metadata.keywords.is_empty());
    }

    #[tokio::test]
    async fn upsert_failure_reports_attempted_count() {
        let indexer = ChunkIndexer::new(KeywordAnnotator, FailingStore, "job-1");

        let chunks = vec![chunk(0, "a", ""), chunk(1, "b", ""), chunk(2, "c", "")];
        let err = indexer.index_document("doc.md", &chunks).await.unwrap_err();

        assert_eq!(err.attempted_chunks(), Some(3));
    }

    #[tokio::test]
    async fn empty_document_is_a_noop() {
        let store = MemoryVectorStore::new();
        let indexer = ChunkIndexer::new(KeywordAnnotator, store.clone(), "job-1");
        let (stored, status) = indexer.index_document("doc.md", &[]).await.unwrap();
        assert_eq!(stored, 0);
        assert!(!status.is_degraded());
        assert!(store.is_empty());
    }
}
