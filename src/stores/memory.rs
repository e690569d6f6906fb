//! In-process vector store with deterministic lexical scoring.
//!
//! Stands in for the external vector database in tests and local runs: the
//! similarity score is the token overlap between query and document text,
//! normalized by the query length, which is deterministic and good enough to
//! exercise filtering, over-fetching, and re-ranking.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::types::PipelineError;

use super::{FieldFilter, IndexedFile, StoreHit, StoredRecord, VectorStore};

#[derive(Clone, Default)]
pub struct MemoryVectorStore {
    records: Arc<RwLock<Vec<StoredRecord>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Snapshot of all stored records, in insertion order.
    pub fn records(&self) -> Vec<StoredRecord> {
        self.records.read().clone()
    }
}

fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|token| token.to_lowercase())
        .collect()
}

fn lexical_score(query: &HashSet<String>, document: &str) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let document = token_set(document);
    let overlap = query.intersection(&document).count();
    overlap as f32 / query.len() as f32
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_collection(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<(), PipelineError> {
        self.records.write().extend(records);
        Ok(())
    }

    async fn query(
        &self,
        query_text: &str,
        filter: Option<&FieldFilter>,
        limit: usize,
    ) -> Result<Vec<StoreHit>, PipelineError> {
        let query = token_set(query_text);
        let records = self.records.read();

        let mut hits: Vec<StoreHit> = records
            .iter()
            .filter(|record| match filter {
                Some(filter) if filter.field == "file_id" => {
                    filter.matches(&record.metadata.file_id)
                }
                Some(filter) if filter.field == "job_id" => {
                    filter.matches(&record.metadata.job_id)
                }
                Some(_) => false,
                None => true,
            })
            .map(|record| StoreHit {
                document: record.document_text.clone(),
                metadata: record.metadata.clone(),
                score: lexical_score(&query, &record.document_text),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn list_files(&self) -> Result<Vec<IndexedFile>, PipelineError> {
        let records = self.records.read();
        let mut files = Vec::new();
        for record in records.iter() {
            let entry = IndexedFile {
                file_id: record.metadata.file_id.clone(),
                filename: record.metadata.chunk.filename.clone(),
            };
            if !files.iter().any(|existing: &IndexedFile| existing.file_id == entry.file_id) {
                files.push(entry);
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::RecordMetadata;

    fn record(id: &str, text: &str, file_id: &str) -> StoredRecord {
        StoredRecord {
            id: id.to_string(),
            document_text: text.to_string(),
            metadata: RecordMetadata {
                file_id: file_id.to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn scores_rank_by_overlap() {
        let store = MemoryVectorStore::new();
        store
            .upsert(vec![
                record("1", "rust borrow checker", "f1"),
                record("2", "python garbage collector", "f1"),
            ])
            .await
            .unwrap();

        let hits = store.query("rust checker", None, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document, "rust borrow checker");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn filter_excludes_other_files() {
        let store = MemoryVectorStore::new();
        store
            .upsert(vec![
                record("1", "shared words here", "f1"),
                record("2", "shared words here", "f2"),
            ])
            .await
            .unwrap();

        let filter = FieldFilter::any_of("file_id", vec!["f2".into()]);
        let hits = store.query("shared words", Some(&filter), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.file_id, "f2");
    }

    #[tokio::test]
    async fn list_files_deduplicates() {
        let store = MemoryVectorStore::new();
        store
            .upsert(vec![
                record("1", "a", "f1"),
                record("2", "b", "f1"),
                record("3", "c", "f2"),
            ])
            .await
            .unwrap();

        let files = store.list_files().await.unwrap();
        assert_eq!(files.len(), 2);
    }
}
