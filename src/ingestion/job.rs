use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::annotate::{AnnotationStatus, Annotator};
use crate::chunking::{group_page, ChunkBuilder, DocumentChunk, SectionBlock};
use crate::document::{classify_page, DocumentConverter, ParsedItem};
use crate::stores::VectorStore;
use crate::types::PipelineError;

use super::indexer::ChunkIndexer;

const PREVIEW_CHARS: usize = 200;

/// Terminal state of one file within a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Converted, chunked, and indexed.
    Completed,
    /// Converted and chunked, but the store rejected the batch. The chunks
    /// in the result show what would have been indexed.
    IndexingFailed,
    /// Conversion failed; nothing was produced for this file.
    Failed,
}

/// Short preview of one built chunk, kept in the job artifact for
/// inspection without re-querying the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub section_title: String,
    pub page_number: u32,
    pub preview: String,
}

impl ChunkSummary {
    fn from_chunk(chunk: &DocumentChunk) -> Self {
        let preview = if chunk.content.chars().count() > PREVIEW_CHARS {
            let truncated: String = chunk.content.chars().take(PREVIEW_CHARS).collect();
            format!("{truncated}...")
        } else {
            chunk.content.clone()
        };
        Self {
            section_title: chunk.section_title.clone(),
            page_number: chunk.metadata.page_number,
            preview,
        }
    }
}

/// Outcome for one file in a job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileResult {
    pub filename: String,
    pub status: FileStatus,
    /// Whether any context or keyword generation fell back to empty output.
    pub annotation: AnnotationStatus,
    pub chunks: Vec<ChunkSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The persisted record of a finished job; written once as
/// `{results_root}/{job_id}/results.json` and loadable by job id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    /// Files that completed end to end; failed entries appear in `files`
    /// but are not counted here.
    pub files_processed: usize,
    /// Records actually written to the store across all files.
    pub total_chunks: usize,
    pub files: Vec<FileResult>,
}

/// Runs ingestion jobs: converts each file on a blocking worker, chunks it
/// page by page, indexes the chunks, and persists one JSON artifact per job.
///
/// Files are isolated from each other: a failure in one is recorded on its
/// result and the job moves on.
pub struct IngestionPipeline<C, A, S> {
    converter: Arc<C>,
    annotator: A,
    store: S,
    results_root: PathBuf,
}

impl<C, A, S> IngestionPipeline<C, A, S>
where
    C: DocumentConverter + 'static,
    A: Annotator,
    S: VectorStore,
{
    pub fn new(converter: C, annotator: A, store: S, results_root: impl Into<PathBuf>) -> Self {
        Self {
            converter: Arc::new(converter),
            annotator,
            store,
            results_root: results_root.into(),
        }
    }

    /// Fresh job identifier.
    pub fn new_job_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Path of the persisted artifact for a job.
    pub fn results_path(&self, job_id: &str) -> PathBuf {
        self.results_root.join(job_id).join("results.json")
    }

    /// Runs a job to completion and persists its result artifact.
    ///
    /// Only artifact persistence can fail the call; per-file errors end up
    /// on the corresponding [`FileResult`].
    pub async fn run_job(
        &self,
        job_id: &str,
        files: &[PathBuf],
    ) -> Result<JobResult, PipelineError> {
        info!(job_id, files = files.len(), "starting ingestion job");
        let indexer = ChunkIndexer::new(&self.annotator, &self.store, job_id);

        let mut results = Vec::with_capacity(files.len());
        let mut files_processed = 0;
        let mut total_chunks = 0;
        for path in files {
            let result = self.process_file(&indexer, path).await;
            if result.status == FileStatus::Completed {
                files_processed += 1;
                total_chunks += result.chunks.len();
            }
            results.push(result);
        }

        let result = JobResult {
            job_id: job_id.to_string(),
            files_processed,
            total_chunks,
            files: results,
        };
        self.persist(&result).await?;
        info!(
            job_id,
            files = result.files_processed,
            chunks = result.total_chunks,
            "ingestion job finished"
        );
        Ok(result)
    }

    /// Runs a job as a detached background task.
    ///
    /// Returns the generated job id immediately; the persisted artifact is
    /// the terminal-state record for pollers.
    pub fn spawn(
        self: Arc<Self>,
        files: Vec<PathBuf>,
    ) -> (String, JoinHandle<Result<JobResult, PipelineError>>)
    where
        A: 'static,
        S: 'static,
    {
        let job_id = Self::new_job_id();
        let handle = {
            let job_id = job_id.clone();
            tokio::spawn(async move {
                let result = self.run_job(&job_id, &files).await;
                if let Err(err) = &result {
                    error!(job_id = %job_id, error = %err, "ingestion job failed");
                }
                result
            })
        };
        (job_id, handle)
    }

    /// Loads the persisted artifact for a finished job.
    pub async fn load_results(&self, job_id: &str) -> Result<JobResult, PipelineError> {
        let bytes = tokio::fs::read(self.results_path(job_id)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn process_file(
        &self,
        indexer: &ChunkIndexer<&A, &S>,
        path: &Path,
    ) -> FileResult {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let items = match self.convert(path).await {
            Ok(items) => items,
            Err(err) => {
                warn!(file = %filename, error = %err, "conversion failed");
                return FileResult {
                    filename,
                    status: FileStatus::Failed,
                    annotation: AnnotationStatus::Success,
                    chunks: Vec::new(),
                    error: Some(err.to_string()),
                };
            }
        };

        let (chunks, annotation) = self.build_chunks(&filename, items).await;
        let summaries: Vec<ChunkSummary> = chunks.iter().map(ChunkSummary::from_chunk).collect();

        match indexer.index_document(&filename, &chunks).await {
            Ok((_, index_status)) => FileResult {
                filename,
                status: FileStatus::Completed,
                annotation: annotation.merge(index_status),
                chunks: summaries,
                error: None,
            },
            Err(err) => {
                warn!(file = %filename, error = %err, "indexing failed");
                FileResult {
                    filename,
                    status: FileStatus::IndexingFailed,
                    annotation,
                    chunks: summaries,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn convert(&self, path: &Path) -> Result<Vec<ParsedItem>, PipelineError> {
        let converter = Arc::clone(&self.converter);
        let path = path.to_owned();
        tokio::task::spawn_blocking(move || converter.convert(&path))
            .await
            .map_err(|err| PipelineError::Conversion(format!("conversion task panicked: {err}")))?
    }

    async fn build_chunks(
        &self,
        filename: &str,
        items: Vec<ParsedItem>,
    ) -> (Vec<DocumentChunk>, AnnotationStatus) {
        let mut builder = ChunkBuilder::new(&self.annotator, filename);
        let mut chunks = Vec::new();
        let mut status = AnnotationStatus::Success;

        for (page, page_items) in split_pages(items) {
            let classified = classify_page(&page_items);
            let blocks: Vec<SectionBlock> = group_page(page, &classified);
            let (page_chunks, page_status) = builder.build_blocks(&blocks).await;
            chunks.extend(page_chunks);
            status = status.merge(page_status);
        }
        (chunks, status)
    }

    async fn persist(&self, result: &JobResult) -> Result<(), PipelineError> {
        let path = self.results_path(&result.job_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(result)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

/// Buckets items by effective page number, preserving the order pages first
/// appear in the stream.
fn split_pages(items: Vec<ParsedItem>) -> Vec<(u32, Vec<ParsedItem>)> {
    let mut pages: Vec<(u32, Vec<ParsedItem>)> = Vec::new();
    for item in items {
        let page = item.page_number();
        match pages.iter_mut().find(|(existing, _)| *existing == page) {
            Some((_, bucket)) => bucket.push(item),
            None => pages.push((page, vec![item])),
        }
    }
    pages
}
