//! Ingestion: the job runner and the store adapter.
//!
//! [`IngestionPipeline`] drives a whole job: per file it converts on a
//! blocking worker, classifies and groups page by page, builds chunks, and
//! hands them to the [`ChunkIndexer`] for keyword annotation and a batched
//! store write. Per-file failures are recorded on the job result, never
//! aborting the remaining files, and the finished [`JobResult`] is persisted
//! as a JSON artifact keyed by job id.

mod indexer;
mod job;

pub use indexer::{file_id, ChunkIndexer};
pub use job::{ChunkSummary, FileResult, FileStatus, IngestionPipeline, JobResult};
