//! Crate-wide error types.
//!
//! Every failure carries enough context to attribute it to a pipeline stage;
//! the ingestion job runner records these on the per-file result entries
//! rather than aborting the whole job.

/// Errors raised by the ingestion and retrieval pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Converting a source file into parsed items failed.
    #[error("document conversion failed: {0}")]
    Conversion(String),

    /// The context/keyword annotator returned an error.
    #[error("annotation failed: {0}")]
    Annotation(String),

    /// The vector store rejected an operation.
    #[error("vector store error: {0}")]
    Store(String),

    /// A batched upsert failed; the whole batch must be treated as
    /// failed/retryable, never as a partial success.
    #[error("upsert of {attempted} chunks failed: {message}")]
    UpsertFailed { attempted: usize, message: String },

    /// A retrieval query failed. Callers at the query boundary convert
    /// this into an empty context string.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PipelineError {
    /// Number of chunks attempted by a failed upsert, when applicable.
    pub fn attempted_chunks(&self) -> Option<usize> {
        match self {
            PipelineError::UpsertFailed { attempted, .. } => Some(*attempted),
            _ => None,
        }
    }
}
