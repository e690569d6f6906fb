//! Context and keyword annotation collaborators.
//!
//! The pipeline asks an [`Annotator`] for a short natural-language context
//! string per section block and a keyword list per chunk. Annotation is
//! best-effort: failures degrade to empty output and are recorded as a
//! degraded status on the file result, never aborting ingestion.

mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

pub use ollama::{OllamaAnnotator, OllamaConfig, OllamaHealth};

/// Generates retrieval context strings and keyword lists for text blocks.
#[async_trait]
pub trait Annotator: Send + Sync {
    /// A short context string (key names, terms, figures) for a block of
    /// text. Implementations should return an empty string for blank input.
    async fn generate_context(&self, text: &str) -> Result<String, PipelineError>;

    /// Keywords for a block of text, parsed from a comma-delimited model
    /// reply. Blank input yields an empty list.
    async fn generate_keywords(&self, text: &str) -> Result<Vec<String>, PipelineError>;
}

#[async_trait]
impl<T: Annotator + ?Sized> Annotator for &T {
    async fn generate_context(&self, text: &str) -> Result<String, PipelineError> {
        (**self).generate_context(text).await
    }

    async fn generate_keywords(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        (**self).generate_keywords(text).await
    }
}

#[async_trait]
impl<T: Annotator + ?Sized> Annotator for std::sync::Arc<T> {
    async fn generate_context(&self, text: &str) -> Result<String, PipelineError> {
        (**self).generate_context(text).await
    }

    async fn generate_keywords(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        (**self).generate_keywords(text).await
    }
}

/// Whether annotation for a unit of work succeeded or fell back to empty
/// output. Recorded on per-file results so degraded ingestion stays visible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    #[default]
    Success,
    Degraded,
}

impl AnnotationStatus {
    pub fn merge(self, other: AnnotationStatus) -> AnnotationStatus {
        if self == AnnotationStatus::Degraded || other == AnnotationStatus::Degraded {
            AnnotationStatus::Degraded
        } else {
            AnnotationStatus::Success
        }
    }

    pub fn is_degraded(&self) -> bool {
        *self == AnnotationStatus::Degraded
    }
}

/// Splits a comma-delimited model reply into trimmed, non-empty keywords.
pub(crate) fn split_keywords(reply: &str) -> Vec<String> {
    reply
        .split(',')
        .map(str::trim)
        .filter(|kw| !kw.is_empty())
        .map(str::to_string)
        .collect()
}
