use std::path::Path;

use crate::types::PipelineError;

use super::ParsedItem;

/// Turns a source file into an ordered stream of parsed items.
///
/// Implementations are synchronous and may be CPU-bound; the ingestion
/// pipeline runs them on a blocking worker thread so document conversion
/// never stalls the async runtime. Converters must tolerate items without
/// page provenance (the classifier defaults them to page 1) and may emit
/// [`ItemKind::Other`](super::ItemKind::Other) for elements they cannot
/// label more precisely.
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, path: &Path) -> Result<Vec<ParsedItem>, PipelineError>;
}

impl<T: DocumentConverter + ?Sized> DocumentConverter for std::sync::Arc<T> {
    fn convert(&self, path: &Path) -> Result<Vec<ParsedItem>, PipelineError> {
        (**self).convert(path)
    }
}
