//! ```text
//! Uploaded file ──► document::DocumentConverter ──► Vec<ParsedItem>
//!                                  │
//!                  document::classifier (per page) ──► ClassifiedItem stream
//!                                  │
//!                  chunking::grouper ──► SectionBlock per section-per-page
//!                                  │
//!                  chunking::ChunkBuilder ──┬─► annotate::Annotator (context)
//!                                           └─► DocumentChunk
//!                                  │
//!                  ingestion::ChunkIndexer ──┬─► annotate::Annotator (keywords)
//!                                            └─► stores::VectorStore (upsert)
//!
//! Query ──► retrieval::HybridRetriever ──► stores::VectorStore (filtered query)
//!                                      └─► keyword-boost re-rank ──► context string
//! ```

pub mod annotate;
pub mod chunking;
pub mod document;
pub mod ingestion;
pub mod retrieval;
pub mod stores;
pub mod types;

pub use annotate::{AnnotationStatus, Annotator};
pub use chunking::{ChunkBuilder, ChunkMetadata, DocumentChunk, SectionBlock};
pub use document::{ClassifiedItem, DocumentConverter, Hierarchy, ItemKind, ParsedItem};
pub use ingestion::{ChunkIndexer, FileStatus, IngestionPipeline, JobResult};
pub use retrieval::{HybridRetriever, RetrievalHit, SearchOptions};
pub use stores::{FieldFilter, IndexedFile, RecordMetadata, StoreHit, StoredRecord, VectorStore};
pub use types::PipelineError;
