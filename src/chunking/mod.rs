//! Page/section grouping and chunk construction.
//!
//! Classified items are grouped into one [`SectionBlock`] per contiguous
//! section run per page, and each non-blank block becomes exactly one
//! [`DocumentChunk`] destined for the vector store.

mod builder;
mod grouper;

pub use builder::{ChunkBuilder, ChunkMetadata, DocumentChunk};
pub use grouper::{group_page, SectionBlock};
