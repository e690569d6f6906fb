use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::annotate::{AnnotationStatus, Annotator};
use crate::document::Hierarchy;

use super::SectionBlock;

/// Metadata attached to a chunk.
///
/// This is the one canonical structure carried from chunk construction
/// through storage and back out of retrieval hits.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub section_name: String,
    pub chapter_name: String,
    pub parent_context: String,
    pub section_level: u32,
    pub generated_context: String,
    /// Composed context stored alongside the chunk: parent chapter line plus
    /// generated section context, either part omitted when empty.
    pub context: String,
    pub filename: String,
    pub page_number: u32,
    pub page_numbers: Vec<u32>,
    pub hierarchy: Hierarchy,
}

/// The unit of retrievable text; one chunk per section block.
///
/// Immutable once built and mapped to exactly one stored vector record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub section_title: String,
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
}

/// Builds chunks from section blocks for one document.
///
/// The chunk index increases monotonically across the whole document,
/// spanning all pages. Context generation is delegated to the annotator and
/// degrades to an empty string on failure; the degradation is reported back
/// so the per-file result can record it.
pub struct ChunkBuilder<A> {
    annotator: A,
    filename: String,
    next_index: usize,
}

impl<A: Annotator> ChunkBuilder<A> {
    pub fn new(annotator: A, filename: impl Into<String>) -> Self {
        Self {
            annotator,
            filename: filename.into(),
            next_index: 0,
        }
    }

    /// Number of chunks built so far.
    pub fn built(&self) -> usize {
        self.next_index
    }

    /// Builds a chunk from one block.
    ///
    /// Returns `None` for blocks whose joined content is blank. The returned
    /// status is [`AnnotationStatus::Degraded`] when context generation
    /// failed and the chunk proceeded with an empty context.
    pub async fn build_block(
        &mut self,
        block: &SectionBlock,
    ) -> Option<(DocumentChunk, AnnotationStatus)> {
        let content = block.joined_content();
        if content.trim().is_empty() {
            return None;
        }

        let (generated_context, status) = match self.annotator.generate_context(&content).await {
            Ok(context) => (context.trim().to_string(), AnnotationStatus::Success),
            Err(err) => {
                warn!(
                    file = %self.filename,
                    section = %block.section_name,
                    error = %err,
                    "context generation failed, continuing without context"
                );
                (String::new(), AnnotationStatus::Degraded)
            }
        };

        let section_title = if block.hierarchy.is_empty() {
            format!("Page {}", block.page_number)
        } else {
            block.hierarchy.joined_path()
        };
        let parent_context = block.hierarchy.parent_path();
        let context = compose_context(&parent_context, &generated_context);

        let chunk = DocumentChunk {
            content,
            section_title,
            chunk_index: self.next_index,
            metadata: ChunkMetadata {
                section_name: block.section_name.clone(),
                chapter_name: block.chapter_name.clone(),
                parent_context,
                section_level: block.level,
                generated_context,
                context,
                filename: self.filename.clone(),
                page_number: block.page_number,
                page_numbers: vec![block.page_number],
                hierarchy: block.hierarchy.clone(),
            },
        };
        debug!(
            file = %self.filename,
            index = chunk.chunk_index,
            section = %chunk.section_title,
            chars = chunk.content.len(),
            "built chunk"
        );
        self.next_index += 1;
        Some((chunk, status))
    }

    /// Builds chunks for a sequence of blocks, merging their annotation
    /// statuses.
    pub async fn build_blocks(
        &mut self,
        blocks: &[SectionBlock],
    ) -> (Vec<DocumentChunk>, AnnotationStatus) {
        let mut chunks = Vec::with_capacity(blocks.len());
        let mut status = AnnotationStatus::Success;
        for block in blocks {
            if let Some((chunk, block_status)) = self.build_block(block).await {
                chunks.push(chunk);
                status = status.merge(block_status);
            }
        }
        (chunks, status)
    }
}

fn compose_context(parent_context: &str, generated_context: &str) -> String {
    let mut context = String::new();
    if !parent_context.is_empty() {
        context.push_str(&format!("Parent chapter: {parent_context}\n"));
    }
    if !generated_context.is_empty() {
        context.push_str(&format!("Section context: {generated_context}"));
    }
    context
}
