//! Hybrid retrieval: filtered similarity search with keyword-boost
//! re-ranking and source-annotated rendering.
//!
//! The retriever over-fetches from the vector store, adds a linear boost for
//! query words that appear in a hit's keywords or stored context, re-sorts,
//! and renders the kept hits into a single context string for the answering
//! model. Retrieval is read-only; any error at the query boundary is logged
//! and collapses to an empty context string.

use std::collections::HashSet;

use tracing::{debug, error};

use crate::stores::{FieldFilter, IndexedFile, RecordMetadata, StoreHit, VectorStore};
use crate::types::PipelineError;

const OVER_FETCH_FACTOR: usize = 2;

/// Tuning knobs for a hybrid search.
#[derive(Clone, Debug)]
pub struct SearchOptions {
    /// Hits kept after re-ranking.
    pub limit: usize,
    /// Restrict to these owning files; empty means the whole collection.
    pub file_ids: Vec<String>,
    /// Linear factor applied to the keyword/context overlap.
    pub keyword_boost: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 3,
            file_ids: Vec::new(),
            keyword_boost: 0.3,
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_file_ids(mut self, file_ids: Vec<String>) -> Self {
        self.file_ids = file_ids;
        self
    }

    #[must_use]
    pub fn with_keyword_boost(mut self, keyword_boost: f32) -> Self {
        self.keyword_boost = keyword_boost;
        self
    }

    fn filter(&self) -> Option<FieldFilter> {
        if self.file_ids.is_empty() {
            None
        } else {
            Some(FieldFilter::any_of("file_id", self.file_ids.clone()))
        }
    }
}

/// A re-ranked hit. Ephemeral; exists only between query and rendering.
#[derive(Clone, Debug)]
pub struct RetrievalHit {
    pub content: String,
    pub metadata: RecordMetadata,
    pub base_score: f32,
    pub final_score: f32,
}

/// Vector search with keyword-aware re-ranking over one collection.
pub struct HybridRetriever<S> {
    store: S,
}

impl<S: VectorStore> HybridRetriever<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Runs a hybrid search and returns the re-ranked hits.
    ///
    /// Over-fetches `limit * 2` candidates so re-ranking has room to promote
    /// keyword matches past similarity-only neighbors.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RetrievalHit>, PipelineError> {
        let filter = options.filter();
        let candidates = self
            .store
            .query(query, filter.as_ref(), options.limit * OVER_FETCH_FACTOR)
            .await?;

        let query_words = word_set(query);
        let mut hits: Vec<RetrievalHit> = candidates
            .into_iter()
            .map(|hit| boost_hit(hit, &query_words, options.keyword_boost))
            .collect();

        hits.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(options.limit);
        debug!(query_words = query_words.len(), kept = hits.len(), "hybrid search done");
        Ok(hits)
    }

    /// Hybrid search rendered into a source-annotated context string.
    ///
    /// No results render as an empty string, and so do retrieval errors:
    /// the answering side must degrade to "no context", never fail.
    pub async fn retrieve_context(&self, query: &str, options: &SearchOptions) -> String {
        match self.search(query, options).await {
            Ok(hits) => render_hits(&hits, true),
            Err(err) => {
                error!(error = %err, "hybrid retrieval failed, returning empty context");
                String::new()
            }
        }
    }

    /// Plain filtered search without re-ranking or the source summary.
    pub async fn search_context(&self, query: &str, options: &SearchOptions) -> String {
        let filter = options.filter();
        match self.store.query(query, filter.as_ref(), options.limit).await {
            Ok(candidates) => {
                let hits: Vec<RetrievalHit> = candidates
                    .into_iter()
                    .map(|hit| RetrievalHit {
                        content: hit.document,
                        metadata: hit.metadata,
                        base_score: hit.score,
                        final_score: hit.score,
                    })
                    .collect();
                render_hits(&hits, false)
            }
            Err(err) => {
                error!(error = %err, "search failed, returning empty context");
                String::new()
            }
        }
    }

    /// Distinct owning files present in the collection.
    pub async fn list_files(&self) -> Result<Vec<IndexedFile>, PipelineError> {
        self.store.list_files().await
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect()
}

/// `boost = (|q ∩ keywords| + 0.5 · |q ∩ context-words|) · keyword_boost`
fn boost_hit(hit: StoreHit, query_words: &HashSet<String>, keyword_boost: f32) -> RetrievalHit {
    // Keyword entries match whole: a multi-word keyword only counts when the
    // query contains it as one word, never piecewise.
    let keyword_entries: HashSet<String> = hit
        .metadata
        .keywords
        .iter()
        .map(|keyword| keyword.to_lowercase())
        .collect();
    let context_words = word_set(&hit.metadata.chunk.context);

    let keyword_overlap = query_words.intersection(&keyword_entries).count() as f32;
    let context_overlap = query_words.intersection(&context_words).count() as f32;
    let boost = (keyword_overlap + 0.5 * context_overlap) * keyword_boost;

    RetrievalHit {
        content: hit.document,
        metadata: hit.metadata,
        base_score: hit.score,
        final_score: hit.score + boost,
    }
}

fn format_pages(pages: &[u32]) -> String {
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_hits(hits: &[RetrievalHit], with_summary: bool) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let mut sections = Vec::with_capacity(hits.len() + 1);
    if with_summary {
        sections.push(render_summary(hits));
    }
    for hit in hits {
        let meta = &hit.metadata;
        let mut block = format!(
            "File: {}\nPages: {}\nSection: {}",
            meta.chunk.filename,
            format_pages(&meta.chunk.page_numbers),
            meta.chunk.section_name,
        );
        if !meta.keywords.is_empty() {
            block.push_str(&format!("\nKeywords: {}", meta.keywords.join(", ")));
        }
        if !meta.chunk.context.is_empty() {
            block.push_str(&format!("\nContext: {}", meta.chunk.context));
        }
        block.push_str(&format!("\nContent: {}", hit.content));
        sections.push(block);
    }
    sections.join("\n\n---\n\n")
}

fn render_summary(hits: &[RetrievalHit]) -> String {
    let mut summary = format!("Found {} relevant sections:\n", hits.len());
    for (position, hit) in hits.iter().enumerate() {
        summary.push_str(&format!(
            "{}. {} (pages: {}; score: {:.2})\n",
            position + 1,
            hit.metadata.chunk.filename,
            format_pages(&hit.metadata.chunk.page_numbers),
            hit.final_score,
        ));
    }

    if hits.len() > 1 {
        summary.push_str(&format!(
            "Note: the answer draws on {} different sources. Verify which one applies to the question.\n",
            hits.len(),
        ));
    }
    summary
}
