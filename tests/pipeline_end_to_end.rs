//! End-to-end pipeline tests over the in-process store: markdown in,
//! stored records and rendered retrieval context out.

use std::sync::Arc;

use async_trait::async_trait;
use docsmith::document::MarkdownConverter;
use docsmith::stores::MemoryVectorStore;
use docsmith::{
    Annotator, FileStatus, HybridRetriever, IngestionPipeline, PipelineError, SearchOptions,
};
use tracing_subscriber::FmtSubscriber;

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("info").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Deterministic annotator: context echoes a marker, keywords are the first
/// words of the chunk.
struct ScriptedAnnotator;

#[async_trait]
impl Annotator for ScriptedAnnotator {
    async fn generate_context(&self, _text: &str) -> Result<String, PipelineError> {
        Ok("generated summary".to_string())
    }

    async fn generate_keywords(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        Ok(text
            .split_whitespace()
            .take(3)
            .map(|word| word.trim_matches(|ch: char| ch.is_ascii_punctuation()).to_lowercase())
            .collect())
    }
}

fn pipeline_with(
    store: MemoryVectorStore,
    results_root: &std::path::Path,
) -> IngestionPipeline<MarkdownConverter, ScriptedAnnotator, MemoryVectorStore> {
    init_tracing();
    IngestionPipeline::new(
        MarkdownConverter::new(),
        ScriptedAnnotator,
        store,
        results_root,
    )
}

#[tokio::test]
async fn two_page_document_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("report.md");
    std::fs::write(
        &doc,
        "# Intro\n\nOpening remarks about the project.\n\u{0C}\n## Details\n\nNumbers and caveats.\n",
    )
    .unwrap();

    let store = MemoryVectorStore::new();
    let pipeline = pipeline_with(store.clone(), &dir.path().join("results"));
    let result = pipeline.run_job("job-e2e", &[doc]).await.unwrap();

    assert_eq!(result.files_processed, 1);
    assert_eq!(result.files[0].status, FileStatus::Completed);
    assert!(!result.files[0].annotation.is_degraded());

    let records = store.records();
    assert_eq!(records.len(), 2);

    // Page 1: the title alone names the section.
    let first = &records[0].metadata.chunk;
    assert_eq!(first.section_name, "Intro");
    assert_eq!(first.page_number, 1);
    assert_eq!(first.parent_context, "");

    // Page 2: the hierarchy restarts, so the header stands alone with no
    // parent carried over from page 1.
    let second = &records[1].metadata.chunk;
    assert_eq!(second.section_name, "Details");
    assert_eq!(second.page_number, 2);
    assert_eq!(second.parent_context, "");

    for record in &records {
        assert_eq!(record.metadata.job_id, "job-e2e");
        assert_eq!(record.metadata.file_id, "job-e2e_report.md");
        assert!(record.document_text.starts_with("Context: "));
    }
}

#[tokio::test]
async fn reprocessing_creates_fresh_records() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("doc.md");
    std::fs::write(&doc, "# Doc\n\nStable body text.\n").unwrap();

    let store = MemoryVectorStore::new();
    let pipeline = pipeline_with(store.clone(), &dir.path().join("results"));
    pipeline.run_job("job-a", &[doc.clone()]).await.unwrap();
    pipeline.run_job("job-b", &[doc]).await.unwrap();

    let records = store.records();
    assert_eq!(records.len(), 2);
    assert_ne!(records[0].id, records[1].id);
    assert_ne!(records[0].metadata.file_id, records[1].metadata.file_id);
    // Same input, same chunk either run.
    assert_eq!(records[0].document_text, records[1].document_text);
}

#[tokio::test]
async fn retrieval_respects_file_scoping() {
    let dir = tempfile::tempdir().unwrap();
    let invoices = dir.path().join("invoices.md");
    let shipping = dir.path().join("shipping.md");
    std::fs::write(&invoices, "# Invoices\n\nBilling cycles and late fees.\n").unwrap();
    std::fs::write(&shipping, "# Shipping\n\nBilling for freight and customs.\n").unwrap();

    let store = MemoryVectorStore::new();
    let pipeline = pipeline_with(store.clone(), &dir.path().join("results"));
    pipeline
        .run_job("job-s", &[invoices, shipping])
        .await
        .unwrap();

    let retriever = HybridRetriever::new(store);
    let scoped = SearchOptions::default().with_file_ids(vec!["job-s_shipping.md".into()]);
    let hits = retriever.search("billing", &scoped).await.unwrap();

    assert!(!hits.is_empty());
    assert!(hits.iter().all(|hit| hit.metadata.file_id == "job-s_shipping.md"));

    let context = retriever.retrieve_context("billing", &SearchOptions::default()).await;
    assert!(context.contains("File: invoices.md"));
    assert!(context.contains("File: shipping.md"));

    let files = retriever.list_files().await.unwrap();
    assert_eq!(files.len(), 2);
}

#[tokio::test]
async fn job_artifact_matches_returned_result() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("notes.md");
    std::fs::write(&doc, "# Notes\n\nA few lines of content.\n").unwrap();

    let pipeline = pipeline_with(MemoryVectorStore::new(), &dir.path().join("results"));
    let result = pipeline.run_job("job-art", &[doc]).await.unwrap();

    let loaded = pipeline.load_results("job-art").await.unwrap();
    assert_eq!(loaded.job_id, result.job_id);
    assert_eq!(loaded.total_chunks, result.total_chunks);
    assert_eq!(loaded.files.len(), result.files.len());
    assert_eq!(loaded.files[0].chunks.len(), result.files[0].chunks.len());
}
