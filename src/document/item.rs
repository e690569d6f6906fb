use serde::{Deserialize, Serialize};

/// Label attached to a parsed document item by the converter.
///
/// Converters that emit labels outside this set map them to [`Other`];
/// such items are kept as long as they carry text.
///
/// [`Other`]: ItemKind::Other
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Title,
    SectionHeader,
    Content,
    Table,
    Other,
}

impl ItemKind {
    /// Returns `true` for items that update the hierarchy snapshot.
    pub fn is_heading(&self) -> bool {
        matches!(self, ItemKind::Title | ItemKind::SectionHeader)
    }
}

/// One item from the converter's ordered output.
///
/// Produced once per document element and consumed exactly once by the
/// classifier. `pages` holds the provenance page numbers (1-indexed); the
/// effective page is the first entry, defaulting to 1 when provenance is
/// missing so grouping never produces a missing-page bucket.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParsedItem {
    pub kind: ItemKind,
    pub text: String,
    /// Structural depth as reported by the source.
    pub level: u32,
    /// Header nesting level; only meaningful for section headers.
    pub header_level: Option<u32>,
    /// Page provenance entries, 1-indexed. May be empty.
    pub pages: Vec<u32>,
    /// Structured markdown rendering, when the converter can provide one
    /// (tables in particular).
    pub markdown: Option<String>,
}

impl ParsedItem {
    pub fn new(kind: ItemKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            level: 0,
            header_level: None,
            pages: Vec::new(),
            markdown: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.pages.push(page);
        self
    }

    #[must_use]
    pub fn with_header_level(mut self, level: u32) -> Self {
        self.header_level = Some(level);
        self
    }

    #[must_use]
    pub fn with_markdown(mut self, markdown: impl Into<String>) -> Self {
        self.markdown = Some(markdown.into());
        self
    }

    /// Effective page number: first provenance entry, defaulting to 1.
    pub fn page_number(&self) -> u32 {
        self.pages.first().copied().unwrap_or(1)
    }

    /// Text used for chunking.
    ///
    /// Tables prefer their structured markdown rendering and fall back to
    /// plain text; everything else uses the plain text. Returns `None` when
    /// no non-blank text can be extracted, in which case the item is dropped
    /// before grouping.
    pub fn extracted_text(&self) -> Option<&str> {
        let candidate = match self.kind {
            ItemKind::Table => self
                .markdown
                .as_deref()
                .filter(|md| !md.trim().is_empty())
                .unwrap_or(&self.text),
            _ => &self.text,
        };
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}
