use tracing::debug;

use crate::document::{ClassifiedItem, Hierarchy};

/// A contiguous run of content sharing one hierarchy snapshot on one page.
///
/// Owned by the grouper while a page is processed; opened when a heading is
/// seen or the page begins, closed when the next heading appears or the page
/// ends.
#[derive(Clone, Debug)]
pub struct SectionBlock {
    pub hierarchy: Hierarchy,
    pub content_parts: Vec<String>,
    pub level: u32,
    pub section_name: String,
    pub chapter_name: String,
    pub page_number: u32,
}

impl SectionBlock {
    fn new(hierarchy: Hierarchy, page_number: u32) -> Self {
        let mut block = Self {
            hierarchy,
            content_parts: Vec::new(),
            level: 0,
            section_name: String::new(),
            chapter_name: String::new(),
            page_number,
        };
        block.derive_names();
        block
    }

    /// Adopts a hierarchy after the fact; used when the block started before
    /// any hierarchy-bearing item was seen on the page.
    fn adopt_hierarchy(&mut self, hierarchy: &Hierarchy) {
        self.hierarchy = hierarchy.clone();
        self.derive_names();
    }

    fn derive_names(&mut self) {
        match self.hierarchy.deepest() {
            Some((level, title)) => {
                self.level = level;
                self.section_name = title.to_string();
            }
            None => {
                self.level = 0;
                self.section_name = format!("Page {}", self.page_number);
            }
        }
        self.chapter_name = self.hierarchy.get(0).unwrap_or_default().to_string();
    }

    pub fn has_content(&self) -> bool {
        !self.content_parts.is_empty()
    }

    /// Block text with fragments separated by blank lines.
    pub fn joined_content(&self) -> String {
        self.content_parts.join("\n\n")
    }
}

/// Groups one page's classified items into ordered section blocks.
///
/// Headings close the current block (when it has content) and open a new one
/// carrying the heading text as the first fragment, so header-only sections
/// are never lost. Content items append to the current block, adopting their
/// hierarchy when the block has none yet. Consecutive headings intentionally
/// produce back-to-back header-only blocks.
pub fn group_page(page_number: u32, items: &[ClassifiedItem]) -> Vec<SectionBlock> {
    let Some(first) = items.first() else {
        debug!(page = page_number, "page has no classified items, skipping");
        return Vec::new();
    };

    let mut blocks = Vec::new();
    let mut current = SectionBlock::new(first.hierarchy.clone(), page_number);

    for item in items {
        if item.is_heading() {
            if current.has_content() {
                blocks.push(current);
            }
            current = SectionBlock::new(item.hierarchy.clone(), page_number);
            current.content_parts.push(item.text.clone());
        } else {
            if current.hierarchy.is_empty() && !item.hierarchy.is_empty() {
                current.adopt_hierarchy(&item.hierarchy);
            }
            current.content_parts.push(item.text.clone());
        }
    }
    if current.has_content() {
        blocks.push(current);
    }
    blocks
}
