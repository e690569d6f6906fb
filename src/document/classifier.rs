use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Hierarchy, ItemKind, ParsedItem};

/// A parsed item with its extracted text, effective page number, and a copy
/// of the hierarchy snapshot.
///
/// Heading items carry the snapshot including their own entry, so a block
/// opened at a header is named by that header. Content, table, and other
/// items never mutate the snapshot and carry it as it stood when they were
/// seen.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub kind: ItemKind,
    pub text: String,
    pub page_number: u32,
    pub hierarchy: Hierarchy,
}

impl ClassifiedItem {
    pub fn is_heading(&self) -> bool {
        self.kind.is_heading()
    }
}

/// Classifies one item against the current snapshot.
///
/// Pure transformation: the input snapshot is consumed and the updated one
/// returned, so no hidden shared state threads through iteration. Items with
/// no extractable text yield no classified item.
pub fn classify_item(
    mut snapshot: Hierarchy,
    item: &ParsedItem,
) -> (Hierarchy, Option<ClassifiedItem>) {
    let extracted = item.extracted_text().map(str::to_string);

    match item.kind {
        ItemKind::Title => {
            if let Some(text) = extracted.as_deref() {
                snapshot.apply_title(text);
            }
        }
        ItemKind::SectionHeader => {
            // Empty header text skips the snapshot update; the item is still
            // classified as a header below.
            if let Some(text) = extracted.as_deref() {
                snapshot.apply_header(item.header_level.unwrap_or(1), text);
            }
        }
        ItemKind::Content | ItemKind::Table | ItemKind::Other => {}
    }

    let classified = match extracted {
        Some(text) => Some(ClassifiedItem {
            kind: item.kind,
            text,
            page_number: item.page_number(),
            hierarchy: snapshot.clone(),
        }),
        None => {
            debug!(kind = ?item.kind, page = item.page_number(), "dropping item with no text");
            None
        }
    };

    (snapshot, classified)
}

/// Classifies one page's items in order, starting from a fresh snapshot.
///
/// The snapshot is page-scoped: section context does not leak across page
/// boundaries, which is what makes the grouper's "Page N" fallback reachable
/// for pages whose section started earlier.
pub fn classify_page(items: &[ParsedItem]) -> Vec<ClassifiedItem> {
    let mut snapshot = Hierarchy::new();
    let mut classified = Vec::with_capacity(items.len());
    for item in items {
        let (next, maybe_item) = classify_item(snapshot, item);
        snapshot = next;
        if let Some(item) = maybe_item {
            classified.push(item);
        }
    }
    classified
}
