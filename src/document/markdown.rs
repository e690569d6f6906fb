//! Markdown file converter.
//!
//! A deliberately small [`DocumentConverter`] for local ingestion and tests:
//! ATX headings become title/header items, pipe tables become table items
//! with their markdown rendering preserved, and form-feed characters mark
//! page breaks. Production deployments plug in a converter backed by a real
//! document-understanding service behind the same trait.

use std::path::Path;

use tracing::debug;

use crate::types::PipelineError;

use super::{DocumentConverter, ItemKind, ParsedItem};

/// Parses markdown files into [`ParsedItem`]s.
#[derive(Clone, Debug, Default)]
pub struct MarkdownConverter;

impl MarkdownConverter {
    pub fn new() -> Self {
        Self
    }

    /// Parses markdown text directly; useful when the content is already in
    /// memory.
    pub fn parse(&self, content: &str) -> Vec<ParsedItem> {
        let mut items = Vec::new();
        let mut page = 1u32;
        let mut seen_heading = false;
        let mut paragraph: Vec<&str> = Vec::new();
        let mut table: Vec<&str> = Vec::new();

        let flush_paragraph = |buf: &mut Vec<&str>, items: &mut Vec<ParsedItem>, page: u32| {
            if buf.is_empty() {
                return;
            }
            let text = buf.join("\n");
            buf.clear();
            items.push(ParsedItem::new(ItemKind::Content, text).with_page(page));
        };
        let flush_table = |buf: &mut Vec<&str>, items: &mut Vec<ParsedItem>, page: u32| {
            if buf.is_empty() {
                return;
            }
            let markdown = buf.join("\n");
            let text = table_plain_text(buf);
            buf.clear();
            items.push(
                ParsedItem::new(ItemKind::Table, text)
                    .with_markdown(markdown)
                    .with_page(page),
            );
        };

        for raw_line in content.lines() {
            if raw_line.contains('\u{0C}') {
                flush_paragraph(&mut paragraph, &mut items, page);
                flush_table(&mut table, &mut items, page);
                page += 1;
                continue;
            }
            let line = raw_line.trim_end();

            if let Some((depth, heading)) = parse_heading(line) {
                flush_paragraph(&mut paragraph, &mut items, page);
                flush_table(&mut table, &mut items, page);
                let item = if depth == 1 && !seen_heading {
                    ParsedItem::new(ItemKind::Title, heading).with_page(page)
                } else {
                    ParsedItem::new(ItemKind::SectionHeader, heading)
                        .with_header_level(depth.saturating_sub(1).max(1))
                        .with_page(page)
                };
                seen_heading = true;
                items.push(item);
                continue;
            }

            if line.trim_start().starts_with('|') {
                flush_paragraph(&mut paragraph, &mut items, page);
                table.push(line);
                continue;
            }
            flush_table(&mut table, &mut items, page);

            if line.trim().is_empty() {
                flush_paragraph(&mut paragraph, &mut items, page);
            } else {
                paragraph.push(line);
            }
        }
        flush_paragraph(&mut paragraph, &mut items, page);
        flush_table(&mut table, &mut items, page);

        debug!(items = items.len(), pages = page, "parsed markdown document");
        items
    }
}

impl DocumentConverter for MarkdownConverter {
    fn convert(&self, path: &Path) -> Result<Vec<ParsedItem>, PipelineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| PipelineError::Conversion(format!("{}: {err}", path.display())))?;
        Ok(self.parse(&content))
    }
}

fn parse_heading(line: &str) -> Option<(u32, String)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') && !rest.is_empty() {
        return None;
    }
    Some((hashes as u32, rest.trim().to_string()))
}

/// Cell text of a pipe table with separator rows removed.
fn table_plain_text(lines: &[&str]) -> String {
    lines
        .iter()
        .filter_map(|line| {
            let cells: Vec<&str> = line
                .trim()
                .trim_matches('|')
                .split('|')
                .map(str::trim)
                .filter(|cell| !cell.is_empty())
                .collect();
            if cells.is_empty() || cells.iter().all(|cell| is_separator_cell(cell)) {
                None
            } else {
                Some(cells.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_separator_cell(cell: &str) -> bool {
    !cell.is_empty() && cell.chars().all(|c| matches!(c, '-' | ':' | ' '))
}
