use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered mapping from nesting level to section title.
///
/// Level 0 is the document or chapter title. The snapshot is mutated while
/// walking one page's items in order and is never shared across pages or
/// documents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hierarchy {
    levels: BTreeMap<u32, String>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn get(&self, level: u32) -> Option<&str> {
        self.levels.get(&level).map(String::as_str)
    }

    /// Entries ordered by level ascending.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &str)> {
        self.levels.iter().map(|(level, title)| (*level, title.as_str()))
    }

    /// Deepest (highest-level) entry, if any.
    pub fn deepest(&self) -> Option<(u32, &str)> {
        self.levels
            .iter()
            .next_back()
            .map(|(level, title)| (*level, title.as_str()))
    }

    /// Shallowest entry; the chapter title when level 0 is present.
    pub fn shallowest(&self) -> Option<(u32, &str)> {
        self.levels
            .iter()
            .next()
            .map(|(level, title)| (*level, title.as_str()))
    }

    /// A title resets the snapshot to `{0: title}`.
    pub fn apply_title(&mut self, title: &str) {
        self.levels.clear();
        self.levels.insert(0, title.to_string());
    }

    /// A header at `level` removes every entry at that level or deeper, then
    /// inserts its own title. Empty header text leaves the snapshot unchanged.
    pub fn apply_header(&mut self, level: u32, title: &str) {
        if title.trim().is_empty() {
            return;
        }
        self.levels.retain(|existing, _| *existing < level);
        self.levels.insert(level, title.to_string());
    }

    /// Joins titles ascending by level, e.g. `"Doc > Ch1 > Sec1"`.
    pub fn joined_path(&self) -> String {
        self.levels
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" > ")
    }

    /// Same as [`joined_path`](Self::joined_path) but excluding the deepest
    /// entry. Empty when the snapshot has at most one entry.
    pub fn parent_path(&self) -> String {
        if self.levels.len() <= 1 {
            return String::new();
        }
        let count = self.levels.len() - 1;
        self.levels
            .values()
            .take(count)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

impl FromIterator<(u32, String)> for Hierarchy {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            levels: iter.into_iter().collect(),
        }
    }
}
