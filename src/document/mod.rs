//! Parsed-item model, classification, and hierarchy tracking.
//!
//! A [`DocumentConverter`] turns a source file into a flat, ordered stream of
//! [`ParsedItem`]s. The classifier walks that stream page by page, attaching
//! a copy of the hierarchy snapshot to every item; headings update the
//! snapshot first and carry their own entry.

mod classifier;
mod convert;
mod hierarchy;
mod item;
pub mod markdown;

pub use classifier::{classify_item, classify_page, ClassifiedItem};
pub use convert::DocumentConverter;
pub use hierarchy::Hierarchy;
pub use item::{ItemKind, ParsedItem};
pub use markdown::MarkdownConverter;
