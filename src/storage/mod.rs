//! File registry
//!
//! Idempotent per-user storage of media references with their tags,
//! backed by SQLite and an FTS5 index over the tag column.

pub mod index;
pub mod normalize;
pub mod schema;

pub use index::FileIndex;
pub use normalize::normalize_tags;
pub use schema::{row_key, FileRecord, MediaKind, NewFile, UpsertOutcome};
