//! Tag lookup over a user's files: recent, random, or ranked by relevance.

use crate::storage::{FileIndex, FileRecord};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error};

/// Query that selects random order instead of a tag match.
pub const RANDOM_QUERY: &str = "*";

/// Upper bound on one lookup; inline answers carry at most this many results.
pub const MAX_RESULTS: usize = 50;

/// Full-text ranking over the `tags` column, scoped to one owner.
/// Returns row keys, most relevant first.
pub trait TagIndex: Send + Sync {
    fn ranked_keys(&self, owner_id: i64, query: &str, limit: usize) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode<'a> {
    Recent,
    Random,
    Ranked(&'a str),
}

impl<'a> SearchMode<'a> {
    pub fn from_query(query: Option<&'a str>) -> Self {
        match query.map(str::trim) {
            None | Some("") => SearchMode::Recent,
            Some(RANDOM_QUERY) => SearchMode::Random,
            Some(q) => SearchMode::Ranked(q),
        }
    }
}

pub struct SearchEngine {
    files: FileIndex,
    tags: Arc<dyn TagIndex>,
    limit: usize,
}

impl SearchEngine {
    pub fn new(files: FileIndex, limit: usize) -> Self {
        let tags: Arc<dyn TagIndex> = Arc::new(files.clone());
        Self::with_index(files, tags, limit)
    }

    /// `limit` is clamped to `1..=MAX_RESULTS`.
    pub fn with_index(files: FileIndex, tags: Arc<dyn TagIndex>, limit: usize) -> Self {
        Self {
            files,
            tags,
            limit: limit.clamp(1, MAX_RESULTS),
        }
    }

    /// Never fails: backend errors are logged and yield no results.
    pub fn search(&self, owner_id: i64, query: Option<&str>) -> Vec<FileRecord> {
        let mode = SearchMode::from_query(query);
        match self.try_search(owner_id, mode) {
            Ok(found) => {
                debug!(owner_id, ?mode, hits = found.len(), "search");
                found
            }
            Err(e) => {
                error!(owner_id, ?mode, "Failed to find files: {e:#}");
                Vec::new()
            }
        }
    }

    fn try_search(&self, owner_id: i64, mode: SearchMode<'_>) -> Result<Vec<FileRecord>> {
        match mode {
            SearchMode::Recent => self.files.find_recent(owner_id, self.limit),
            SearchMode::Random => self.files.find_random(owner_id, self.limit),
            SearchMode::Ranked(query) => {
                let keys = self.tags.ranked_keys(owner_id, query, self.limit)?;
                let mut found = Vec::with_capacity(keys.len());
                for key in keys {
                    if let Some(record) = self.files.find_by_exact_id(&key)? {
                        if record.owner_id == owner_id {
                            found.push(record);
                        }
                    }
                }
                found.truncate(self.limit);
                Ok(found)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MediaKind, NewFile};
    use chrono::{Duration, Utc};
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct BrokenIndex;

    impl TagIndex for BrokenIndex {
        fn ranked_keys(&self, _: i64, _: &str, _: usize) -> Result<Vec<String>> {
            anyhow::bail!("index offline")
        }
    }

    /// Returns a key owned by someone else, as a misbehaving index might.
    struct LeakyIndex(String);

    impl TagIndex for LeakyIndex {
        fn ranked_keys(&self, _: i64, _: &str, _: usize) -> Result<Vec<String>> {
            Ok(vec![self.0.clone()])
        }
    }

    fn seeded() -> (TempDir, FileIndex) {
        let tmp = TempDir::new().unwrap();
        let idx = FileIndex::open(&tmp.path().join("files.db")).unwrap();
        let t0 = Utc::now();
        let rows = [
            ("a", "sunset beach", 0),
            ("b", "cat", 1),
            ("c", "sunset sunset", 2),
            ("d", "dog", 3),
        ];
        for (unique, tags, offset) in rows {
            idx.upsert_at(
                &NewFile {
                    owner_id: 1,
                    content_unique_id: unique,
                    content_ref: unique,
                    kind: MediaKind::Photo,
                    tags: Some(tags),
                    display_name: None,
                },
                t0 + Duration::seconds(offset),
            )
            .unwrap();
        }
        (tmp, idx)
    }

    fn uniques(records: &[FileRecord]) -> Vec<&str> {
        records.iter().map(|r| r.content_unique_id.as_str()).collect()
    }

    #[test]
    fn mode_selection() {
        assert_eq!(SearchMode::from_query(None), SearchMode::Recent);
        assert_eq!(SearchMode::from_query(Some("  ")), SearchMode::Recent);
        assert_eq!(SearchMode::from_query(Some(" * ")), SearchMode::Random);
        assert_eq!(SearchMode::from_query(Some("sunset")), SearchMode::Ranked("sunset"));
    }

    #[test]
    fn blank_query_returns_recent_first() {
        let (_tmp, idx) = seeded();
        let engine = SearchEngine::new(idx, 50);
        assert_eq!(uniques(&engine.search(1, None)), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn star_returns_the_same_set() {
        let (_tmp, idx) = seeded();
        let engine = SearchEngine::new(idx, 50);
        let found = engine.search(1, Some("*"));
        let set: HashSet<_> = uniques(&found).into_iter().collect();
        assert_eq!(set, HashSet::from(["a", "b", "c", "d"]));
    }

    #[test]
    fn ranked_returns_only_matches() {
        let (_tmp, idx) = seeded();
        let engine = SearchEngine::new(idx, 50);
        let found = engine.search(1, Some("sunset"));
        assert_eq!(uniques(&found), vec!["c", "a"]);
        assert!(engine.search(2, Some("sunset")).is_empty());
    }

    #[test]
    fn results_are_capped() {
        let (_tmp, idx) = seeded();
        let engine = SearchEngine::new(idx, 2);
        assert_eq!(engine.search(1, None).len(), 2);
        assert_eq!(engine.search(1, Some("*")).len(), 2);
    }

    #[test]
    fn oversized_limit_is_clamped_to_fifty() {
        let tmp = TempDir::new().unwrap();
        let idx = FileIndex::open(&tmp.path().join("files.db")).unwrap();
        for i in 0..80 {
            let unique = format!("p{i}");
            idx.upsert(&NewFile {
                owner_id: 1,
                content_unique_id: &unique,
                content_ref: &unique,
                kind: MediaKind::Photo,
                tags: Some("holiday"),
                display_name: None,
            })
            .unwrap();
        }
        let engine = SearchEngine::new(idx, 200);
        assert_eq!(engine.search(1, None).len(), MAX_RESULTS);
        assert_eq!(engine.search(1, Some("*")).len(), MAX_RESULTS);
        assert_eq!(engine.search(1, Some("holiday")).len(), MAX_RESULTS);
        assert_eq!(SearchEngine::new(engine.files.clone(), 0).search(1, None).len(), 1);
    }

    #[test]
    fn index_failure_yields_nothing() {
        let (_tmp, idx) = seeded();
        let engine = SearchEngine::with_index(idx, Arc::new(BrokenIndex), 50);
        assert!(engine.search(1, Some("sunset")).is_empty());
        assert_eq!(engine.search(1, None).len(), 4);
    }

    #[test]
    fn foreign_keys_from_index_are_dropped() {
        let (_tmp, idx) = seeded();
        let engine =
            SearchEngine::with_index(idx, Arc::new(LeakyIndex(crate::storage::row_key(1, "a"))), 50);
        assert!(engine.search(2, Some("sunset")).is_empty());
    }
}
