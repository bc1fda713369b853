use super::normalize::{normalize_tags, tokens};
use super::schema::{row_key, FileRecord, MediaKind, NewFile, UpsertOutcome};
use crate::search::TagIndex;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const RECORD_COLUMNS: &str =
    "row_key, owner_id, content_unique_id, content_ref, kind, tags, display_name, saved_at";

/// SQLite-backed file registry with an FTS5 index over tags.
#[derive(Clone)]
pub struct FileIndex {
    conn: Arc<Mutex<Connection>>,
}

impl FileIndex {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open {}", db_path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             PRAGMA cache_size   = -2000;
             PRAGMA temp_store   = MEMORY;",
        )?;

        Self::init_schema(&conn)?;
        debug!("file index opened at {}", db_path.display());
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                row_key            TEXT PRIMARY KEY,
                owner_id           INTEGER NOT NULL,
                content_unique_id  TEXT NOT NULL,
                content_ref        TEXT NOT NULL,
                kind               TEXT NOT NULL,
                tags               TEXT,
                display_name       TEXT,
                saved_at           INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_owner_saved ON files(owner_id, saved_at);

            CREATE VIRTUAL TABLE IF NOT EXISTS files_fts USING fts5(
                tags,
                content='files', content_rowid='rowid'
            );

            CREATE TRIGGER IF NOT EXISTS files_ai AFTER INSERT ON files BEGIN
                INSERT INTO files_fts(rowid, tags) VALUES (new.rowid, new.tags);
            END;

            CREATE TRIGGER IF NOT EXISTS files_ad AFTER DELETE ON files BEGIN
                INSERT INTO files_fts(files_fts, rowid, tags) VALUES ('delete', old.rowid, old.tags);
            END;

            CREATE TRIGGER IF NOT EXISTS files_au AFTER UPDATE ON files BEGIN
                INSERT INTO files_fts(files_fts, rowid, tags) VALUES ('delete', old.rowid, old.tags);
                INSERT INTO files_fts(rowid, tags) VALUES (new.rowid, new.tags);
            END;",
        )
        .context("Failed to init file index schema")?;
        Ok(())
    }

    /// Drop the `files` table so every later call fails like a lost backend.
    #[cfg(test)]
    pub(crate) fn break_storage(&self) {
        self.conn
            .lock()
            .execute_batch("DROP TABLE files")
            .expect("drop files table");
    }

    /// Store a file, stamped with the current time.
    pub fn upsert(&self, file: &NewFile<'_>) -> Result<UpsertOutcome> {
        self.upsert_at(file, Utc::now())
    }

    /// Store a file with an explicit `saved_at`.
    ///
    /// Blank tags remove an existing record instead of clearing its tags,
    /// and never create a new one.
    pub fn upsert_at(&self, file: &NewFile<'_>, saved_at: DateTime<Utc>) -> Result<UpsertOutcome> {
        let key = row_key(file.owner_id, file.content_unique_id);
        let tags = normalize_tags(file.tags);
        let conn = self.conn.lock();

        let Some(tags) = tags else {
            let removed = conn
                .execute("DELETE FROM files WHERE row_key = ?1", params![key])
                .context("Failed to delete file record")?;
            return Ok(if removed > 0 {
                UpsertOutcome::Deleted
            } else {
                UpsertOutcome::Skipped
            });
        };

        conn.execute(
            "INSERT INTO files (row_key, owner_id, content_unique_id, content_ref, kind,
             tags, display_name, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(row_key) DO UPDATE SET
                content_ref  = excluded.content_ref,
                kind         = excluded.kind,
                tags         = excluded.tags,
                display_name = excluded.display_name,
                saved_at     = excluded.saved_at",
            params![
                key,
                file.owner_id,
                file.content_unique_id,
                file.content_ref,
                file.kind.as_str(),
                tags,
                file.display_name,
                saved_at.timestamp_micros(),
            ],
        )
        .context("Failed to upsert file record")?;
        Ok(UpsertOutcome::Saved)
    }

    /// Newest records first.
    pub fn find_recent(&self, owner_id: i64, limit: usize) -> Result<Vec<FileRecord>> {
        self.query_owner(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM files WHERE owner_id = ?1
                 ORDER BY saved_at DESC LIMIT ?2"
            ),
            owner_id,
            limit,
        )
    }

    /// Records in random order. No ordering is stable across calls.
    pub fn find_random(&self, owner_id: i64, limit: usize) -> Result<Vec<FileRecord>> {
        self.query_owner(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM files WHERE owner_id = ?1
                 ORDER BY random() LIMIT ?2"
            ),
            owner_id,
            limit,
        )
    }

    pub fn find_by_exact_id(&self, key: &str) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM files WHERE row_key = ?1"),
            params![key],
            Self::row_to_record,
        )
        .optional()
        .context("Failed to load file record")
    }

    /// Every non-null tag string stored by `owner_id`.
    pub fn find_tags(&self, owner_id: i64) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT tags FROM files WHERE owner_id = ?1 AND tags IS NOT NULL")?;
        let rows = stmt.query_map(params![owner_id], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read tags")
    }

    fn query_owner(&self, sql: &str, owner_id: i64, limit: usize) -> Result<Vec<FileRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![owner_id, limit as i64], Self::row_to_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read file records")
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
        let kind: String = row.get(4)?;
        let kind = kind
            .parse::<MediaKind>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
        let micros: i64 = row.get(7)?;
        let saved_at = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
            rusqlite::Error::IntegralValueOutOfRange(7, micros)
        })?;
        Ok(FileRecord {
            row_key: row.get(0)?,
            owner_id: row.get(1)?,
            content_unique_id: row.get(2)?,
            content_ref: row.get(3)?,
            kind,
            tags: row.get(5)?,
            display_name: row.get(6)?,
            saved_at,
        })
    }
}

impl TagIndex for FileIndex {
    fn ranked_keys(&self, owner_id: i64, query: &str, limit: usize) -> Result<Vec<String>> {
        let Some(expr) = match_expression(query) else {
            return Ok(Vec::new());
        };
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT f.row_key
             FROM files_fts
             JOIN files f ON f.rowid = files_fts.rowid
             WHERE files_fts MATCH ?1 AND f.owner_id = ?2
             ORDER BY files_fts.rank
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![expr, owner_id, limit as i64], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .context("Full-text tag search failed")
    }
}

/// Build an FTS5 expression matching any of the query's tags. Every token is
/// quoted so user text is never parsed as FTS5 syntax.
fn match_expression(query: &str) -> Option<String> {
    let normalized = normalize_tags(Some(query))?;
    let terms: Vec<String> = tokens(&normalized)
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn index() -> (TempDir, FileIndex) {
        let tmp = TempDir::new().unwrap();
        let idx = FileIndex::open(&tmp.path().join("files.db")).unwrap();
        (tmp, idx)
    }

    fn file<'a>(owner_id: i64, unique: &'a str, tags: Option<&'a str>) -> NewFile<'a> {
        NewFile {
            owner_id,
            content_unique_id: unique,
            content_ref: "ref-1",
            kind: MediaKind::Photo,
            tags,
            display_name: None,
        }
    }

    #[test]
    fn upsert_twice_keeps_one_record() {
        let (_tmp, idx) = index();
        assert_eq!(idx.upsert(&file(1, "a", Some("cat"))).unwrap(), UpsertOutcome::Saved);
        assert_eq!(idx.upsert(&file(1, "a", Some("cat"))).unwrap(), UpsertOutcome::Saved);
        assert_eq!(idx.find_recent(1, 50).unwrap().len(), 1);
    }

    #[test]
    fn resubmission_overwrites_in_place() {
        let (_tmp, idx) = index();
        idx.upsert(&file(1, "a", Some("cat"))).unwrap();
        let mut again = file(1, "a", Some("  Dog  House "));
        again.content_ref = "ref-2";
        again.display_name = Some("dog.jpg");
        idx.upsert(&again).unwrap();

        let rec = idx.find_by_exact_id(&row_key(1, "a")).unwrap().unwrap();
        assert_eq!(rec.tags.as_deref(), Some("dog house"));
        assert_eq!(rec.content_ref, "ref-2");
        assert_eq!(rec.display_name.as_deref(), Some("dog.jpg"));
    }

    #[test]
    fn untagged_resubmission_deletes() {
        let (_tmp, idx) = index();
        idx.upsert(&file(1, "a", Some("cat"))).unwrap();
        assert_eq!(idx.upsert(&file(1, "a", None)).unwrap(), UpsertOutcome::Deleted);
        assert!(idx.find_by_exact_id(&row_key(1, "a")).unwrap().is_none());
        assert!(idx.ranked_keys(1, "cat", 50).unwrap().is_empty());
    }

    #[test]
    fn untagged_new_file_is_not_created() {
        let (_tmp, idx) = index();
        assert_eq!(idx.upsert(&file(1, "a", Some("   "))).unwrap(), UpsertOutcome::Skipped);
        assert!(idx.find_by_exact_id(&row_key(1, "a")).unwrap().is_none());
    }

    #[test]
    fn recent_orders_newest_first() {
        let (_tmp, idx) = index();
        let t0 = Utc::now();
        idx.upsert_at(&file(1, "old", Some("x")), t0).unwrap();
        idx.upsert_at(&file(1, "new", Some("x")), t0 + Duration::seconds(5)).unwrap();
        idx.upsert_at(&file(1, "mid", Some("x")), t0 + Duration::seconds(2)).unwrap();

        let keys: Vec<_> = idx
            .find_recent(1, 50)
            .unwrap()
            .into_iter()
            .map(|r| r.content_unique_id)
            .collect();
        assert_eq!(keys, vec!["new", "mid", "old"]);
    }

    #[test]
    fn accessors_are_owner_scoped() {
        let (_tmp, idx) = index();
        idx.upsert(&file(1, "a", Some("sunset"))).unwrap();
        idx.upsert(&file(2, "a", Some("sunset"))).unwrap();

        assert_eq!(idx.find_recent(1, 50).unwrap().len(), 1);
        assert_eq!(idx.find_random(2, 50).unwrap().len(), 1);
        assert_eq!(idx.ranked_keys(1, "sunset", 50).unwrap(), vec![row_key(1, "a")]);
        assert_eq!(idx.find_tags(2).unwrap(), vec!["sunset".to_string()]);
    }

    #[test]
    fn ranked_search_matches_tags_only() {
        let (_tmp, idx) = index();
        let mut named = file(1, "a", Some("beach"));
        named.display_name = Some("sunset.jpg");
        idx.upsert(&named).unwrap();
        idx.upsert(&file(1, "b", Some("sunset beach"))).unwrap();

        assert_eq!(idx.ranked_keys(1, "Sunset", 50).unwrap(), vec![row_key(1, "b")]);
    }

    #[test]
    fn fts_syntax_in_query_is_harmless() {
        let (_tmp, idx) = index();
        idx.upsert(&file(1, "a", Some("cat"))).unwrap();
        assert!(idx.ranked_keys(1, "\"cat* OR -(", 50).is_ok());
        assert!(idx.ranked_keys(1, "   ", 50).unwrap().is_empty());
    }

    #[test]
    fn lost_table_surfaces_errors() {
        let (_tmp, idx) = index();
        idx.upsert(&file(1, "a", Some("cat"))).unwrap();
        idx.break_storage();
        assert!(idx.upsert(&file(1, "b", Some("dog"))).is_err());
        assert!(idx.upsert(&file(1, "a", None)).is_err());
        assert!(idx.find_tags(1).is_err());
        assert!(idx.find_recent(1, 50).is_err());
    }

    #[test]
    fn match_expression_quotes_tokens() {
        assert_eq!(match_expression("a \"b"), Some("\"a\" OR \"\"\"b\"".to_string()));
        assert_eq!(match_expression(""), None);
        assert_eq!(match_expression("-( *"), None);
    }
}
