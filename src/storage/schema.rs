use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of stored media. Closed set; every transport mapping matches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Animation,
    Sticker,
    Voice,
}

impl MediaKind {
    pub const ALL: [MediaKind; 7] = [
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::Document,
        MediaKind::Audio,
        MediaKind::Animation,
        MediaKind::Sticker,
        MediaKind::Voice,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Animation => "animation",
            MediaKind::Sticker => "sticker",
            MediaKind::Voice => "voice",
        }
    }

    /// Bot API method used to re-send a stored file of this kind.
    pub fn send_method(self) -> &'static str {
        match self {
            MediaKind::Photo => "sendPhoto",
            MediaKind::Video => "sendVideo",
            MediaKind::Document => "sendDocument",
            MediaKind::Audio => "sendAudio",
            MediaKind::Animation => "sendAnimation",
            MediaKind::Sticker => "sendSticker",
            MediaKind::Voice => "sendVoice",
        }
    }

    /// Cached inline result type for this kind.
    pub fn inline_result_type(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Animation => "gif",
            MediaKind::Sticker => "sticker",
            MediaKind::Voice => "voice",
        }
    }

    /// Whether the cached inline result requires a title.
    pub fn inline_needs_title(self) -> bool {
        matches!(
            self,
            MediaKind::Video | MediaKind::Document | MediaKind::Voice
        )
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown media kind: {0}")]
pub struct UnknownMediaKind(pub String);

impl FromStr for MediaKind {
    type Err = UnknownMediaKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownMediaKind(s.to_string()))
    }
}

/// A stored file owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub row_key: String,
    pub owner_id: i64,
    pub content_unique_id: String,
    pub content_ref: String,
    pub kind: MediaKind,
    pub tags: Option<String>,
    pub display_name: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// Primary key for an (owner, content) pair. Deterministic; the separator
/// keeps owner `1` + `2a` apart from owner `12` + `a`.
pub fn row_key(owner_id: i64, content_unique_id: &str) -> String {
    format!("{}:{}", owner_id, content_unique_id)
}

/// A media item as submitted for storage.
#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub owner_id: i64,
    pub content_unique_id: &'a str,
    pub content_ref: &'a str,
    pub kind: MediaKind,
    pub tags: Option<&'a str>,
    pub display_name: Option<&'a str>,
}

/// Result of a registry upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Record written with tags.
    Saved,
    /// Untagged resubmission of a stored file; the record was removed.
    Deleted,
    /// Untagged submission of an unknown file; nothing stored.
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_key_is_deterministic() {
        assert_eq!(row_key(42, "AQAD"), "42:AQAD");
        assert_ne!(row_key(1, "2a"), row_key(12, "a"));
        assert_eq!(row_key(42, "AQAD"), row_key(42, "AQAD"));
        assert_ne!(row_key(42, "AQAD"), row_key(43, "AQAD"));
    }

    #[test]
    fn kind_parses_its_own_name() {
        for kind in MediaKind::ALL {
            assert_eq!(kind.as_str().parse::<MediaKind>().unwrap(), kind);
        }
        assert!("gif".parse::<MediaKind>().is_err());
    }

    #[test]
    fn animation_is_served_as_gif() {
        assert_eq!(MediaKind::Animation.inline_result_type(), "gif");
        assert_eq!(MediaKind::Animation.send_method(), "sendAnimation");
    }
}
