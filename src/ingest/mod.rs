//! Media ingestion
//!
//! Resolves the effective tags for an uploaded file from the user's pending
//! text, the file's caption, or its media group, then stores it.

pub mod media_group;
pub mod pending;

pub use media_group::MediaGroupCoalescer;
pub use pending::PendingTextBuffer;

use crate::storage::{normalize_tags, FileIndex, MediaKind, NewFile, UpsertOutcome};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// An uploaded media item as delivered by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMedia {
    pub owner_id: i64,
    pub kind: MediaKind,
    pub content_unique_id: String,
    pub content_ref: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub media_group_id: Option<String>,
}

/// What happened to an ingested file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    pub outcome: UpsertOutcome,
    pub tags: Option<String>,
}

/// Picks the tag string for an upload.
pub struct TagResolver {
    pending: Arc<PendingTextBuffer>,
    groups: Arc<MediaGroupCoalescer>,
}

impl TagResolver {
    pub fn new(pending: Arc<PendingTextBuffer>, groups: Arc<MediaGroupCoalescer>) -> Self {
        Self { pending, groups }
    }

    /// Pending text first, then the caption, then the media group binding.
    /// A captioned group item always seeds the binding for its siblings; an
    /// uncaptioned one seeds it with the pending text it consumed.
    pub fn resolve(&self, media: &IncomingMedia) -> Option<String> {
        let pending = self
            .pending
            .take(media.owner_id)
            .and_then(|t| normalize_tags(Some(&t)));
        let caption = normalize_tags(media.caption.as_deref());

        if let Some(group) = media.media_group_id.as_deref() {
            if let Some(seed) = caption.as_deref().or(pending.as_deref()) {
                self.groups.bind(group, seed);
            }
        }

        pending.or(caption).or_else(|| {
            media
                .media_group_id
                .as_deref()
                .and_then(|g| self.groups.lookup(g))
                .and_then(|t| normalize_tags(Some(&t)))
        })
    }
}

/// Resolves tags and writes the file to the registry.
pub struct Ingestor {
    index: FileIndex,
    resolver: TagResolver,
}

impl Ingestor {
    pub fn new(index: FileIndex, resolver: TagResolver) -> Self {
        Self { index, resolver }
    }

    pub fn ingest(&self, media: &IncomingMedia) -> Result<Ingested> {
        let tags = self.resolver.resolve(media);
        let outcome = self.index.upsert(&NewFile {
            owner_id: media.owner_id,
            content_unique_id: &media.content_unique_id,
            content_ref: &media.content_ref,
            kind: media.kind,
            tags: tags.as_deref(),
            display_name: media.display_name.as_deref(),
        })?;
        debug!(
            owner_id = media.owner_id,
            kind = %media.kind,
            ?outcome,
            "ingested {}",
            media.content_unique_id
        );
        Ok(Ingested { outcome, tags })
    }
}
