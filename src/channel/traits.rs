use crate::ingest::IncomingMedia;
use crate::storage::{FileRecord, MediaKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat id (numeric).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Message id within a chat (numeric).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

/// A previously sent message that can be edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Inline control attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

/// Cached-media answer to an inline query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineResult {
    pub id: String,
    #[serde(rename = "type")]
    pub result_type: String,
    pub kind: MediaKind,
    pub content_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl InlineResult {
    pub fn from_record(id: String, record: &FileRecord) -> Self {
        let title = if record.kind.inline_needs_title() {
            // Cached results with a title field reject an empty one.
            Some(
                record
                    .display_name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| " ".to_string()),
            )
        } else {
            None
        };
        Self {
            id,
            result_type: record.kind.inline_result_type().to_string(),
            kind: record.kind,
            content_ref: record.content_ref.clone(),
            title,
        }
    }
}

/// Inbound update from the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Text {
        owner_id: i64,
        text: String,
    },
    Media(IncomingMedia),
    InlineQuery {
        owner_id: i64,
        query_id: String,
        #[serde(default)]
        query: Option<String>,
    },
    Callback {
        owner_id: i64,
        callback_id: String,
        payload: String,
    },
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message; returns where it landed so it can be edited later.
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> anyhow::Result<MessageRef>;

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        buttons: &[Button],
    ) -> anyhow::Result<()>;

    /// Re-send a stored file by its fetch handle.
    async fn send_media(
        &self,
        chat: ChatId,
        kind: MediaKind,
        content_ref: &str,
    ) -> anyhow::Result<()>;

    async fn answer_inline(&self, query_id: &str, results: &[InlineResult]) -> anyhow::Result<()>;

    async fn ack_callback(&self, callback_id: &str) -> anyhow::Result<()>;
}
