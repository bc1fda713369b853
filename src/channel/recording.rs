//! In-memory `Messenger` that records every outbound action.

use super::traits::{Button, ChatId, InlineResult, MessageId, MessageRef, Messenger};
use crate::storage::MediaKind;
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat: ChatId,
        text: String,
        buttons: Vec<Button>,
    },
    Edit {
        message: MessageRef,
        text: String,
        buttons: Vec<Button>,
    },
    Media {
        chat: ChatId,
        kind: MediaKind,
        content_ref: String,
    },
    Inline {
        query_id: String,
        results: Vec<InlineResult>,
    },
    Ack {
        callback_id: String,
    },
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    next_id: Mutex<i64>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> anyhow::Result<MessageRef> {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };
        self.sent.lock().push(Sent::Text {
            chat,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(MessageRef {
            chat_id: chat,
            message_id: MessageId(id),
        })
    }

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        buttons: &[Button],
    ) -> anyhow::Result<()> {
        self.sent.lock().push(Sent::Edit {
            message,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }

    async fn send_media(
        &self,
        chat: ChatId,
        kind: MediaKind,
        content_ref: &str,
    ) -> anyhow::Result<()> {
        self.sent.lock().push(Sent::Media {
            chat,
            kind,
            content_ref: content_ref.to_string(),
        });
        Ok(())
    }

    async fn answer_inline(&self, query_id: &str, results: &[InlineResult]) -> anyhow::Result<()> {
        self.sent.lock().push(Sent::Inline {
            query_id: query_id.to_string(),
            results: results.to_vec(),
        });
        Ok(())
    }

    async fn ack_callback(&self, callback_id: &str) -> anyhow::Result<()> {
        self.sent.lock().push(Sent::Ack {
            callback_id: callback_id.to_string(),
        });
        Ok(())
    }
}
