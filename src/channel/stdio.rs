use super::traits::{Button, ChatId, InboundEvent, InlineResult, MessageId, MessageRef, Messenger};
use crate::storage::MediaKind;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

/// One outbound request, written as a single JSON line.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundAction<'a> {
    SendText {
        chat_id: ChatId,
        message_id: MessageId,
        text: &'a str,
        buttons: &'a [Button],
    },
    EditText {
        chat_id: ChatId,
        message_id: MessageId,
        text: &'a str,
        buttons: &'a [Button],
    },
    SendMedia {
        chat_id: ChatId,
        method: &'static str,
        kind: MediaKind,
        content_ref: &'a str,
    },
    AnswerInline {
        query_id: &'a str,
        results: &'a [InlineResult],
    },
    AckCallback {
        callback_id: &'a str,
    },
}

/// Messenger that emits JSON lines to a writer. Message ids are assigned
/// locally since there is no remote side to assign them.
pub struct JsonLinesMessenger<W> {
    out: Mutex<W>,
    next_message_id: AtomicI64,
}

pub type StdioMessenger = JsonLinesMessenger<Stdout>;

impl StdioMessenger {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesMessenger<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            next_message_id: AtomicI64::new(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    async fn emit(&self, action: &OutboundAction<'_>) -> Result<()> {
        let mut line = serde_json::to_vec(action).context("Failed to encode outbound action")?;
        line.push(b'\n');
        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<W> Messenger for JsonLinesMessenger<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_text(&self, chat: ChatId, text: &str, buttons: &[Button]) -> Result<MessageRef> {
        let message_id = MessageId(self.next_message_id.fetch_add(1, Ordering::Relaxed));
        self.emit(&OutboundAction::SendText {
            chat_id: chat,
            message_id,
            text,
            buttons,
        })
        .await?;
        Ok(MessageRef {
            chat_id: chat,
            message_id,
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str, buttons: &[Button]) -> Result<()> {
        self.emit(&OutboundAction::EditText {
            chat_id: message.chat_id,
            message_id: message.message_id,
            text,
            buttons,
        })
        .await
    }

    async fn send_media(&self, chat: ChatId, kind: MediaKind, content_ref: &str) -> Result<()> {
        self.emit(&OutboundAction::SendMedia {
            chat_id: chat,
            method: kind.send_method(),
            kind,
            content_ref,
        })
        .await
    }

    async fn answer_inline(&self, query_id: &str, results: &[InlineResult]) -> Result<()> {
        self.emit(&OutboundAction::AnswerInline { query_id, results })
            .await
    }

    async fn ack_callback(&self, callback_id: &str) -> Result<()> {
        self.emit(&OutboundAction::AckCallback { callback_id }).await
    }
}

/// Read one JSON event per line and forward it. Malformed lines are skipped.
/// Returns when the input ends or the receiver is dropped.
pub async fn read_events<R>(input: R, tx: mpsc::Sender<InboundEvent>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read event")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundEvent>(line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Skipping malformed event: {e}"),
        }
    }
    Ok(())
}
