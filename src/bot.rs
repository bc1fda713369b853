//! Event dispatch
//!
//! Consumes inbound events one at a time, in delivery order, and routes
//! them to ingestion, search, or the tag report. Replies that nothing waits
//! on go through the outbox, which `run` drains before returning.

use crate::channel::{ChatId, InboundEvent, InlineResult, Messenger, Outbox};
use crate::config::Config;
use crate::ingest::{IncomingMedia, Ingestor, MediaGroupCoalescer, PendingTextBuffer, TagResolver};
use crate::report::{PageSessions, Paginator, RenderOutcome};
use crate::search::{SearchEngine, RANDOM_QUERY};
use crate::storage::normalize::hashtags;
use crate::storage::{FileIndex, UpsertOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

const HELP: &str = "Send me a photo, video, document, audio, GIF, sticker or voice message \
with a caption, or send a text first and then the file. The words become its tags.\n\n\
Find files again from any chat with an inline query: type the bot's name followed by tags. \
An empty query shows your latest files, * shows them in random order.\n\n\
Send a stored file again without a caption to remove it.\n\n\
/top - your most used tags\n/random - a random file from your stash\n/about - version";
const UNKNOWN_COMMAND: &str = "Unknown command. Try /help.";
const SAVED: &str = "Saved with tags:";
const REMOVED: &str = "Removed from your stash.";
const NEEDS_TAGS: &str = "Not saved: add a caption, or send a text message before the file.";
const SAVE_FAILED: &str = "Could not save the file right now, please try again.";
const REPORT_FAILED: &str = "Could not build the tag report right now.";
const NOTHING_STORED: &str = "Your stash is empty.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Top,
    Random,
    About,
    Unknown(String),
}

impl Command {
    /// `None` if `text` is not a command. Accepts a `@botname` suffix.
    fn parse(text: &str) -> Option<Self> {
        let name = text.trim().strip_prefix('/')?;
        let name = name.split_whitespace().next().unwrap_or_default();
        let name = name.split('@').next().unwrap_or_default().to_lowercase();
        Some(match name.as_str() {
            "start" | "help" => Command::Help,
            "top" => Command::Top,
            "random" => Command::Random,
            "about" => Command::About,
            _ => Command::Unknown(name),
        })
    }
}

pub struct Bot {
    pending: Arc<PendingTextBuffer>,
    ingestor: Ingestor,
    search: SearchEngine,
    report: Paginator,
    messenger: Arc<dyn Messenger>,
    outbox: Outbox,
}

impl Bot {
    pub fn new(config: &Config, index: FileIndex, messenger: Arc<dyn Messenger>) -> Self {
        let pending = Arc::new(PendingTextBuffer::new());
        let groups = Arc::new(MediaGroupCoalescer::new(
            config.media_groups.capacity,
            config.media_groups.max_age(),
        ));
        let sessions = Arc::new(PageSessions::new(
            config.report.sessions.capacity,
            config.report.sessions.max_age(),
        ));
        let outbox = Outbox::default();
        Self {
            ingestor: Ingestor::new(index.clone(), TagResolver::new(pending.clone(), groups)),
            search: SearchEngine::new(index.clone(), config.search.limit),
            report: Paginator::new(
                index,
                sessions,
                messenger.clone(),
                outbox.clone(),
                config.report.page_size,
            ),
            pending,
            messenger,
            outbox,
        }
    }

    /// Process events until the sender side closes, then wait for every
    /// pending reply.
    pub async fn run(&self, mut events: mpsc::Receiver<InboundEvent>) {
        info!("tagstash v{} started", env!("CARGO_PKG_VERSION"));
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!(pending = self.outbox.in_flight(), "event stream closed, flushing replies");
        self.flush().await;
    }

    /// Wait until every reply handed to the transport so far is done.
    pub async fn flush(&self) {
        self.outbox.drain().await;
    }

    pub async fn handle(&self, event: InboundEvent) {
        debug!(?event, "inbound");
        match event {
            InboundEvent::Text { owner_id, text } => self.on_text(owner_id, &text).await,
            InboundEvent::Media(media) => self.on_media(&media).await,
            InboundEvent::InlineQuery {
                owner_id,
                query_id,
                query,
            } => self.on_inline_query(owner_id, query_id, query.as_deref()).await,
            InboundEvent::Callback {
                owner_id,
                callback_id,
                payload,
            } => {
                self.report
                    .handle_navigation(owner_id, &callback_id, &payload)
                    .await;
            }
        }
    }

    async fn on_text(&self, owner_id: i64, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        match Command::parse(text) {
            None => self.pending.put(owner_id, text),
            Some(Command::Help) => self.reply(owner_id, HELP.to_string()).await,
            Some(Command::About) => {
                self.reply(owner_id, format!("tagstash v{}", env!("CARGO_PKG_VERSION")))
                    .await
            }
            Some(Command::Top) => match self.report.start(owner_id).await {
                RenderOutcome::Failed => self.reply(owner_id, REPORT_FAILED.to_string()).await,
                outcome => debug!(owner_id, ?outcome, "tag report"),
            },
            Some(Command::Random) => self.send_random(owner_id).await,
            Some(Command::Unknown(name)) => {
                debug!(owner_id, "unknown command /{name}");
                self.reply(owner_id, UNKNOWN_COMMAND.to_string()).await;
            }
        }
    }

    async fn on_media(&self, media: &IncomingMedia) {
        let owner_id = media.owner_id;
        let text = match self.ingestor.ingest(media) {
            Ok(ingested) => match (ingested.outcome, ingested.tags) {
                (UpsertOutcome::Saved, Some(tags)) => format!("{} {}", SAVED, hashtags(&tags)),
                (UpsertOutcome::Saved, None) | (UpsertOutcome::Skipped, _) => {
                    NEEDS_TAGS.to_string()
                }
                (UpsertOutcome::Deleted, _) => REMOVED.to_string(),
            },
            Err(e) => {
                error!(owner_id, "Failed to save file: {e:#}");
                SAVE_FAILED.to_string()
            }
        };
        self.reply(owner_id, text).await;
    }

    async fn on_inline_query(&self, owner_id: i64, query_id: String, query: Option<&str>) {
        let results: Vec<InlineResult> = self
            .search
            .search(owner_id, query)
            .iter()
            .map(|record| InlineResult::from_record(Uuid::new_v4().to_string(), record))
            .collect();
        let messenger = self.messenger.clone();
        self.outbox
            .submit("answer inline query", async move {
                messenger.answer_inline(&query_id, &results).await
            })
            .await;
    }

    async fn send_random(&self, owner_id: i64) {
        let Some(record) = self.search.search(owner_id, Some(RANDOM_QUERY)).into_iter().next()
        else {
            self.reply(owner_id, NOTHING_STORED.to_string()).await;
            return;
        };
        let messenger = self.messenger.clone();
        self.outbox
            .submit("send stored file", async move {
                messenger
                    .send_media(ChatId(owner_id), record.kind, &record.content_ref)
                    .await
            })
            .await;
    }

    async fn reply(&self, owner_id: i64, text: String) {
        let messenger = self.messenger.clone();
        self.outbox
            .submit("send message", async move {
                messenger
                    .send_text(ChatId(owner_id), &text, &[])
                    .await
                    .map(|_| ())
            })
            .await;
    }
}
