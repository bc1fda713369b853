//! Tag frequency report
//!
//! Counts how often each tag appears across a user's files and renders the
//! ranking as a paged message with navigation controls. Navigation edits
//! the message that was sent first, found through the report's
//! correlation id.

pub mod payload;

pub use payload::{NavCommand, PayloadError};

use crate::cache::BoundedCache;
use crate::channel::{Button, ChatId, MessageRef, Messenger, Outbox};
use crate::storage::normalize::tokens;
use crate::storage::FileIndex;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: usize = 10;

pub const EMPTY_NOTICE: &str = "You have no tagged files yet.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Count every tag occurrence. Ordered by count descending, then by tag.
pub fn count_tags<'a, I>(tag_strings: I) -> Vec<TagCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tags in tag_strings {
        for tag in tokens(tags) {
            *counts.entry(tag).or_default() += 1;
        }
    }
    let mut ranked: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount { tag: tag.to_string(), count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    ranked
}

/// Tag counts for one owner, read straight from the registry.
pub fn tag_frequencies(index: &FileIndex, owner_id: i64) -> Result<Vec<TagCount>> {
    let tags = index.find_tags(owner_id)?;
    Ok(count_tags(tags.iter().map(String::as_str)))
}

/// Position of one page within a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub page: usize,
    pub last_page: usize,
    page_size: usize,
}

impl PageLayout {
    /// Clamps `requested` into `[0, last_page]`.
    pub fn new(total: usize, page_size: usize, requested: usize) -> Self {
        let page_size = page_size.max(1);
        let last_page = total.div_ceil(page_size).saturating_sub(1);
        Self {
            page: requested.min(last_page),
            last_page,
            page_size,
        }
    }

    pub fn first(&self) -> usize {
        0
    }

    pub fn previous(&self) -> usize {
        self.page.saturating_sub(1)
    }

    pub fn refresh(&self) -> usize {
        self.page
    }

    pub fn next(&self) -> usize {
        (self.page + 1).min(self.last_page)
    }

    pub fn last(&self) -> usize {
        self.last_page
    }

    /// Index range of this page's entries.
    pub fn range(&self, total: usize) -> std::ops::Range<usize> {
        let start = (self.page * self.page_size).min(total);
        start..(start + self.page_size).min(total)
    }
}

/// Build the message text and the five navigation controls for one page.
pub fn build_page(
    ranked: &[TagCount],
    layout: &PageLayout,
    correlation_id: Uuid,
) -> (String, Vec<Button>) {
    let mut text = format!("Top tags (page {} of {})\n", layout.page + 1, layout.last_page + 1);
    for entry in &ranked[layout.range(ranked.len())] {
        text.push_str(&format!("\n#{}: {}", entry.tag, entry.count));
    }

    let control = |label: &str, page: usize| Button {
        label: label.to_string(),
        payload: NavCommand::new(correlation_id, page).to_string(),
    };
    let buttons = vec![
        control("⏪", layout.first()),
        control("⬅️", layout.previous()),
        control("🔁", layout.refresh()),
        control("➡️", layout.next()),
        control("⏩", layout.last()),
    ];
    (text, buttons)
}

/// Report message per correlation id, bound to the owner it was sent to.
pub struct PageSessions {
    sessions: BoundedCache<Uuid, (i64, MessageRef)>,
}

impl PageSessions {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            sessions: BoundedCache::new(capacity, max_age),
        }
    }

    /// `None` unless the report exists and belongs to `owner_id`.
    pub fn get(&self, correlation_id: Uuid, owner_id: i64) -> Option<MessageRef> {
        match self.sessions.get(&correlation_id) {
            Some((owner, message)) if owner == owner_id => Some(message),
            _ => None,
        }
    }

    pub fn bind(&self, correlation_id: Uuid, owner_id: i64, message: MessageRef) {
        self.sessions.insert(correlation_id, (owner_id, message));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// No tags; the empty notice was shown.
    Empty,
    /// First render; a new message was sent and bound to the correlation id.
    Sent(MessageRef),
    /// An existing report message was edited in place.
    Edited(MessageRef),
    /// Unknown or foreign correlation id on a navigation request; nothing
    /// shown.
    Stale,
    /// Storage or transport failed; logged.
    Failed,
}

pub struct Paginator {
    index: FileIndex,
    sessions: Arc<PageSessions>,
    messenger: Arc<dyn Messenger>,
    outbox: Outbox,
    page_size: usize,
}

impl Paginator {
    pub fn new(
        index: FileIndex,
        sessions: Arc<PageSessions>,
        messenger: Arc<dyn Messenger>,
        outbox: Outbox,
        page_size: usize,
    ) -> Self {
        Self {
            index,
            sessions,
            messenger,
            outbox,
            page_size,
        }
    }

    pub fn compute_frequencies(&self, owner_id: i64) -> Result<Vec<TagCount>> {
        tag_frequencies(&self.index, owner_id)
    }

    /// Start a new report for `owner_id` at the first page.
    pub async fn start(&self, owner_id: i64) -> RenderOutcome {
        self.render(owner_id, 0, Uuid::new_v4(), true).await
    }

    pub async fn render(
        &self,
        owner_id: i64,
        page: usize,
        correlation_id: Uuid,
        is_initial: bool,
    ) -> RenderOutcome {
        let ranked = match self.compute_frequencies(owner_id) {
            Ok(ranked) => ranked,
            Err(e) => {
                error!(owner_id, "Failed to count tags: {e:#}");
                return RenderOutcome::Failed;
            }
        };
        let session = self.sessions.get(correlation_id, owner_id);

        let (text, buttons) = if ranked.is_empty() {
            (EMPTY_NOTICE.to_string(), Vec::new())
        } else {
            let layout = PageLayout::new(ranked.len(), self.page_size, page);
            build_page(&ranked, &layout, correlation_id)
        };

        if let Some(message) = session {
            let messenger = self.messenger.clone();
            self.outbox
                .submit("edit tag report", async move {
                    messenger.edit_text(message, &text, &buttons).await
                })
                .await;
            return if ranked.is_empty() {
                RenderOutcome::Empty
            } else {
                RenderOutcome::Edited(message)
            };
        }

        if !is_initial {
            debug!(owner_id, %correlation_id, "navigation for unknown report ignored");
            return RenderOutcome::Stale;
        }

        let sent = self
            .messenger
            .send_text(ChatId(owner_id), &text, &buttons)
            .await;
        match sent {
            Ok(_) if ranked.is_empty() => RenderOutcome::Empty,
            Ok(message) => {
                self.sessions.bind(correlation_id, owner_id, message);
                RenderOutcome::Sent(message)
            }
            Err(e) => {
                error!(owner_id, "Failed to send tag report: {e:#}");
                RenderOutcome::Failed
            }
        }
    }

    /// Handle a control activation. Malformed payloads are ignored; the
    /// activation is acknowledged either way.
    pub async fn handle_navigation(
        &self,
        owner_id: i64,
        callback_id: &str,
        payload: &str,
    ) -> Option<RenderOutcome> {
        let outcome = match payload.parse::<NavCommand>() {
            Ok(cmd) => Some(self.render(owner_id, cmd.page, cmd.correlation_id, false).await),
            Err(e) => {
                debug!(owner_id, "ignoring navigation payload {payload:?}: {e}");
                None
            }
        };
        let messenger = self.messenger.clone();
        let callback_id = callback_id.to_string();
        self.outbox
            .submit("acknowledge navigation", async move {
                messenger.ack_callback(&callback_id).await
            })
            .await;
        outcome
    }
}
