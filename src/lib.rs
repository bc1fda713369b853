//! tagstash: a per-user media stash for chat bots.
//!
//! Files sent to the bot are stored by reference with the free-text tags
//! that came with them, and found again by recency, at random, or by
//! ranked tag search.

pub mod bot;
pub mod cache;
pub mod channel;
pub mod config;
pub mod ingest;
pub mod report;
pub mod search;
pub mod storage;

pub use bot::Bot;
pub use config::Config;
pub use search::SearchEngine;
pub use storage::{FileIndex, FileRecord, MediaKind};
