//! Chat transport seam: inbound events, the outbound `Messenger` trait, a
//! bounded outbox for replies nothing waits on, and a JSON-lines stdio
//! adapter.

pub mod outbox;
#[cfg(test)]
pub mod recording;
pub mod stdio;
pub mod traits;

pub use outbox::Outbox;
pub use stdio::StdioMessenger;
pub use traits::{
    Button, ChatId, InboundEvent, InlineResult, MessageId, MessageRef, Messenger,
};
