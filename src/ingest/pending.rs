use parking_lot::Mutex;
use std::collections::HashMap;

/// Last free-text message per user, waiting for the next upload to claim it.
#[derive(Default)]
pub struct PendingTextBuffer {
    texts: Mutex<HashMap<i64, String>>,
}

impl PendingTextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `text` for `owner_id`, replacing anything staged before.
    pub fn put(&self, owner_id: i64, text: impl Into<String>) {
        self.texts.lock().insert(owner_id, text.into());
    }

    /// Remove and return the staged text.
    pub fn take(&self, owner_id: i64) -> Option<String> {
        self.texts.lock().remove(&owner_id)
    }
}
