use crate::cache::BoundedCache;
use std::time::Duration;

/// Tag strings bound to media group ids, so album items without a caption
/// inherit the caption of a sibling.
pub struct MediaGroupCoalescer {
    bindings: BoundedCache<String, String>,
}

impl MediaGroupCoalescer {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            bindings: BoundedCache::new(capacity, max_age),
        }
    }

    pub fn bind(&self, group_id: &str, tags: &str) {
        self.bindings.insert(group_id.to_string(), tags.to_string());
    }

    pub fn lookup(&self, group_id: &str) -> Option<String> {
        self.bindings.get(&group_id.to_string())
    }
}
