//! Outbound requests that no handler waits on.
//!
//! Each request runs as its own task. At most `max_in_flight` run at once;
//! `submit` waits for a free slot, so a slow transport slows the event loop
//! down instead of piling up tasks. `drain` waits for everything submitted
//! so far, which is how shutdown avoids dropping replies.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

#[derive(Clone)]
pub struct Outbox {
    slots: Arc<Semaphore>,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

impl Outbox {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_in_flight.max(1))),
            tasks: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Run `request` in the background. Failures are only logged.
    pub async fn submit<F>(&self, what: &'static str, request: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let Ok(slot) = self.slots.clone().acquire_owned().await else {
            error!("Failed to {what}: outbox closed");
            return;
        };
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let _slot = slot;
            if let Err(e) = request.await {
                error!("Failed to {what}: {e:#}");
            }
        });
    }

    /// Wait until every request submitted so far has finished.
    pub async fn drain(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.tasks.lock());
            if tasks.is_empty() {
                return;
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("outbound task aborted: {e}");
                }
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.lock().len()
    }
}
