//! Shared event channel used by remote matches, plus the presence system
//! built on top of it.

use crate::protocol::{decode_record, SyncPath, SyncRecord};
use tokio::sync::mpsc;

pub mod in_memory;
pub mod presence;

pub use in_memory::InMemoryChannel;
pub use presence::PresenceMonitor;

/// Publish/subscribe store keyed by match id and [`SyncPath`].
///
/// `push` appends to a log (used for `moves`), `set` overwrites the slot
/// (everything else). A subscription first replays what the slot already
/// holds, then follows new writes in arrival order.
#[async_trait::async_trait]
pub trait SyncChannel: Send + Sync {
    async fn push(&self, match_id: &str, path: &SyncPath, record: SyncRecord) -> anyhow::Result<()>;
    async fn set(&self, match_id: &str, path: &SyncPath, record: SyncRecord) -> anyhow::Result<()>;
    async fn remove(&self, match_id: &str, path: &SyncPath) -> anyhow::Result<()>;
    async fn subscribe(&self, match_id: &str, path: &SyncPath) -> anyhow::Result<Subscription>;
}

/// Live feed of encoded frames for one path. Dropping it unsubscribes.
pub struct Subscription {
    path: SyncPath,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a frame receiver; `release` runs once when the subscription ends.
    pub fn new<F>(path: SyncPath, rx: mpsc::UnboundedReceiver<Vec<u8>>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            path,
            rx,
            release: Some(Box::new(release)),
        }
    }

    pub fn path(&self) -> &SyncPath {
        &self.path
    }

    /// Next decodable record, or `None` once the channel side is gone.
    /// Undecodable frames are logged and skipped.
    pub async fn next(&mut self) -> Option<SyncRecord> {
        loop {
            let data = self.rx.recv().await?;
            match decode_record(&data) {
                Ok(record) => return Some(record),
                Err(e) => log::warn!("[Subscription {}] dropping frame: {}", self.path, e),
            }
        }
    }

    /// Stop listening.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}
