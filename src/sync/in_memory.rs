use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;

use crate::protocol::{decode_record, encode_record, SyncPath, SyncRecord};
use crate::sync::{Subscription, SyncChannel};

/// Process-local channel shared by clones. Frames are stored encoded, so
/// subscribers go through the same decode path as with a networked store.
#[derive(Clone, Default)]
pub struct InMemoryChannel {
    inner: Arc<Mutex<ChannelState>>,
}

#[derive(Default)]
struct ChannelState {
    slots: HashMap<String, Slot>,
    next_listener: u64,
    fail_publishes: bool,
}

#[derive(Default)]
struct Slot {
    log: Vec<Vec<u8>>,
    value: Option<Vec<u8>>,
    listeners: Vec<(u64, mpsc::UnboundedSender<Vec<u8>>)>,
}

impl Slot {
    fn broadcast(&mut self, data: &[u8]) {
        self.listeners.retain(|(_, tx)| tx.send(data.to_vec()).is_ok());
    }
}

fn slot_key(match_id: &str, path: &SyncPath) -> String {
    format!("{}/{}", match_id, path)
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, as an unreachable store would.
    pub fn set_fail_publishes(&self, fail: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.fail_publishes = fail;
        }
    }

    /// Current value of a last-write-wins slot.
    pub fn value(&self, match_id: &str, path: &SyncPath) -> Option<SyncRecord> {
        let state = self.inner.lock().ok()?;
        let data = state.slots.get(&slot_key(match_id, path))?.value.as_ref()?;
        decode_record(data).ok()
    }

    /// Number of entries appended to a log slot.
    pub fn log_len(&self, match_id: &str, path: &SyncPath) -> usize {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.slots.get(&slot_key(match_id, path)).map(|s| s.log.len()))
            .unwrap_or(0)
    }

    /// Active subscriptions on a slot.
    pub fn listener_count(&self, match_id: &str, path: &SyncPath) -> usize {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.slots.get(&slot_key(match_id, path)).map(|s| s.listeners.len()))
            .unwrap_or(0)
    }

    fn write<F>(&self, match_id: &str, path: &SyncPath, record: &SyncRecord, apply: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Slot, Vec<u8>),
    {
        let data = encode_record(record)?;
        let mut state = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("channel state poisoned"))?;
        if state.fail_publishes {
            return Err(anyhow::anyhow!("channel unreachable: write to {} failed", path));
        }
        let slot = state.slots.entry(slot_key(match_id, path)).or_default();
        slot.broadcast(&data);
        apply(slot, data);
        Ok(())
    }
}

#[async_trait::async_trait]
impl SyncChannel for InMemoryChannel {
    async fn push(&self, match_id: &str, path: &SyncPath, record: SyncRecord) -> anyhow::Result<()> {
        self.write(match_id, path, &record, |slot, data| slot.log.push(data))
    }

    async fn set(&self, match_id: &str, path: &SyncPath, record: SyncRecord) -> anyhow::Result<()> {
        self.write(match_id, path, &record, |slot, data| slot.value = Some(data))
    }

    async fn remove(&self, match_id: &str, path: &SyncPath) -> anyhow::Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("channel state poisoned"))?;
        if state.fail_publishes {
            return Err(anyhow::anyhow!("channel unreachable: remove of {} failed", path));
        }
        if let Some(slot) = state.slots.get_mut(&slot_key(match_id, path)) {
            slot.value = None;
        }
        Ok(())
    }

    async fn subscribe(&self, match_id: &str, path: &SyncPath) -> anyhow::Result<Subscription> {
        let key = slot_key(match_id, path);
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self
                .inner
                .lock()
                .map_err(|_| anyhow::anyhow!("channel state poisoned"))?;
            let id = state.next_listener;
            state.next_listener += 1;
            let slot = state.slots.entry(key.clone()).or_default();
            for data in slot.log.iter().chain(slot.value.iter()) {
                let _ = tx.send(data.clone());
            }
            slot.listeners.push((id, tx));
            id
        };

        let weak: Weak<Mutex<ChannelState>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(path.clone(), rx, move || {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut state) = inner.lock() {
                    if let Some(slot) = state.slots.get_mut(&key) {
                        slot.listeners.retain(|(listener, _)| *listener != id);
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MoveEvent;
    use crate::ShotResult;

    fn shot(actor: &str, row: u8) -> SyncRecord {
        SyncRecord::Move(MoveEvent {
            actor: actor.into(),
            row,
            col: 0,
            result: ShotResult::Miss,
            turn_number: 1,
        })
    }

    #[tokio::test]
    async fn late_subscriber_replays_log_in_order() {
        let channel = InMemoryChannel::new();
        channel.push("m", &SyncPath::Moves, shot("a", 1)).await.unwrap();
        channel.push("m", &SyncPath::Moves, shot("b", 2)).await.unwrap();

        let mut sub = channel.subscribe("m", &SyncPath::Moves).await.unwrap();
        channel.push("m", &SyncPath::Moves, shot("a", 3)).await.unwrap();
        for expected in [1, 2, 3] {
            match sub.next().await {
                Some(SyncRecord::Move(ev)) => assert_eq!(ev.row, expected),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn set_overwrites_and_unsubscribe_detaches() {
        let channel = InMemoryChannel::new();
        channel.set("m", &SyncPath::Status, SyncRecord::Status("x".into())).await.unwrap();
        channel.set("m", &SyncPath::Status, SyncRecord::Status("y".into())).await.unwrap();
        assert_eq!(
            channel.value("m", &SyncPath::Status),
            Some(SyncRecord::Status("y".into()))
        );

        let mut sub = channel.subscribe("m", &SyncPath::Status).await.unwrap();
        assert_eq!(sub.next().await, Some(SyncRecord::Status("y".into())));
        assert_eq!(channel.listener_count("m", &SyncPath::Status), 1);
        sub.unsubscribe();
        assert_eq!(channel.listener_count("m", &SyncPath::Status), 0);
    }

    #[tokio::test]
    async fn failing_channel_rejects_writes() {
        let channel = InMemoryChannel::new();
        channel.set_fail_publishes(true);
        assert!(channel.push("m", &SyncPath::Moves, shot("a", 0)).await.is_err());
        assert_eq!(channel.log_len("m", &SyncPath::Moves), 0);
        channel.set_fail_publishes(false);
        assert!(channel.push("m", &SyncPath::Moves, shot("a", 0)).await.is_ok());
    }
}
