//! Collaborators the match core calls out to, with in-memory implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::ai::Difficulty;
use crate::board::Board;
use crate::game::MoveLogEntry;
use crate::ship::ShipPlacement;

/// Which orchestrator produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchMode {
    VsAi,
    VsGuest,
    VsFriend,
}

impl MatchMode {
    pub fn label(self) -> &'static str {
        match self {
            MatchMode::VsAi => "vs-ai",
            MatchMode::VsGuest => "vs-guest",
            MatchMode::VsFriend => "vs-friend",
        }
    }
}

/// Persisted summary of a finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub user_id: String,
    pub opponent_label: String,
    pub is_victory: bool,
    pub mode: MatchMode,
    pub moves: Vec<MoveLogEntry>,
}

/// Source of a user's saved fleet.
#[async_trait::async_trait]
pub trait FleetStore: Send + Sync {
    /// Saved fleet for `user_id`; empty when the user has none.
    async fn get_fleet(&self, user_id: &str) -> anyhow::Result<Vec<ShipPlacement>>;
}

/// Sink for finished matches.
#[async_trait::async_trait]
pub trait MatchRecordStore: Send + Sync {
    async fn save_match_record(&self, record: &MatchRecord) -> anyhow::Result<()>;
}

/// Remote next-move predictor for hard difficulty. Best effort only.
#[async_trait::async_trait]
pub trait MovePredictor: Send + Sync {
    async fn predict_move(&self, board: &Board, difficulty: Difficulty) -> anyhow::Result<(usize, usize)>;
}

/// Fire-and-forget user feedback. Implementations must not block.
pub trait EffectSink: Send + Sync {
    /// The local side's turn has started.
    fn turn_alarm(&self) {}
    /// One of the local side's ships was hit.
    fn hit_vibration(&self) {}
    fn background_music(&self, _on: bool) {}
}

/// Effect sink that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEffects;

impl EffectSink for NoEffects {}

/// Effect sink that counts signals.
#[derive(Debug, Default)]
pub struct CountingEffects {
    pub turn_alarms: AtomicUsize,
    pub hit_vibrations: AtomicUsize,
    pub music_on: AtomicBool,
}

impl EffectSink for CountingEffects {
    fn turn_alarm(&self) {
        self.turn_alarms.fetch_add(1, Ordering::SeqCst);
    }

    fn hit_vibration(&self) {
        self.hit_vibrations.fetch_add(1, Ordering::SeqCst);
    }

    fn background_music(&self, on: bool) {
        self.music_on.store(on, Ordering::SeqCst);
    }
}

/// Fleet store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryFleetStore {
    fleets: Mutex<HashMap<String, Vec<ShipPlacement>>>,
}

impl MemoryFleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_fleet(&self, user_id: &str, fleet: Vec<ShipPlacement>) {
        if let Ok(mut fleets) = self.fleets.lock() {
            fleets.insert(user_id.to_string(), fleet);
        }
    }
}

#[async_trait::async_trait]
impl FleetStore for MemoryFleetStore {
    async fn get_fleet(&self, user_id: &str) -> anyhow::Result<Vec<ShipPlacement>> {
        let fleets = self
            .fleets
            .lock()
            .map_err(|_| anyhow::anyhow!("fleet store poisoned"))?;
        Ok(fleets.get(user_id).cloned().unwrap_or_default())
    }
}

/// Record store backed by a vector, with a switch to simulate outages.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<MatchRecord>>,
    failing: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<MatchRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MatchRecordStore for MemoryRecordStore {
    async fn save_match_record(&self, record: &MatchRecord) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("record store unavailable"));
        }
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("record store poisoned"))?
            .push(record.clone());
        Ok(())
    }
}
