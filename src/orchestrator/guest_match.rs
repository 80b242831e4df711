use std::sync::Arc;

use tokio::sync::watch;

use crate::config::MatchTiming;
use crate::finalize::Finalizer;
use crate::game::{EndReason, GameEngine, ShotReport, Side};
use crate::orchestrator::{load_fleet, persist_record, MatchError, MatchSnapshot};
use crate::rules::FiringRule;
use crate::services::{EffectSink, FleetStore, MatchMode, MatchRecord, MatchRecordStore};
use crate::ship::ShipPlacement;

/// Settings for a hot-seat match on one device.
#[derive(Debug, Clone)]
pub struct GuestMatchConfig {
    /// Signed-in user; plays [`Side::Local`] and owns the record.
    pub host_id: String,
    /// Display name of the guest, who plays [`Side::Opponent`].
    pub guest_name: String,
    pub rule: FiringRule,
    pub timing: MatchTiming,
}

/// Two players sharing one device. After every turn the device is handed
/// over, and the next player has to confirm before their board is shown.
pub struct GuestMatch {
    engine: GameEngine,
    config: GuestMatchConfig,
    records: Arc<dyn MatchRecordStore>,
    effects: Arc<dyn EffectSink>,
    finalizer: Finalizer,
    awaiting_handoff: bool,
    saved_record: Option<MatchRecord>,
    warning: Option<String>,
    snapshot: watch::Sender<MatchSnapshot>,
}

impl GuestMatch {
    /// Load the host's fleet from the store and take the guest's fleet as
    /// placed on the device. The host shoots first.
    pub async fn initialize(
        config: GuestMatchConfig,
        fleets: &dyn FleetStore,
        guest_fleet: Vec<ShipPlacement>,
        records: Arc<dyn MatchRecordStore>,
        effects: Arc<dyn EffectSink>,
    ) -> Result<Self, MatchError> {
        let host_fleet = load_fleet(fleets, &config.host_id).await?;
        if guest_fleet.is_empty() {
            return Err(MatchError::FleetMissing);
        }

        let mut engine = GameEngine::new(
            config.rule,
            [config.host_id.clone(), config.guest_name.clone()],
            Side::Local,
        );
        engine
            .place_fleet(Side::Local, &host_fleet)
            .map_err(MatchError::InvalidFleet)?;
        engine
            .place_fleet(Side::Opponent, &guest_fleet)
            .map_err(MatchError::InvalidFleet)?;

        log::info!(
            "[GuestMatch] {} vs {} ({:?})",
            config.host_id,
            config.guest_name,
            config.rule
        );
        effects.background_music(true);
        let (snapshot, _) = watch::channel(MatchSnapshot::capture(&engine, Side::Local));
        Ok(Self {
            engine,
            config,
            records,
            effects,
            finalizer: Finalizer::new(),
            awaiting_handoff: false,
            saved_record: None,
            warning: None,
            snapshot,
        })
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MatchSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn saved_record(&self) -> Option<&MatchRecord> {
        self.saved_record.as_ref()
    }

    pub fn awaiting_handoff(&self) -> bool {
        self.awaiting_handoff
    }

    /// Fire on behalf of whoever holds the device.
    pub async fn fire(&mut self, row: usize, col: usize) -> Option<ShotReport> {
        if self.finalizer.is_finalized() || self.awaiting_handoff {
            return None;
        }
        let shooter = self.engine.turn().active_side;
        let report = match self.engine.fire(shooter, row, col) {
            Ok(report) => report,
            Err(e) => {
                log::debug!("[GuestMatch] shot at ({}, {}) rejected: {}", row, col, e);
                return None;
            }
        };
        if report.result.is_hit() {
            self.effects.hit_vibration();
        }

        if report.match_over {
            self.finalize(shooter, EndReason::Elimination).await;
        } else if report.turn_ended {
            self.awaiting_handoff = true;
            self.publish();
        } else {
            self.publish();
        }
        Some(report)
    }

    /// The next player has taken the device. Returns `false` when no
    /// hand-over was pending.
    pub fn confirm_handoff(&mut self) -> bool {
        if !self.awaiting_handoff {
            return false;
        }
        self.awaiting_handoff = false;
        if self.engine.complete_turn_switch() {
            self.effects.turn_alarm();
        }
        self.publish();
        true
    }

    /// The player holding the device gives up.
    pub async fn retire(&mut self) {
        let quitter = self.engine.turn().active_side;
        self.finalize(quitter.other(), EndReason::Surrender).await;
    }

    async fn finalize(&mut self, winner: Side, reason: EndReason) {
        if !self.finalizer.try_begin() {
            return;
        }
        self.engine.declare_outcome(winner, reason);
        self.awaiting_handoff = false;
        let record = MatchRecord {
            user_id: self.config.host_id.clone(),
            opponent_label: self.config.guest_name.clone(),
            is_victory: winner == Side::Local,
            mode: MatchMode::VsGuest,
            moves: self.engine.move_log().to_vec(),
        };
        log::info!(
            "[GuestMatch] match over: {} wins by {:?}",
            self.engine.participant(winner),
            reason
        );
        self.warning = persist_record(self.records.as_ref(), &record).await;
        self.saved_record = Some(record);
        self.effects.background_music(false);
        self.publish();
    }

    fn publish(&self) {
        let viewer = self.engine.turn().active_side;
        let mut snap = MatchSnapshot::capture(&self.engine, viewer);
        if self.awaiting_handoff {
            // intact ships stay hidden until the next player confirms
            snap.own_board = snap.own_board.masked();
        }
        snap.awaiting_handoff = self.awaiting_handoff;
        snap.warning = self.warning.clone();
        self.snapshot.send_replace(snap);
    }
}
