use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::common::BoardError;
use crate::config::MatchTiming;
use crate::finalize::Finalizer;
use crate::game::{EndReason, GameEngine, ShotReport, Side};
use crate::orchestrator::{load_fleet, persist_record, MatchError, MatchSnapshot};
use crate::protocol::{MoveEvent, StatusEvent, SyncPath, SyncRecord};
use crate::rules::FiringRule;
use crate::services::{EffectSink, FleetStore, MatchMode, MatchRecord, MatchRecordStore};
use crate::sync::{PresenceMonitor, Subscription, SyncChannel};

/// Settings for a match against another client over a [`SyncChannel`].
#[derive(Debug, Clone)]
pub struct RemoteMatchConfig {
    pub match_id: String,
    pub local_id: String,
    pub peer_id: String,
    /// Name shown for the peer in the saved record.
    pub peer_label: String,
    /// Proposed rule. Only the client with the smaller id publishes it; the
    /// other adopts whatever arrives on the `rule` path.
    pub rule: FiringRule,
    pub timing: MatchTiming,
}

struct RemoteState {
    engine: GameEngine,
    warning: Option<String>,
    saved_record: Option<MatchRecord>,
}

struct RemoteShared {
    config: RemoteMatchConfig,
    channel: Arc<dyn SyncChannel>,
    records: Arc<dyn MatchRecordStore>,
    effects: Arc<dyn EffectSink>,
    state: tokio::sync::Mutex<RemoteState>,
    finalizer: Finalizer,
    presence: Mutex<Option<PresenceMonitor>>,
    pending_switch: Mutex<Option<JoinHandle<()>>>,
    /// Flipped once background work must stop; the event pump watches it.
    closing: watch::Sender<bool>,
    snapshot: watch::Sender<MatchSnapshot>,
}

struct Feeds {
    rule: Option<Subscription>,
    fleet: Option<Subscription>,
    status: Option<Subscription>,
    moves: Option<Subscription>,
}

/// One client's half of a match against a friend.
///
/// Each client resolves its own shots against its mirror of the peer's
/// fleet and broadcasts them; shots observed from the peer are replayed on
/// the local board. A single event task applies incoming records one at a
/// time, so rule, fleet, status and move updates never interleave.
pub struct RemoteMatch {
    shared: Arc<RemoteShared>,
    pump: JoinHandle<()>,
}

impl RemoteMatch {
    /// Place the local fleet, join the match channel and start presence.
    /// Must be called from within a tokio runtime.
    pub async fn initialize(
        config: RemoteMatchConfig,
        channel: Arc<dyn SyncChannel>,
        fleets: &dyn FleetStore,
        records: Arc<dyn MatchRecordStore>,
        effects: Arc<dyn EffectSink>,
    ) -> Result<Self, MatchError> {
        let fleet = load_fleet(fleets, &config.local_id).await?;
        let rule_owner = config.local_id < config.peer_id;
        let first = if rule_owner { Side::Local } else { Side::Opponent };

        let mut engine = GameEngine::new(
            config.rule,
            [config.local_id.clone(), config.peer_id.clone()],
            first,
        );
        engine
            .place_fleet(Side::Local, &fleet)
            .map_err(MatchError::InvalidFleet)?;

        let match_id = config.match_id.clone();
        let feeds = Feeds {
            rule: follow(channel.as_ref(), &match_id, SyncPath::Rule).await,
            fleet: follow(channel.as_ref(), &match_id, SyncPath::Fleet(config.peer_id.clone())).await,
            status: follow(channel.as_ref(), &match_id, SyncPath::Status).await,
            moves: follow(channel.as_ref(), &match_id, SyncPath::Moves).await,
        };

        if let Err(e) = channel
            .set(&match_id, &SyncPath::Fleet(config.local_id.clone()), SyncRecord::Fleet(fleet))
            .await
        {
            log::warn!("[RemoteMatch {}] could not publish fleet: {}", match_id, e);
        }
        if rule_owner {
            if let Err(e) = channel
                .set(&match_id, &SyncPath::Rule, SyncRecord::Rule(config.rule))
                .await
            {
                log::warn!("[RemoteMatch {}] could not publish rule: {}", match_id, e);
            }
        }

        log::info!(
            "[RemoteMatch {}] {} vs {}, {:?} shoots first",
            match_id,
            config.local_id,
            config.peer_id,
            first
        );
        effects.background_music(true);

        let (snapshot, _) = watch::channel(MatchSnapshot::capture(&engine, Side::Local));
        let shared = Arc::new(RemoteShared {
            config,
            channel,
            records,
            effects,
            state: tokio::sync::Mutex::new(RemoteState {
                engine,
                warning: None,
                saved_record: None,
            }),
            finalizer: Finalizer::new(),
            presence: Mutex::new(None),
            pending_switch: Mutex::new(None),
            closing: watch::channel(false).0,
            snapshot,
        });

        let closing = shared.closing.subscribe();
        let pump = tokio::spawn(RemoteShared::run_events(shared.clone(), feeds, closing));

        let weak = Arc::downgrade(&shared);
        let monitor = PresenceMonitor::start(
            shared.channel.clone(),
            &shared.config.match_id,
            &shared.config.local_id,
            &shared.config.peer_id,
            &shared.config.timing,
            move || async move {
                if let Some(shared) = weak.upgrade() {
                    shared.on_peer_timeout().await;
                }
            },
        );
        if let Ok(mut presence) = shared.presence.lock() {
            *presence = Some(monitor);
        }

        Ok(Self { shared, pump })
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MatchSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn is_finalized(&self) -> bool {
        self.shared.finalizer.is_finalized()
    }

    pub async fn saved_record(&self) -> Option<MatchRecord> {
        self.shared.state.lock().await.saved_record.clone()
    }

    /// Copy of the engine, for inspection.
    pub async fn engine(&self) -> GameEngine {
        self.shared.state.lock().await.engine.clone()
    }

    /// Fire at the peer's board. Rejected while it is not our turn, while a
    /// hand-over is pending and until the peer's fleet has arrived.
    pub async fn fire(&self, row: usize, col: usize) -> Option<ShotReport> {
        if self.shared.finalizer.is_finalized() {
            return None;
        }
        self.shared.fire(row, col).await
    }

    /// Give up: announce it to the peer and end the match as a defeat.
    pub async fn retire(&self) {
        if self.shared.finalizer.is_finalized() {
            return;
        }
        let shared = &self.shared;
        let status = StatusEvent::Surrender(shared.config.local_id.clone()).to_string();
        if let Err(e) = shared
            .channel
            .set(&shared.config.match_id, &SyncPath::Status, SyncRecord::Status(status))
            .await
        {
            log::warn!("[RemoteMatch {}] could not announce surrender: {}", shared.config.match_id, e);
        }
        shared.finalize(Side::Opponent, EndReason::Surrender).await;
    }

    /// Client went to the background: stop heartbeat and watchdog.
    pub fn suspend(&self) {
        if let Ok(presence) = self.shared.presence.lock() {
            if let Some(monitor) = presence.as_ref() {
                monitor.suspend();
            }
        }
    }

    /// Client is back in the foreground.
    pub fn resume(&self) {
        if self.shared.finalizer.is_finalized() {
            return;
        }
        if let Ok(presence) = self.shared.presence.lock() {
            if let Some(monitor) = presence.as_ref() {
                monitor.resume();
            }
        }
    }

    /// Stop every background task without recording anything.
    pub fn teardown(&self) {
        self.pump.abort();
        self.shared.stop_background();
    }
}

impl Drop for RemoteMatch {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn follow(channel: &dyn SyncChannel, match_id: &str, path: SyncPath) -> Option<Subscription> {
    match channel.subscribe(match_id, &path).await {
        Ok(sub) => Some(sub),
        Err(e) => {
            log::warn!("[RemoteMatch {}] cannot follow {}: {}", match_id, path, e);
            None
        }
    }
}

async fn recv(feed: &mut Option<Subscription>) -> Option<SyncRecord> {
    match feed {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

impl RemoteShared {
    async fn run_events(shared: Arc<Self>, mut feeds: Feeds, mut closing: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = closing.changed() => break,
                Some(record) = recv(&mut feeds.rule) => shared.on_rule(record).await,
                Some(record) = recv(&mut feeds.fleet) => shared.on_fleet(record).await,
                Some(record) = recv(&mut feeds.status) => shared.on_status(record).await,
                Some(record) = recv(&mut feeds.moves) => shared.on_move(record).await,
                else => break,
            }
            if shared.finalizer.is_finalized() {
                break;
            }
        }
        log::debug!("[RemoteMatch {}] event pump stopped", shared.config.match_id);
    }

    async fn on_rule(&self, record: SyncRecord) {
        let SyncRecord::Rule(rule) = record else {
            log::debug!("[RemoteMatch {}] unexpected record on rule: {:?}", self.config.match_id, record);
            return;
        };
        let mut state = self.state.lock().await;
        state.engine.set_rule(rule);
        self.publish(&state);
    }

    async fn on_fleet(&self, record: SyncRecord) {
        let SyncRecord::Fleet(placements) = record else {
            log::debug!("[RemoteMatch {}] unexpected record on fleet: {:?}", self.config.match_id, record);
            return;
        };
        let mut state = self.state.lock().await;
        match state.engine.rebuild_fleet(Side::Opponent, &placements) {
            Ok(()) => {
                log::debug!(
                    "[RemoteMatch {}] peer fleet of {} ships received",
                    self.config.match_id,
                    placements.len()
                );
                if let Some(winner) = state.engine.outcome().map(|o| o.winner) {
                    drop(state);
                    self.finalize(winner, EndReason::Elimination).await;
                    return;
                }
                self.publish(&state);
            }
            Err(e) => log::warn!("[RemoteMatch {}] peer fleet rejected: {}", self.config.match_id, e),
        }
    }

    async fn on_status(&self, record: SyncRecord) {
        let SyncRecord::Status(raw) = record else {
            return;
        };
        let local = &self.config.local_id;
        let peer = &self.config.peer_id;
        match StatusEvent::parse(&raw) {
            Some(StatusEvent::Surrender(id)) if &id == peer => {
                self.finalize(Side::Local, EndReason::Surrender).await;
            }
            Some(StatusEvent::Timeout(id)) if &id == peer => {
                self.finalize(Side::Local, EndReason::Timeout).await;
            }
            Some(StatusEvent::Timeout(id)) if &id == local => {
                self.finalize(Side::Opponent, EndReason::Timeout).await;
            }
            Some(event) if event.subject() == local.as_str() => {}
            _ => log::debug!("[RemoteMatch {}] ignoring status {:?}", self.config.match_id, raw),
        }
    }

    async fn on_move(self: &Arc<Self>, record: SyncRecord) {
        let SyncRecord::Move(event) = record else {
            return;
        };
        if event.actor == self.config.local_id {
            return;
        }
        if event.actor != self.config.peer_id {
            log::debug!("[RemoteMatch {}] move by stranger {}", self.config.match_id, event.actor);
            return;
        }

        let mut state = self.state.lock().await;
        let (row, col) = (event.row as usize, event.col as usize);
        let report = match state.engine.replay_shot(Side::Opponent, row, col) {
            Ok(report) => report,
            Err(BoardError::AlreadyResolved) => {
                log::debug!("[RemoteMatch {}] duplicate move ({}, {})", self.config.match_id, row, col);
                return;
            }
            Err(e) => {
                log::warn!("[RemoteMatch {}] cannot replay ({}, {}): {}", self.config.match_id, row, col, e);
                return;
            }
        };
        if report.result != event.result {
            log::debug!(
                "[RemoteMatch {}] peer judged ({}, {}) as {}, local board says {}",
                self.config.match_id,
                row,
                col,
                event.result,
                report.result
            );
        }
        if report.result.is_hit() {
            self.effects.hit_vibration();
        }

        if report.match_over {
            drop(state);
            self.finalize(Side::Opponent, EndReason::Elimination).await;
            return;
        }
        if report.turn_ended {
            self.schedule_switch(report.turn_number);
        }
        self.publish(&state);
    }

    async fn on_peer_timeout(&self) {
        if self.finalizer.is_finalized() {
            return;
        }
        let status = StatusEvent::Timeout(self.config.peer_id.clone()).to_string();
        if let Err(e) = self
            .channel
            .set(&self.config.match_id, &SyncPath::Status, SyncRecord::Status(status))
            .await
        {
            log::warn!("[RemoteMatch {}] could not announce timeout: {}", self.config.match_id, e);
        }
        self.finalize(Side::Local, EndReason::Timeout).await;
    }

    async fn fire(self: &Arc<Self>, row: usize, col: usize) -> Option<ShotReport> {
        let mut state = self.state.lock().await;
        let report = match state.engine.fire(Side::Local, row, col) {
            Ok(report) => report,
            Err(e) => {
                log::debug!("[RemoteMatch {}] shot at ({}, {}) rejected: {}", self.config.match_id, row, col, e);
                return None;
            }
        };

        let event = MoveEvent {
            actor: self.config.local_id.clone(),
            row: row as u8,
            col: col as u8,
            result: report.result,
            turn_number: report.turn_number,
        };
        if let Err(e) = self
            .channel
            .push(&self.config.match_id, &SyncPath::Moves, SyncRecord::Move(event))
            .await
        {
            log::warn!("[RemoteMatch {}] could not publish move: {}", self.config.match_id, e);
        }

        if report.match_over {
            drop(state);
            self.finalize(Side::Local, EndReason::Elimination).await;
        } else {
            if report.turn_ended {
                self.schedule_switch(report.turn_number);
            }
            self.publish(&state);
        }
        Some(report)
    }

    /// Hand the turn over after the configured delay, unless the engine has
    /// moved past `turn_number` by then.
    fn schedule_switch(self: &Arc<Self>, turn_number: u32) {
        let weak = Arc::downgrade(self);
        let delay = self.config.timing.turn_switch_delay;
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut state = shared.state.lock().await;
            if state.engine.complete_turn_switch_for(turn_number) {
                if state.engine.turn().active_side == Side::Local {
                    shared.effects.turn_alarm();
                }
                shared.publish(&state);
            }
        });
        replace_pending(&self.pending_switch, handle);
    }

    fn stop_background(&self) {
        self.closing.send_replace(true);
        if let Ok(mut presence) = self.presence.lock() {
            if let Some(monitor) = presence.take() {
                monitor.stop();
            }
        }
        if let Ok(mut pending) = self.pending_switch.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }

    /// End the match exactly once, whichever path gets here first.
    async fn finalize(&self, winner: Side, reason: EndReason) {
        if !self.finalizer.try_begin() {
            return;
        }
        self.stop_background();

        let mut state = self.state.lock().await;
        state.engine.declare_outcome(winner, reason);
        let outcome = state.engine.outcome().cloned();
        let is_victory = outcome
            .as_ref()
            .map_or(winner == Side::Local, |o| o.is_victory(Side::Local));
        log::info!(
            "[RemoteMatch {}] match over: {} {} ({:?})",
            self.config.match_id,
            self.config.local_id,
            if is_victory { "won" } else { "lost" },
            outcome.as_ref().map(|o| o.reason)
        );

        if let Err(e) = self
            .channel
            .remove(&self.config.match_id, &SyncPath::Presence(self.config.local_id.clone()))
            .await
        {
            log::debug!("[RemoteMatch {}] could not clear presence: {}", self.config.match_id, e);
        }

        let record = MatchRecord {
            user_id: self.config.local_id.clone(),
            opponent_label: self.config.peer_label.clone(),
            is_victory,
            mode: MatchMode::VsFriend,
            moves: state.engine.move_log().to_vec(),
        };
        state.warning = persist_record(self.records.as_ref(), &record).await;
        state.saved_record = Some(record);
        self.effects.background_music(false);
        self.publish(&state);
    }

    fn publish(&self, state: &RemoteState) {
        let mut snap = MatchSnapshot::capture(&state.engine, Side::Local);
        snap.warning = state.warning.clone();
        self.snapshot.send_replace(snap);
    }
}

/// Store `handle` as the pending switch, cancelling any older one.
fn replace_pending(slot: &Mutex<Option<JoinHandle<()>>>, handle: JoinHandle<()>) {
    if let Ok(mut pending) = slot.lock() {
        if let Some(stale) = pending.replace(handle) {
            stale.abort();
        }
    }
}
