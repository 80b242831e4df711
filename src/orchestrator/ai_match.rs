use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::ai::{Difficulty, Targeter};
use crate::board::Board;
use crate::config::MatchTiming;
use crate::finalize::Finalizer;
use crate::game::{EndReason, GameEngine, Phase, ShotReport, Side};
use crate::orchestrator::{load_fleet, persist_record, MatchError, MatchSnapshot};
use crate::rules::FiringRule;
use crate::services::{EffectSink, FleetStore, MatchMode, MatchRecord, MatchRecordStore, MovePredictor};

/// Name the AI plays under in move logs and outcomes.
pub const AI_NAME: &str = "AI";

/// Settings for a match against the computer.
#[derive(Debug, Clone)]
pub struct AiMatchConfig {
    pub user_id: String,
    pub difficulty: Difficulty,
    pub rule: FiringRule,
    /// Fix the AI's randomness for reproducible games.
    pub seed: Option<u64>,
    pub timing: MatchTiming,
}

/// Single-process match between a user and the targeting AI.
pub struct AiMatch {
    engine: GameEngine,
    targeter: Targeter,
    rng: SmallRng,
    config: AiMatchConfig,
    records: Arc<dyn MatchRecordStore>,
    effects: Arc<dyn EffectSink>,
    predictor: Option<Arc<dyn MovePredictor>>,
    finalizer: Finalizer,
    saved_record: Option<MatchRecord>,
    warning: Option<String>,
    snapshot: watch::Sender<MatchSnapshot>,
}

impl AiMatch {
    /// Load the user's fleet, generate the AI fleet and set up the engine.
    /// The user shoots first.
    pub async fn initialize(
        config: AiMatchConfig,
        fleets: &dyn FleetStore,
        records: Arc<dyn MatchRecordStore>,
        effects: Arc<dyn EffectSink>,
        predictor: Option<Arc<dyn MovePredictor>>,
    ) -> Result<Self, MatchError> {
        let fleet = load_fleet(fleets, &config.user_id).await?;
        let mut rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_rng(&mut rand::rng()),
        };

        let mut engine = GameEngine::new(
            config.rule,
            [config.user_id.clone(), AI_NAME.to_string()],
            Side::Local,
        );
        engine
            .place_fleet(Side::Local, &fleet)
            .map_err(MatchError::InvalidFleet)?;
        let ai_fleet = Board::random_fleet(&mut rng).map_err(MatchError::InvalidFleet)?;
        engine
            .place_fleet(Side::Opponent, &ai_fleet)
            .map_err(MatchError::InvalidFleet)?;

        log::info!(
            "[AiMatch] {} vs AI ({:?}, {:?})",
            config.user_id,
            config.difficulty,
            config.rule
        );
        effects.background_music(true);
        let (snapshot, _) = watch::channel(MatchSnapshot::capture(&engine, Side::Local));
        Ok(Self {
            engine,
            targeter: Targeter::new(config.difficulty),
            rng,
            config,
            records,
            effects,
            predictor,
            finalizer: Finalizer::new(),
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

    /// Local copy of the finished match, kept even if the upload failed.
    pub fn saved_record(&self) -> Option<&MatchRecord> {
        self.saved_record.as_ref()
    }

    /// Fire at the AI's board. When the shot ends the user's turn, the AI
    /// plays its whole turn before this returns. Rejected shots return `None`.
    pub async fn fire(&mut self, row: usize, col: usize) -> Option<ShotReport> {
        if self.finalizer.is_finalized() {
            return None;
        }
        let report = match self.engine.fire(Side::Local, row, col) {
            Ok(report) => report,
            Err(e) => {
                log::debug!("[AiMatch] shot at ({}, {}) rejected: {}", row, col, e);
                return None;
            }
        };

        if report.match_over {
            self.finalize(Side::Local, EndReason::Elimination).await;
        } else if report.turn_ended {
            self.publish();
            sleep(self.config.timing.turn_switch_delay).await;
            self.engine.complete_turn_switch();
            self.play_ai_turn().await;
        }
        self.publish();
        Some(report)
    }

    /// Give up the match.
    pub async fn retire(&mut self) {
        self.finalize(Side::Opponent, EndReason::Surrender).await;
    }

    async fn play_ai_turn(&mut self) {
        while self.engine.phase() == Phase::AwaitingShot
            && self.engine.turn().active_side == Side::Opponent
        {
            self.publish();
            sleep(self.config.timing.ai_think_delay).await;

            let suggestion = self.suggestion().await;
            let board = self.engine.board(Side::Local);
            let Some((row, col)) = self.targeter.next_target(board, &mut self.rng, suggestion) else {
                log::warn!("[AiMatch] no cell left to target");
                break;
            };
            let report = match self.engine.fire(Side::Opponent, row, col) {
                Ok(report) => report,
                Err(e) => {
                    log::warn!("[AiMatch] AI shot at ({}, {}) rejected: {}", row, col, e);
                    break;
                }
            };
            self.targeter
                .record_result(self.engine.board(Side::Local), (row, col), report.result);
            log::debug!("[AiMatch] AI fired ({}, {}): {}", row, col, report.result);
            if report.result.is_hit() {
                self.effects.hit_vibration();
            }

            if report.match_over {
                self.finalize(Side::Opponent, EndReason::Elimination).await;
                return;
            }
            if report.turn_ended {
                self.publish();
                sleep(self.config.timing.turn_switch_delay).await;
                if self.engine.complete_turn_switch() {
                    self.effects.turn_alarm();
                }
            }
        }
    }

    async fn suggestion(&mut self) -> Option<(usize, usize)> {
        if !self.targeter.wants_suggestion(self.engine.board(Side::Local)) {
            return None;
        }
        let predictor = self.predictor.as_ref()?;
        let board = self.engine.board(Side::Local);
        let limit = self.config.timing.inference_timeout;
        match tokio::time::timeout(limit, predictor.predict_move(board, self.config.difficulty)).await {
            Ok(Ok(coord)) => Some(coord),
            Ok(Err(e)) => {
                log::warn!("[AiMatch] move predictor failed: {}", e);
                None
            }
            Err(_) => {
                log::warn!("[AiMatch] move predictor timed out after {:?}", limit);
                None
            }
        }
    }

    async fn finalize(&mut self, winner: Side, reason: EndReason) {
        if !self.finalizer.try_begin() {
            return;
        }
        self.engine.declare_outcome(winner, reason);
        let is_victory = self
            .engine
            .outcome()
            .map_or(winner == Side::Local, |o| o.is_victory(Side::Local));
        let record = MatchRecord {
            user_id: self.config.user_id.clone(),
            opponent_label: format!("{} ({:?})", AI_NAME, self.config.difficulty),
            is_victory,
            mode: MatchMode::VsAi,
            moves: self.engine.move_log().to_vec(),
        };
        log::info!(
            "[AiMatch] match over: {} {} by {:?}",
            self.config.user_id,
            if is_victory { "won" } else { "lost" },
            self.engine.outcome().map(|o| o.reason)
        );
        self.warning = persist_record(self.records.as_ref(), &record).await;
        self.saved_record = Some(record);
        self.effects.background_music(false);
        self.publish();
    }

    fn publish(&self) {
        let mut snap = MatchSnapshot::capture(&self.engine, Side::Local);
        snap.warning = self.warning.clone();
        self.snapshot.send_replace(snap);
    }
}
