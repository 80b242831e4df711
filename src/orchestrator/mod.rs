//! Per-mode match owners: vs-AI, vs-guest (hot seat) and vs-friend (remote).
//!
//! Each orchestrator owns one [`GameEngine`], exposes the commands the UI
//! layer needs (`fire`, `retire`, ...) and publishes a [`MatchSnapshot`]
//! after every state change through a `tokio::sync::watch` channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::{Board, Composition};
use crate::common::BoardError;
use crate::game::{GameEngine, MatchOutcome, Phase, Side, TurnState};
use crate::rules::FiringRule;
use crate::services::{FleetStore, MatchRecord, MatchRecordStore};
use crate::ship::ShipPlacement;

pub mod ai_match;
pub mod bot;
pub mod guest_match;
pub mod remote_match;

pub use ai_match::{AiMatch, AiMatchConfig};
pub use bot::run_bot;
pub use guest_match::{GuestMatch, GuestMatchConfig};
pub use remote_match::{RemoteMatch, RemoteMatchConfig};

/// Reasons a match cannot start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// No fleet on file for the user (or the store could not be reached).
    FleetMissing,
    /// The fleet on file breaks the placement rules.
    InvalidFleet(BoardError),
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::FleetMissing => write!(f, "No fleet available to start the match"),
            MatchError::InvalidFleet(e) => write!(f, "Fleet is invalid: {}", e),
        }
    }
}

impl std::error::Error for MatchError {}

/// Observable state of a match, from one side's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub viewer: Side,
    /// The viewer's own board, ships visible.
    pub own_board: Board,
    /// The board the viewer fires at, ships hidden.
    pub target_board: Board,
    pub own_alive: usize,
    pub target_alive: usize,
    pub own_composition: Composition,
    pub target_composition: Composition,
    pub rule: FiringRule,
    pub turn: TurnState,
    pub phase: Phase,
    pub opponent_fleet_known: bool,
    /// Hot-seat only: the turn ended and the next player must confirm.
    pub awaiting_handoff: bool,
    pub game_over: bool,
    pub outcome: Option<MatchOutcome>,
    /// Non-blocking problem to surface, e.g. a failed record upload.
    pub warning: Option<String>,
}

impl MatchSnapshot {
    pub fn capture(engine: &GameEngine, viewer: Side) -> Self {
        let own = engine.board(viewer);
        let target = engine.board(viewer.other());
        Self {
            viewer,
            own_board: own.clone(),
            target_board: target.masked(),
            own_alive: own.count_alive(),
            target_alive: target.count_alive(),
            own_composition: own.composition(),
            target_composition: target.composition(),
            rule: engine.rule(),
            turn: engine.turn(),
            phase: engine.phase(),
            opponent_fleet_known: target.has_fleet(),
            awaiting_handoff: false,
            game_over: engine.is_over(),
            outcome: engine.outcome().cloned(),
            warning: None,
        }
    }

    /// Whether the viewer may fire right now.
    pub fn can_fire(&self) -> bool {
        !self.game_over
            && !self.awaiting_handoff
            && self.opponent_fleet_known
            && self.phase == Phase::AwaitingShot
            && self.turn.active_side == self.viewer
            && self.turn.shots_remaining > 0
    }
}

/// Load a user's fleet, treating an unreachable store like an empty one.
async fn load_fleet(fleets: &dyn FleetStore, user_id: &str) -> Result<Vec<ShipPlacement>, MatchError> {
    match fleets.get_fleet(user_id).await {
        Ok(fleet) if !fleet.is_empty() => Ok(fleet),
        Ok(_) => {
            log::info!("no fleet on file for {}", user_id);
            Err(MatchError::FleetMissing)
        }
        Err(e) => {
            log::warn!("fleet store failed for {}: {}", user_id, e);
            Err(MatchError::FleetMissing)
        }
    }
}

/// Save a finished match. A failure is logged and returned as a warning to
/// show; it never blocks completion.
async fn persist_record(records: &dyn MatchRecordStore, record: &MatchRecord) -> Option<String> {
    match records.save_match_record(record).await {
        Ok(()) => None,
        Err(e) => {
            log::warn!(
                "could not upload {} record for {}: {}",
                record.mode.label(),
                record.user_id,
                e
            );
            Some(format!("Match result saved locally but not uploaded: {}", e))
        }
    }
}
