//! Shot resolution engine: owns both boards, the turn state machine, the
//! append-only move log and the match outcome.

use alloc::string::String;
use alloc::vec::Vec;

use crate::board::{Board, Composition};
use crate::common::{BoardError, ShotResult};
use crate::rules::FiringRule;
use crate::ship::ShipPlacement;

/// One of the two sides of a match, seen from the client that owns the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    Local,
    Opponent,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Local => Side::Opponent,
            Side::Opponent => Side::Local,
        }
    }

    fn index(self) -> usize {
        match self {
            Side::Local => 0,
            Side::Opponent => 1,
        }
    }
}

/// Where the side to move stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// The active side may fire.
    AwaitingShot,
    /// The active side is out of shots; the hand-over has not happened yet.
    TurnEnded,
    /// Terminal: an outcome exists and no further shots are accepted.
    MatchOver,
}

/// Whose turn it is and how many shots are left in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct TurnState {
    pub active_side: Side,
    /// Starts at 1 and increases by one on every hand-over.
    pub turn_number: u32,
    pub shots_remaining: u32,
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum EndReason {
    Elimination,
    Timeout,
    Surrender,
}

/// Final result of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchOutcome {
    pub winner: Side,
    pub reason: EndReason,
    pub winner_name: String,
}

impl MatchOutcome {
    pub fn is_victory(&self, side: Side) -> bool {
        self.winner == side
    }
}

/// A resolved shot as recorded in the match history. Never mutated once logged.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveLogEntry {
    pub turn_number: u32,
    pub actor_id: String,
    pub row: u8,
    pub col: u8,
    pub result: ShotResult,
}

/// Everything a caller needs to know after a shot resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotReport {
    pub shooter: Side,
    pub row: usize,
    pub col: usize,
    pub result: ShotResult,
    pub turn_number: u32,
    /// Ships still afloat on the board that was fired at.
    pub target_alive: usize,
    pub target_composition: Composition,
    pub shots_remaining: u32,
    pub turn_ended: bool,
    pub match_over: bool,
}

/// Core match logic holding both boards and the turn state machine.
#[derive(Debug, Clone)]
pub struct GameEngine {
    boards: [Board; 2],
    participants: [String; 2],
    rule: FiringRule,
    turn: TurnState,
    phase: Phase,
    shots_this_turn: u32,
    log: Vec<MoveLogEntry>,
    outcome: Option<MatchOutcome>,
}

impl GameEngine {
    /// Create an engine with empty boards. `participants` holds the actor ids
    /// written into the move log, local side first.
    pub fn new(rule: FiringRule, participants: [String; 2], first: Side) -> Self {
        Self {
            boards: [Board::new(), Board::new()],
            participants,
            rule,
            turn: TurnState {
                active_side: first,
                turn_number: 1,
                shots_remaining: rule.shots_for_turn(0),
            },
            phase: Phase::AwaitingShot,
            shots_this_turn: 0,
            log: Vec::new(),
            outcome: None,
        }
    }

    /// The board owned by `side`.
    pub fn board(&self, side: Side) -> &Board {
        &self.boards[side.index()]
    }

    pub fn participant(&self, side: Side) -> &str {
        &self.participants[side.index()]
    }

    pub fn rule(&self) -> FiringRule {
        self.rule
    }

    pub fn turn(&self) -> TurnState {
        self.turn
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::MatchOver
    }

    /// Append-only history of every resolved shot.
    pub fn move_log(&self) -> &[MoveLogEntry] {
        &self.log
    }

    /// Place `side`'s fleet. Atomic: nothing changes on error.
    pub fn place_fleet(&mut self, side: Side, placements: &[ShipPlacement]) -> Result<(), BoardError> {
        self.boards[side.index()].place_fleet(placements)?;
        self.refresh_budget();
        Ok(())
    }

    /// Rebuild `side`'s board from a (possibly repeated) fleet update,
    /// keeping every cell already fired at. If the re-judged shots leave no
    /// ship afloat, the other side wins by elimination.
    pub fn rebuild_fleet(&mut self, side: Side, placements: &[ShipPlacement]) -> Result<(), BoardError> {
        if self.is_over() {
            return Err(BoardError::MatchOver);
        }
        let board = &mut self.boards[side.index()];
        board.rebuild_fleet(placements)?;
        if board.has_fleet() && board.count_alive() == 0 {
            log::warn!("fleet update for {:?} leaves no ship afloat", side);
            self.declare_outcome(side.other(), EndReason::Elimination);
            return Ok(());
        }
        self.refresh_budget();
        Ok(())
    }

    /// Adopt a new firing rule and recompute the current budget.
    pub fn set_rule(&mut self, rule: FiringRule) {
        if self.rule != rule {
            log::debug!("firing rule changed from {:?} to {:?}", self.rule, rule);
            self.rule = rule;
            self.refresh_budget();
        }
    }

    /// Recompute the active side's budget, but only before its first shot.
    fn refresh_budget(&mut self) {
        if self.phase == Phase::AwaitingShot && self.shots_this_turn == 0 {
            let alive = self.board(self.turn.active_side).count_alive();
            self.turn.shots_remaining = self.rule.shots_for_turn(alive);
        }
    }

    /// Resolve a shot by `shooter` at (row, col) on the opposing board.
    ///
    /// Rejected input (wrong side, no shots, resolved cell, finished match)
    /// leaves the engine untouched.
    pub fn fire(&mut self, shooter: Side, row: usize, col: usize) -> Result<ShotReport, BoardError> {
        match self.phase {
            Phase::MatchOver => return Err(BoardError::MatchOver),
            Phase::TurnEnded => return Err(BoardError::TurnSwitchPending),
            Phase::AwaitingShot => {}
        }
        if shooter != self.turn.active_side {
            return Err(BoardError::NotYourTurn);
        }
        if self.turn.shots_remaining == 0 {
            return Err(BoardError::NoShotsRemaining);
        }
        let target_idx = shooter.other().index();
        if !self.boards[target_idx].has_fleet() {
            return Err(BoardError::FleetUnknown);
        }

        let result = self.boards[target_idx].resolve_shot(row, col)?;
        self.log.push(MoveLogEntry {
            turn_number: self.turn.turn_number,
            actor_id: self.participants[shooter.index()].clone(),
            row: row as u8,
            col: col as u8,
            result,
        });
        self.shots_this_turn += 1;
        self.turn.shots_remaining = self.rule.remaining_after(self.turn.shots_remaining, result);

        let target = &self.boards[target_idx];
        let target_alive = target.count_alive();
        let target_composition = target.composition();
        let turn_number = self.turn.turn_number;

        // elimination wins over any turn bookkeeping
        if target_alive == 0 {
            self.declare_outcome(shooter, EndReason::Elimination);
        } else if self.turn.shots_remaining == 0 {
            self.phase = Phase::TurnEnded;
        }

        Ok(ShotReport {
            shooter,
            row,
            col,
            result,
            turn_number,
            target_alive,
            target_composition,
            shots_remaining: self.turn.shots_remaining,
            turn_ended: self.phase == Phase::TurnEnded,
            match_over: self.phase == Phase::MatchOver,
        })
    }

    /// Apply a shot observed from the other client. The shooter's own engine
    /// already enforced its budget, so the local turn state is realigned to
    /// the shooter instead of rejecting the shot. Replaying a shot at a cell
    /// that is already resolved is a no-op.
    pub fn replay_shot(&mut self, shooter: Side, row: usize, col: usize) -> Result<ShotReport, BoardError> {
        if self.phase == Phase::MatchOver {
            return Err(BoardError::MatchOver);
        }
        let target = self.board(shooter.other());
        match target.cell(row, col) {
            None => return Err(BoardError::OutOfBounds { row, col }),
            Some(cell) if cell.is_resolved() => return Err(BoardError::AlreadyResolved),
            Some(_) => {}
        }
        if !target.has_fleet() {
            return Err(BoardError::FleetUnknown);
        }

        let on_turn = self.turn.active_side == shooter;
        match self.phase {
            Phase::TurnEnded if on_turn => {
                // the shooter kept its turn (e.g. a rule update we had not seen yet)
                self.phase = Phase::AwaitingShot;
            }
            Phase::TurnEnded => self.begin_turn(shooter),
            Phase::AwaitingShot if !on_turn => {
                log::warn!(
                    "replayed shot by {:?} during turn {} of {:?}; realigning",
                    shooter,
                    self.turn.turn_number,
                    self.turn.active_side
                );
                self.begin_turn(shooter);
            }
            _ => {}
        }
        if self.turn.shots_remaining == 0 {
            self.turn.shots_remaining = 1;
        }
        self.fire(shooter, row, col)
    }

    /// Hand the turn to the other side. Returns `false` unless a hand-over was pending.
    pub fn complete_turn_switch(&mut self) -> bool {
        if self.phase != Phase::TurnEnded {
            return false;
        }
        self.begin_turn(self.turn.active_side.other());
        true
    }

    /// Like [`GameEngine::complete_turn_switch`], but only if the pending
    /// hand-over still belongs to `turn_number`. Used by delayed switches.
    pub fn complete_turn_switch_for(&mut self, turn_number: u32) -> bool {
        self.turn.turn_number == turn_number && self.complete_turn_switch()
    }

    fn begin_turn(&mut self, side: Side) {
        let alive = self.board(side).count_alive();
        self.turn = TurnState {
            active_side: side,
            turn_number: self.turn.turn_number + 1,
            shots_remaining: self.rule.shots_for_turn(alive),
        };
        self.shots_this_turn = 0;
        self.phase = Phase::AwaitingShot;
    }

    /// Record the match outcome. Only the first call has an effect; returns
    /// whether this call set it.
    pub fn declare_outcome(&mut self, winner: Side, reason: EndReason) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(MatchOutcome {
            winner,
            reason,
            winner_name: self.participants[winner.index()].clone(),
        });
        self.phase = Phase::MatchOver;
        self.turn.shots_remaining = 0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::CellStatus;
    use crate::ship::Orientation;
    use alloc::string::ToString;

    fn engine(rule: FiringRule) -> GameEngine {
        GameEngine::new(rule, ["me".to_string(), "them".to_string()], Side::Local)
    }

    #[test]
    fn cruiser_sinks_on_third_hit() {
        let mut eng = engine(FiringRule::SequentialHits);
        eng.place_fleet(Side::Local, &[ShipPlacement::new(1, 7, 7, Orientation::Horizontal)])
            .unwrap();
        eng.place_fleet(Side::Opponent, &[ShipPlacement::new(3, 2, 2, Orientation::Horizontal)])
            .unwrap();

        let first = eng.fire(Side::Local, 2, 2).unwrap();
        assert_eq!(first.result, ShotResult::Hit);
        assert_eq!(first.target_composition.get(&3), Some(&1));
        assert!(!eng.board(Side::Opponent).is_sunk(1));
        assert_eq!(eng.fire(Side::Local, 2, 3).unwrap().result, ShotResult::Hit);
        assert!(!eng.board(Side::Opponent).is_sunk(1));

        let last = eng.fire(Side::Local, 2, 4).unwrap();
        assert_eq!(last.result, ShotResult::Sunk);
        assert!(eng.board(Side::Opponent).is_sunk(1));
        assert_eq!(last.target_composition.get(&3), Some(&0));
        assert!(last.match_over);
        assert_eq!(eng.outcome().unwrap().reason, EndReason::Elimination);
        assert_eq!(eng.fire(Side::Local, 5, 5), Err(BoardError::MatchOver));
    }

    #[test]
    fn miss_is_logged_once() {
        let mut eng = engine(FiringRule::ChainAttacks);
        eng.place_fleet(Side::Local, &[ShipPlacement::new(2, 0, 0, Orientation::Vertical); 1])
            .unwrap();
        eng.place_fleet(Side::Opponent, &[ShipPlacement::new(3, 2, 2, Orientation::Horizontal)])
            .unwrap();
        eng.replay_shot(Side::Local, 5, 5).unwrap();
        assert_eq!(eng.board(Side::Opponent).cell(5, 5).unwrap().status, CellStatus::Miss);
        assert_eq!(eng.replay_shot(Side::Local, 5, 5), Err(BoardError::AlreadyResolved));
        assert_eq!(eng.move_log().len(), 1);
    }
}
