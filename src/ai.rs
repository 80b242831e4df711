// Targeting policy for the computer opponent.
// Works on any board whose hits and misses are visible; intact ship cells
// are never consulted, so a masked view gives the same answers.

use alloc::vec::Vec;
use rand::Rng;

use crate::bitboard::CellMask;
use crate::board::Board;
use crate::common::ShotResult;
use crate::config::{BOARD_SIZE, PARITY_ATTEMPTS};

/// AI strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum Difficulty {
    /// Uniformly random unresolved cells, no hunting.
    Easy,
    /// Random search plus hunting around hits.
    #[default]
    Normal,
    /// Checkerboard search, hunting, optional remote predictions.
    Hard,
}

impl Difficulty {
    fn hunts(self) -> bool {
        self != Difficulty::Easy
    }
}

/// Per-match targeting state: difficulty plus the hunt stack.
#[derive(Debug, Clone)]
pub struct Targeter {
    difficulty: Difficulty,
    hunt_stack: Vec<(usize, usize)>,
}

impl Targeter {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            hunt_stack: Vec::new(),
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Candidates queued around earlier hits, next one last.
    pub fn hunt_stack(&self) -> &[(usize, usize)] {
        &self.hunt_stack
    }

    /// Whether a remote prediction would be used for the next shot on
    /// `board`. Only hard difficulty asks, and only while no usable hunt
    /// candidate is queued; candidates resolved since they were queued are
    /// dropped first.
    pub fn wants_suggestion(&mut self, board: &Board) -> bool {
        if self.difficulty != Difficulty::Hard {
            return false;
        }
        self.drop_stale(board);
        self.hunt_stack.is_empty()
    }

    fn drop_stale(&mut self, board: &Board) {
        while let Some(&(r, c)) = self.hunt_stack.last() {
            if !board.is_resolved(r, c) {
                break;
            }
            self.hunt_stack.pop();
        }
    }

    /// Choose the next cell to fire at on `board`, or `None` once every cell
    /// is resolved. `suggestion` is a remote prediction; it is used as-is for
    /// hard difficulty when it names an unresolved cell on the board.
    pub fn next_target<R: Rng + ?Sized>(
        &mut self,
        board: &Board,
        rng: &mut R,
        suggestion: Option<(usize, usize)>,
    ) -> Option<(usize, usize)> {
        if self.difficulty.hunts() {
            self.drop_stale(board);
            if let Some(next) = self.hunt_stack.pop() {
                return Some(next);
            }
        }

        let open = !board.resolved_mask();
        if open.is_empty() {
            return None;
        }
        match self.difficulty {
            Difficulty::Easy | Difficulty::Normal => pick_uniform(&open, rng),
            Difficulty::Hard => {
                if let Some((r, c)) = suggestion {
                    if r < BOARD_SIZE && c < BOARD_SIZE && !board.is_resolved(r, c) {
                        return Some((r, c));
                    }
                    log::debug!("ignoring unusable suggestion ({}, {})", r, c);
                }
                pick_parity(&open, rng).or_else(|| pick_uniform(&open, rng))
            }
        }
    }

    /// Feed back the result of the last shot. Hits queue the orthogonal
    /// neighbours that are still open.
    pub fn record_result(&mut self, board: &Board, coord: (usize, usize), result: ShotResult) {
        if !self.difficulty.hunts() || !result.is_hit() {
            return;
        }
        let (r, c) = coord;
        let neighbours = [
            (r.wrapping_sub(1), c),
            (r + 1, c),
            (r, c.wrapping_sub(1)),
            (r, c + 1),
        ];
        for (nr, nc) in neighbours {
            if nr < BOARD_SIZE && nc < BOARD_SIZE && !board.is_resolved(nr, nc) {
                self.hunt_stack.push((nr, nc));
            }
        }
    }
}

fn pick_uniform<R: Rng + ?Sized>(open: &CellMask, rng: &mut R) -> Option<(usize, usize)> {
    let count = open.count_ones();
    if count == 0 {
        return None;
    }
    open.nth_set(rng.random_range(0..count))
}

/// Even-parity search: a bounded number of random draws, then any open even
/// cell still left.
fn pick_parity<R: Rng + ?Sized>(open: &CellMask, rng: &mut R) -> Option<(usize, usize)> {
    let candidates = *open & CellMask::checkerboard(0);
    if candidates.is_empty() {
        return None;
    }
    for _ in 0..PARITY_ATTEMPTS {
        let r = rng.random_range(0..BOARD_SIZE);
        let c = rng.random_range(0..BOARD_SIZE);
        if candidates.get(r, c).unwrap_or(false) {
            return Some((r, c));
        }
    }
    pick_uniform(&candidates, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ship::{Orientation, ShipPlacement};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn hunt_stack_pops_most_recent_neighbour_first() {
        let mut board = Board::new();
        board
            .place_ship(ShipPlacement::new(2, 3, 3, Orientation::Horizontal))
            .unwrap();
        let result = board.resolve_shot(3, 3).unwrap();
        let mut ai = Targeter::new(Difficulty::Normal);
        ai.record_result(&board, (3, 3), result);
        assert_eq!(ai.hunt_stack(), &[(2, 3), (4, 3), (3, 2), (3, 4)]);

        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(ai.next_target(&board, &mut rng, None), Some((3, 4)));
    }

    #[test]
    fn stale_hunt_candidates_are_skipped() {
        let mut board = Board::new();
        board
            .place_ship(ShipPlacement::new(1, 0, 0, Orientation::Horizontal))
            .unwrap();
        let result = board.resolve_shot(0, 0).unwrap();
        let mut ai = Targeter::new(Difficulty::Hard);
        ai.record_result(&board, (0, 0), result);
        board.resolve_shot(0, 1).unwrap();

        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(ai.next_target(&board, &mut rng, None), Some((1, 0)));
        assert!(ai.hunt_stack().is_empty());
    }

    #[test]
    fn easy_ignores_hits() {
        let mut board = Board::new();
        board
            .place_ship(ShipPlacement::new(2, 0, 0, Orientation::Horizontal))
            .unwrap();
        let result = board.resolve_shot(0, 0).unwrap();
        let mut ai = Targeter::new(Difficulty::Easy);
        ai.record_result(&board, (0, 0), result);
        assert!(ai.hunt_stack().is_empty());
    }

    #[test]
    fn hard_uses_valid_suggestion_and_rejects_bad_ones() {
        let mut board = Board::new();
        board.resolve_shot(4, 4).unwrap();
        let mut ai = Targeter::new(Difficulty::Hard);
        let mut rng = SmallRng::seed_from_u64(9);
        assert_eq!(ai.next_target(&board, &mut rng, Some((1, 2))), Some((1, 2)));

        for bad in [(4, 4), (9, 0), (0, 8)] {
            let (r, c) = ai.next_target(&board, &mut rng, Some(bad)).unwrap();
            assert_eq!((r + c) % 2, 0);
            assert!(!board.is_resolved(r, c));
        }
    }
}
