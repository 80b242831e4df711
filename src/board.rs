//! Board state: an 8×8 cell matrix with ship placements, hits and misses.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;
use rand::Rng;

use crate::bitboard::CellMask;
use crate::common::{BoardError, ShotResult};
use crate::config::{BOARD_SIZE, FLEET, MAX_FLEET_RESTARTS, MAX_PLACEMENT_ATTEMPTS};
use crate::ship::{Orientation, ShipPlacement};

/// Alive ships per size. Sizes whose ships are all sunk stay in the map with 0.
pub type Composition = BTreeMap<u8, usize>;

/// State of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum CellStatus {
    Empty,
    Ship,
    Hit,
    Miss,
}

/// One cell of a board. `ship_id` is 0 when no ship occupies the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    pub row: u8,
    pub col: u8,
    pub status: CellStatus,
    pub ship_id: u8,
    pub original_size: u8,
}

impl Cell {
    fn empty(row: usize, col: usize) -> Self {
        Cell {
            row: row as u8,
            col: col as u8,
            status: CellStatus::Empty,
            ship_id: 0,
            original_size: 0,
        }
    }

    /// `true` once the cell has been fired upon.
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, CellStatus::Hit | CellStatus::Miss)
    }
}

/// One side's board.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
    placements: Vec<ShipPlacement>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Create an empty board (no ships, nothing fired).
    pub fn new() -> Self {
        Board {
            cells: core::array::from_fn(|r| core::array::from_fn(|c| Cell::empty(r, c))),
            placements: Vec::new(),
        }
    }

    /// Cell at (row, col), or `None` off the board.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(row).and_then(|r| r.get(col))
    }

    /// Rows of cells, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell; BOARD_SIZE]> {
        self.cells.iter()
    }

    /// Ships placed so far, in ship-id order (id = index + 1).
    pub fn placements(&self) -> &[ShipPlacement] {
        &self.placements
    }

    /// Whether any fleet has been placed on this board.
    pub fn has_fleet(&self) -> bool {
        !self.placements.is_empty()
    }

    /// `true` iff every cell the ship would cover is on the board and Empty.
    pub fn validate_placement(
        &self,
        row: usize,
        col: usize,
        size: u8,
        orientation: Orientation,
    ) -> bool {
        if row >= BOARD_SIZE || col >= BOARD_SIZE {
            return false;
        }
        let placement = ShipPlacement::new(size, row as u8, col as u8, orientation);
        self.check_placement(&placement).is_ok()
    }

    fn check_placement(&self, placement: &ShipPlacement) -> Result<(), BoardError> {
        placement.check_size()?;
        if !placement.in_bounds() {
            return Err(BoardError::ShipOutOfBounds);
        }
        if placement
            .cells()
            .any(|(r, c)| self.cells[r][c].status != CellStatus::Empty)
        {
            return Err(BoardError::ShipOverlaps);
        }
        Ok(())
    }

    /// Place a single ship, returning its ship id. The board is untouched on error.
    pub fn place_ship(&mut self, placement: ShipPlacement) -> Result<u8, BoardError> {
        self.check_placement(&placement)?;
        self.placements.push(placement);
        let ship_id = self.placements.len() as u8;
        for (r, c) in placement.cells() {
            let cell = &mut self.cells[r][c];
            cell.status = CellStatus::Ship;
            cell.ship_id = ship_id;
            cell.original_size = placement.size;
        }
        Ok(ship_id)
    }

    /// Place a whole fleet. Ship ids are the 1-based positions in `placements`.
    /// Either every ship is placed or the board is left unchanged.
    pub fn place_fleet(&mut self, placements: &[ShipPlacement]) -> Result<(), BoardError> {
        let mut staged = self.clone();
        for placement in placements {
            staged.place_ship(*placement)?;
        }
        *self = staged;
        Ok(())
    }

    /// Replace the fleet on a mirror board while keeping every cell that was
    /// already fired at. Previously resolved cells are re-judged against the
    /// new fleet, so applying the same fleet twice is a no-op.
    pub fn rebuild_fleet(&mut self, placements: &[ShipPlacement]) -> Result<(), BoardError> {
        let fired = self.resolved_mask();
        let mut rebuilt = Board::new();
        rebuilt.place_fleet(placements)?;
        for (r, c) in fired.iter_set_bits() {
            let cell = &mut rebuilt.cells[r][c];
            cell.status = if cell.ship_id > 0 {
                CellStatus::Hit
            } else {
                CellStatus::Miss
            };
        }
        *self = rebuilt;
        Ok(())
    }

    /// Fire at (row, col). Already-resolved cells are rejected without mutation.
    pub fn resolve_shot(&mut self, row: usize, col: usize) -> Result<ShotResult, BoardError> {
        let cell = self
            .cells
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or(BoardError::OutOfBounds { row, col })?;
        match cell.status {
            CellStatus::Hit | CellStatus::Miss => Err(BoardError::AlreadyResolved),
            CellStatus::Empty => {
                cell.status = CellStatus::Miss;
                Ok(ShotResult::Miss)
            }
            CellStatus::Ship => {
                cell.status = CellStatus::Hit;
                let ship_id = cell.ship_id;
                if self.is_sunk(ship_id) {
                    Ok(ShotResult::Sunk)
                } else {
                    Ok(ShotResult::Hit)
                }
            }
        }
    }

    /// `true` iff no cell of the ship remains intact.
    pub fn is_sunk(&self, ship_id: u8) -> bool {
        !self
            .iter_cells()
            .any(|cell| cell.ship_id == ship_id && cell.status == CellStatus::Ship)
    }

    /// Number of distinct ships with at least one intact cell.
    pub fn count_alive(&self) -> usize {
        (1..=self.placements.len() as u8)
            .filter(|&id| !self.is_sunk(id))
            .count()
    }

    /// Alive ships per size, including sizes with nothing left afloat.
    pub fn composition(&self) -> Composition {
        let mut composition = Composition::new();
        for (i, placement) in self.placements.iter().enumerate() {
            let alive = composition.entry(placement.size).or_insert(0);
            if !self.is_sunk(i as u8 + 1) {
                *alive += 1;
            }
        }
        composition
    }

    /// Whether (row, col) has already been fired at. Off-board cells count as resolved.
    pub fn is_resolved(&self, row: usize, col: usize) -> bool {
        self.cell(row, col).map_or(true, Cell::is_resolved)
    }

    /// Mask of all cells fired at so far.
    pub fn resolved_mask(&self) -> CellMask {
        let mut mask = CellMask::new();
        for cell in self.iter_cells().filter(|c| c.is_resolved()) {
            // cell coordinates always lie on the board
            let _ = mask.set(cell.row as usize, cell.col as usize);
        }
        mask
    }

    /// Copy of the board as the opponent is allowed to see it: intact ship
    /// cells are shown as water, hits and misses stay visible.
    pub fn masked(&self) -> Board {
        let mut view = Board::new();
        for cell in self.iter_cells() {
            let shown = &mut view.cells[cell.row as usize][cell.col as usize];
            match cell.status {
                CellStatus::Hit => *shown = *cell,
                CellStatus::Miss => shown.status = CellStatus::Miss,
                CellStatus::Ship | CellStatus::Empty => {}
            }
        }
        view
    }

    fn iter_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flat_map(|row| row.iter())
    }

    /// Random placement for a ship of `size` that fits the current board.
    pub fn random_placement<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        size: u8,
    ) -> Result<ShipPlacement, BoardError> {
        if size == 0 || size as usize > BOARD_SIZE {
            return Err(BoardError::InvalidShipSize(size));
        }
        let span = BOARD_SIZE - size as usize;
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let orientation = if rng.random() {
                Orientation::Horizontal
            } else {
                Orientation::Vertical
            };
            let (max_r, max_c) = match orientation {
                Orientation::Horizontal => (BOARD_SIZE - 1, span),
                Orientation::Vertical => (span, BOARD_SIZE - 1),
            };
            let r = rng.random_range(0..=max_r);
            let c = rng.random_range(0..=max_c);
            if self.validate_placement(r, c, size, orientation) {
                return Ok(ShipPlacement::new(size, r as u8, c as u8, orientation));
            }
        }
        Err(BoardError::UnableToPlaceShip)
    }

    /// Generate a complete standard fleet that fits on an empty board.
    pub fn random_fleet<R: Rng + ?Sized>(rng: &mut R) -> Result<Vec<ShipPlacement>, BoardError> {
        'restart: for _ in 0..MAX_FLEET_RESTARTS {
            let mut board = Board::new();
            for &size in FLEET.iter() {
                match board.random_placement(rng, size) {
                    Ok(placement) => {
                        board.place_ship(placement)?;
                    }
                    Err(BoardError::UnableToPlaceShip) => continue 'restart,
                    Err(e) => return Err(e),
                }
            }
            return Ok(board.placements);
        }
        Err(BoardError::UnableToPlaceShip)
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Board {{ ships: {}, alive: {} }}", self.placements.len(), self.count_alive())?;
        for row in self.cells.iter() {
            for cell in row.iter() {
                let ch = match cell.status {
                    CellStatus::Empty => '.',
                    CellStatus::Ship => 'S',
                    CellStatus::Hit => 'X',
                    CellStatus::Miss => 'o',
                };
                write!(f, "{} ", ch)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn random_fleet_places_the_standard_inventory() {
        let mut rng = SmallRng::seed_from_u64(7);
        let fleet = Board::random_fleet(&mut rng).unwrap();
        assert!(crate::ship::validate_fleet(&fleet).is_ok());
    }

    #[test]
    fn rebuild_keeps_history_and_is_idempotent() {
        let fleet = [ShipPlacement::new(2, 0, 0, Orientation::Horizontal)];
        let mut mirror = Board::new();
        // shots land before the fleet is known
        assert_eq!(mirror.resolve_shot(0, 0), Ok(ShotResult::Miss));
        assert_eq!(mirror.resolve_shot(5, 5), Ok(ShotResult::Miss));

        mirror.rebuild_fleet(&fleet).unwrap();
        assert_eq!(mirror.cell(0, 0).unwrap().status, CellStatus::Hit);
        assert_eq!(mirror.cell(5, 5).unwrap().status, CellStatus::Miss);
        assert_eq!(mirror.cell(0, 1).unwrap().status, CellStatus::Ship);
        let once = mirror.clone();

        mirror.rebuild_fleet(&fleet).unwrap();
        assert_eq!(mirror, once);
        assert_eq!(mirror.count_alive(), 1);
    }

    #[test]
    fn masked_view_hides_intact_ships() {
        let mut board = Board::new();
        board
            .place_ship(ShipPlacement::new(2, 3, 3, Orientation::Vertical))
            .unwrap();
        board.resolve_shot(3, 3).unwrap();
        let view = board.masked();
        assert_eq!(view.cell(3, 3).unwrap().status, CellStatus::Hit);
        assert_eq!(view.cell(4, 3).unwrap().status, CellStatus::Empty);
        assert!(!view.has_fleet());
    }
}
