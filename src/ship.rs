//! Ship placements and fleet inventory.

use alloc::vec::Vec;

use crate::common::BoardError;
use crate::config::{BOARD_SIZE, FLEET, MAX_SHIP_SIZE};

/// Orientation of a ship on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// One ship of a fleet: its size, origin cell and orientation.
///
/// The origin is the top-left segment; horizontal ships extend to the right,
/// vertical ships extend downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct ShipPlacement {
    pub size: u8,
    pub row: u8,
    pub col: u8,
    pub orientation: Orientation,
}

impl ShipPlacement {
    pub const fn new(size: u8, row: u8, col: u8, orientation: Orientation) -> Self {
        Self {
            size,
            row,
            col,
            orientation,
        }
    }

    /// Cells covered by the ship, origin first. Cells may lie off the board;
    /// use [`ShipPlacement::in_bounds`] before trusting them.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let (row, col, orientation) = (self.row as usize, self.col as usize, self.orientation);
        (0..self.size as usize).map(move |i| match orientation {
            Orientation::Horizontal => (row, col + i),
            Orientation::Vertical => (row + i, col),
        })
    }

    /// `true` when every covered cell lies on the board.
    pub fn in_bounds(&self) -> bool {
        let (row, col, len) = (self.row as usize, self.col as usize, self.size as usize);
        match self.orientation {
            Orientation::Horizontal => row < BOARD_SIZE && col + len <= BOARD_SIZE,
            Orientation::Vertical => col < BOARD_SIZE && row + len <= BOARD_SIZE,
        }
    }

    /// Whether the ship covers (row, col).
    pub fn covers(&self, row: usize, col: usize) -> bool {
        self.cells().any(|cell| cell == (row, col))
    }

    pub(crate) fn check_size(&self) -> Result<(), BoardError> {
        if self.size == 0 || self.size > MAX_SHIP_SIZE {
            Err(BoardError::InvalidShipSize(self.size))
        } else {
            Ok(())
        }
    }
}

/// Sizes of a fleet in descending order.
pub fn fleet_sizes(placements: &[ShipPlacement]) -> Vec<u8> {
    let mut sizes: Vec<u8> = placements.iter().map(|p| p.size).collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    sizes
}

/// Checks a fleet against the standard inventory and the placement rules:
/// right sizes, every cell on the board, no two ships sharing a cell.
pub fn validate_fleet(placements: &[ShipPlacement]) -> Result<(), BoardError> {
    if fleet_sizes(placements).as_slice() != FLEET.as_slice() {
        return Err(BoardError::WrongComposition);
    }
    let mut board = crate::board::Board::new();
    board.place_fleet(placements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_follow_orientation() {
        let h = ShipPlacement::new(3, 2, 2, Orientation::Horizontal);
        let cells: Vec<_> = h.cells().collect();
        assert_eq!(cells, [(2, 2), (2, 3), (2, 4)]);
        let v = ShipPlacement::new(2, 6, 0, Orientation::Vertical);
        assert!(v.covers(7, 0));
        assert!(v.in_bounds());
    }

    #[test]
    fn placement_running_off_the_edge_is_out_of_bounds() {
        assert!(!ShipPlacement::new(4, 0, 5, Orientation::Horizontal).in_bounds());
        assert!(!ShipPlacement::new(2, 7, 3, Orientation::Vertical).in_bounds());
        assert!(ShipPlacement::new(1, 7, 7, Orientation::Vertical).in_bounds());
    }

    #[test]
    fn fleet_with_wrong_inventory_is_rejected() {
        let fleet = [ShipPlacement::new(4, 0, 0, Orientation::Horizontal)];
        assert_eq!(validate_fleet(&fleet), Err(BoardError::WrongComposition));
    }
}
