//! Common types for the match engine: board errors and shot results.

/// Result of a resolved shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum ShotResult {
    /// Shot landed in open water.
    Miss,
    /// Shot struck a ship that is still afloat.
    Hit,
    /// Shot struck the last intact segment of a ship.
    Sunk,
}

impl ShotResult {
    /// `true` for both `Hit` and `Sunk`.
    pub fn is_hit(self) -> bool {
        !matches!(self, ShotResult::Miss)
    }

    /// Upper-case label used in persisted move logs.
    pub fn label(self) -> &'static str {
        match self {
            ShotResult::Miss => "MISS",
            ShotResult::Hit => "HIT",
            ShotResult::Sunk => "SUNK",
        }
    }
}

impl core::fmt::Display for ShotResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors returned by board and engine operations.
///
/// Every variant describes input that is rejected without touching state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Coordinate lies outside the board.
    OutOfBounds { row: usize, col: usize },
    /// Ship size is zero or larger than any ship in the fleet.
    InvalidShipSize(u8),
    /// Ship placement runs off the board.
    ShipOutOfBounds,
    /// Ship placement overlaps another ship.
    ShipOverlaps,
    /// Fleet does not match the standard composition.
    WrongComposition,
    /// Unable to place ship (random placement failed).
    UnableToPlaceShip,
    /// Cell was already resolved as a hit or miss.
    AlreadyResolved,
    /// The shooter is not the side to move.
    NotYourTurn,
    /// The shooter has no shots left this turn.
    NoShotsRemaining,
    /// The turn has ended and the hand-over has not happened yet.
    TurnSwitchPending,
    /// The opponent's fleet is not known yet.
    FleetUnknown,
    /// The match already has an outcome.
    MatchOver,
}

impl core::fmt::Display for BoardError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BoardError::OutOfBounds { row, col } => {
                write!(f, "Coordinate ({}, {}) is off the board", row, col)
            }
            BoardError::InvalidShipSize(size) => write!(f, "Invalid ship size {}", size),
            BoardError::ShipOutOfBounds => write!(f, "Ship placement is out of bounds"),
            BoardError::ShipOverlaps => write!(f, "Ship placement overlaps with another ship"),
            BoardError::WrongComposition => write!(f, "Fleet does not match the standard composition"),
            BoardError::UnableToPlaceShip => write!(f, "Unable to place ship"),
            BoardError::AlreadyResolved => write!(f, "Cell was already fired upon"),
            BoardError::NotYourTurn => write!(f, "It is not this side's turn"),
            BoardError::NoShotsRemaining => write!(f, "No shots remaining this turn"),
            BoardError::TurnSwitchPending => write!(f, "Turn is being handed over"),
            BoardError::FleetUnknown => write!(f, "Opponent fleet is not known yet"),
            BoardError::MatchOver => write!(f, "Match is already over"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BoardError {}
