//! Firing rules: how many shots a side gets and when its turn ends.

use crate::common::ShotResult;

/// Per-match shot policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum FiringRule {
    /// One shot per turn.
    #[default]
    OneShot,
    /// As many shots as the shooter has ships afloat when the turn begins.
    ChainAttacks,
    /// One shot, plus one more after every hit; the first miss ends the turn.
    SequentialHits,
}

impl FiringRule {
    /// Shots granted at the start of a turn to a shooter with `own_alive` ships afloat.
    pub fn shots_for_turn(self, own_alive: usize) -> u32 {
        match self {
            FiringRule::OneShot | FiringRule::SequentialHits => 1,
            FiringRule::ChainAttacks => (own_alive as u32).max(1),
        }
    }

    /// Shots left after a shot resolved with `result`, given `remaining` before it.
    pub fn remaining_after(self, remaining: u32, result: ShotResult) -> u32 {
        match self {
            FiringRule::OneShot => 0,
            FiringRule::ChainAttacks => remaining.saturating_sub(1),
            FiringRule::SequentialHits => {
                if result.is_hit() {
                    1
                } else {
                    0
                }
            }
        }
    }

    /// Stable name used on the wire and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            FiringRule::OneShot => "one_shot",
            FiringRule::ChainAttacks => "chain_attacks",
            FiringRule::SequentialHits => "sequential_hits",
        }
    }
}

impl core::str::FromStr for FiringRule {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_shot" => Ok(FiringRule::OneShot),
            "chain_attacks" => Ok(FiringRule::ChainAttacks),
            "sequential_hits" => Ok(FiringRule::SequentialHits),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_always_ends_the_turn() {
        for result in [ShotResult::Miss, ShotResult::Hit, ShotResult::Sunk] {
            assert_eq!(FiringRule::OneShot.remaining_after(1, result), 0);
        }
    }

    #[test]
    fn sequential_hits_bonus_is_not_cumulative() {
        let rule = FiringRule::SequentialHits;
        assert_eq!(rule.remaining_after(1, ShotResult::Hit), 1);
        assert_eq!(rule.remaining_after(1, ShotResult::Sunk), 1);
        assert_eq!(rule.remaining_after(1, ShotResult::Miss), 0);
    }

    #[test]
    fn chain_attacks_budget_tracks_own_fleet() {
        assert_eq!(FiringRule::ChainAttacks.shots_for_turn(5), 5);
        assert_eq!(FiringRule::ChainAttacks.remaining_after(5, ShotResult::Sunk), 4);
    }
}
