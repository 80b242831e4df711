//! Match constants and tunable timings.

/// Width and height of every board.
pub const BOARD_SIZE: usize = 8;
/// Number of ships in a standard fleet.
pub const NUM_SHIPS: usize = 8;
/// Ship sizes making up a standard fleet, largest first.
pub const FLEET: [u8; NUM_SHIPS] = [4, 3, 3, 2, 2, 2, 1, 1];
/// Largest ship size accepted by the board.
pub const MAX_SHIP_SIZE: u8 = 4;

/// Random placement attempts per ship before giving up.
pub const MAX_PLACEMENT_ATTEMPTS: usize = 100;
/// Whole-fleet restarts allowed when random placement paints itself into a corner.
pub const MAX_FLEET_RESTARTS: usize = 20;
/// Random draws the hard AI makes on its parity class before enumerating.
pub const PARITY_ATTEMPTS: usize = 64;

#[cfg(feature = "std")]
pub use timing::MatchTiming;

#[cfg(feature = "std")]
mod timing {
    use std::env;
    use std::time::Duration;

    /// Pacing and liveness timings for a match.
    ///
    /// None of these values affect correctness: ordering is guaranteed by the
    /// single state owner, the delays only pace the game for humans.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct MatchTiming {
        /// How often a client rewrites its own presence slot.
        pub heartbeat_interval: Duration,
        /// How often a client checks the peer's last presence receipt.
        pub watchdog_interval: Duration,
        /// Silence after which the peer is presumed gone.
        pub peer_timeout: Duration,
        /// Pause between the end of a turn and the hand-over.
        pub turn_switch_delay: Duration,
        /// Pause before every AI shot.
        pub ai_think_delay: Duration,
        /// Upper bound for a remote move prediction.
        pub inference_timeout: Duration,
    }

    impl Default for MatchTiming {
        fn default() -> Self {
            Self {
                heartbeat_interval: Duration::from_secs(3),
                watchdog_interval: Duration::from_secs(5),
                peer_timeout: Duration::from_secs(20),
                turn_switch_delay: Duration::from_millis(1200),
                ai_think_delay: Duration::from_millis(800),
                inference_timeout: Duration::from_secs(2),
            }
        }
    }

    impl MatchTiming {
        /// Zero pacing delays with short liveness timings. Used by simulations and tests.
        pub fn instant() -> Self {
            Self {
                heartbeat_interval: Duration::from_millis(20),
                watchdog_interval: Duration::from_millis(40),
                peer_timeout: Duration::from_millis(400),
                turn_switch_delay: Duration::ZERO,
                ai_think_delay: Duration::ZERO,
                inference_timeout: Duration::from_millis(200),
            }
        }

        /// Start from the defaults and override each field from its
        /// `NAVAL_DUEL_<FIELD>_MS` environment variable when set and valid.
        pub fn from_env() -> Self {
            let mut timing = Self::default();
            let read = |name: &str, slot: &mut Duration| {
                if let Some(ms) = env::var(name).ok().and_then(|v| v.parse::<u64>().ok()) {
                    *slot = Duration::from_millis(ms);
                }
            };
            read("NAVAL_DUEL_HEARTBEAT_MS", &mut timing.heartbeat_interval);
            read("NAVAL_DUEL_WATCHDOG_MS", &mut timing.watchdog_interval);
            read("NAVAL_DUEL_PEER_TIMEOUT_MS", &mut timing.peer_timeout);
            read("NAVAL_DUEL_TURN_SWITCH_MS", &mut timing.turn_switch_delay);
            read("NAVAL_DUEL_AI_THINK_MS", &mut timing.ai_think_delay);
            read("NAVAL_DUEL_INFERENCE_TIMEOUT_MS", &mut timing.inference_timeout);
            timing
        }

        /// Checks that the liveness timings can actually detect a silent peer.
        pub fn validate(&self) -> anyhow::Result<()> {
            if self.heartbeat_interval.is_zero() || self.watchdog_interval.is_zero() {
                return Err(anyhow::anyhow!("heartbeat and watchdog intervals must be non-zero"));
            }
            if self.heartbeat_interval >= self.peer_timeout {
                return Err(anyhow::anyhow!(
                    "heartbeat interval {:?} must be shorter than peer timeout {:?}",
                    self.heartbeat_interval,
                    self.peer_timeout
                ));
            }
            if self.watchdog_interval >= self.peer_timeout {
                return Err(anyhow::anyhow!(
                    "watchdog interval {:?} must be shorter than peer timeout {:?}",
                    self.watchdog_interval,
                    self.peer_timeout
                ));
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn default_and_instant_timings_are_consistent() {
            assert!(MatchTiming::default().validate().is_ok());
            assert!(MatchTiming::instant().validate().is_ok());
        }

        #[test]
        fn watchdog_longer_than_timeout_is_rejected() {
            let timing = MatchTiming {
                watchdog_interval: Duration::from_secs(30),
                ..MatchTiming::default()
            };
            assert!(timing.validate().is_err());
        }
    }
}
