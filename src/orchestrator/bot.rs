use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::ai::{Difficulty, Targeter};
use crate::game::MatchOutcome;
use crate::orchestrator::RemoteMatch;

/// Play the local side of a remote match with the targeting AI until the
/// match ends. Returns the outcome, or `None` if the match went away first.
pub async fn run_bot(game: &RemoteMatch, difficulty: Difficulty, seed: u64) -> Option<MatchOutcome> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut targeter = Targeter::new(difficulty);
    let mut updates = game.subscribe();

    loop {
        let snap = updates.borrow_and_update().clone();
        if snap.game_over {
            return snap.outcome;
        }
        if snap.can_fire() {
            let Some((row, col)) = targeter.next_target(&snap.target_board, &mut rng, None) else {
                log::warn!("[bot] nothing left to shoot at");
                return None;
            };
            if let Some(report) = game.fire(row, col).await {
                targeter.record_result(&snap.target_board, (row, col), report.result);
                continue;
            }
        }
        if updates.changed().await.is_err() {
            return game.snapshot().outcome;
        }
    }
}
