use naval_duel::{Board, Difficulty, Orientation, ShipPlacement, ShotResult, Targeter, BOARD_SIZE};
use proptest::prelude::*;
use rand::{rngs::SmallRng, SeedableRng};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn no_difficulty_repeats_a_cell(seed in any::<u64>(), level in 0usize..3) {
        let difficulty = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard][level];
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut board = Board::new();
        board.place_fleet(&Board::random_fleet(&mut rng).unwrap()).unwrap();
        let mut targeter = Targeter::new(difficulty);

        let mut shots = 0;
        while let Some((r, c)) = targeter.next_target(&board, &mut rng, None) {
            let result = board.resolve_shot(r, c);
            prop_assert!(result.is_ok(), "repeated or invalid target ({}, {})", r, c);
            targeter.record_result(&board, (r, c), result.unwrap());
            shots += 1;
        }
        prop_assert_eq!(shots, BOARD_SIZE * BOARD_SIZE);
    }
}

#[test]
fn hard_searches_even_cells_until_they_run_out() {
    let mut rng = SmallRng::seed_from_u64(11);
    let mut board = Board::new();
    let mut targeter = Targeter::new(Difficulty::Hard);
    let half = BOARD_SIZE * BOARD_SIZE / 2;
    for i in 0..BOARD_SIZE * BOARD_SIZE {
        let (r, c) = targeter.next_target(&board, &mut rng, None).unwrap();
        if i < half {
            assert_eq!((r + c) % 2, 0, "shot {} at ({}, {}) broke parity", i, r, c);
        } else {
            assert_eq!((r + c) % 2, 1);
        }
        let result = board.resolve_shot(r, c).unwrap();
        assert_eq!(result, ShotResult::Miss);
        targeter.record_result(&board, (r, c), result);
    }
    assert_eq!(targeter.next_target(&board, &mut rng, None), None);
}

#[test]
fn hunting_follows_up_around_a_hit() {
    let mut rng = SmallRng::seed_from_u64(5);
    let mut board = Board::new();
    board
        .place_fleet(&[ShipPlacement::new(3, 3, 2, Orientation::Horizontal)])
        .unwrap();
    let mut targeter = Targeter::new(Difficulty::Normal);
    let result = board.resolve_shot(3, 3).unwrap();
    targeter.record_result(&board, (3, 3), result);
    assert_eq!(targeter.hunt_stack().len(), 4);

    let next = targeter.next_target(&board, &mut rng, None).unwrap();
    let neighbours = [(2, 3), (4, 3), (3, 2), (3, 4)];
    assert!(neighbours.contains(&next));
}

#[test]
fn easy_never_hunts() {
    let mut board = Board::new();
    board
        .place_fleet(&[ShipPlacement::new(2, 0, 0, Orientation::Horizontal)])
        .unwrap();
    let mut targeter = Targeter::new(Difficulty::Easy);
    let result = board.resolve_shot(0, 0).unwrap();
    targeter.record_result(&board, (0, 0), result);
    assert!(targeter.hunt_stack().is_empty());
    assert!(!targeter.wants_suggestion(&board));
}

#[test]
fn hard_uses_a_valid_suggestion_and_ignores_a_stale_one() {
    let mut rng = SmallRng::seed_from_u64(1);
    let mut board = Board::new();
    let mut targeter = Targeter::new(Difficulty::Hard);
    assert!(targeter.wants_suggestion(&board));
    assert_eq!(targeter.next_target(&board, &mut rng, Some((2, 5))), Some((2, 5)));

    board.resolve_shot(2, 5).unwrap();
    let pick = targeter.next_target(&board, &mut rng, Some((2, 5))).unwrap();
    assert_ne!(pick, (2, 5));
    let off_board = targeter.next_target(&board, &mut rng, Some((9, 9))).unwrap();
    assert!(off_board.0 < BOARD_SIZE && off_board.1 < BOARD_SIZE);
}

#[test]
fn hard_asks_again_once_queued_candidates_are_resolved() {
    let mut board = Board::new();
    board
        .place_fleet(&[ShipPlacement::new(1, 0, 0, Orientation::Horizontal)])
        .unwrap();
    let mut targeter = Targeter::new(Difficulty::Hard);
    let result = board.resolve_shot(0, 0).unwrap();
    targeter.record_result(&board, (0, 0), result);
    assert_eq!(targeter.hunt_stack().len(), 2);
    assert!(!targeter.wants_suggestion(&board));

    // both neighbours get fired at by some other path
    board.resolve_shot(1, 0).unwrap();
    board.resolve_shot(0, 1).unwrap();
    assert!(targeter.wants_suggestion(&board));
    assert!(targeter.hunt_stack().is_empty());

    let mut rng = SmallRng::seed_from_u64(3);
    assert_eq!(targeter.next_target(&board, &mut rng, Some((6, 6))), Some((6, 6)));
}
