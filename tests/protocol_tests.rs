use naval_duel::protocol::{
    decode_record, encode_record, MoveEvent, StatusEvent, SyncPath, SyncRecord, MAX_FRAME_SIZE,
};
use naval_duel::sync::Subscription;
use naval_duel::{FiringRule, Orientation, ShipPlacement, ShotResult};
use proptest::prelude::*;
use tokio::sync::mpsc;

fn arb_record() -> impl Strategy<Value = SyncRecord> {
    prop_oneof![
        ("[a-z]{1,8}", any::<u8>(), any::<u8>(), any::<u32>()).prop_map(|(actor, row, col, turn)| {
            SyncRecord::Move(MoveEvent {
                actor,
                row,
                col,
                result: ShotResult::Hit,
                turn_number: turn,
            })
        }),
        any::<u64>().prop_map(|timestamp_ms| SyncRecord::Presence { timestamp_ms }),
        "[a-z_]{0,16}".prop_map(SyncRecord::Status),
        Just(SyncRecord::Rule(FiringRule::SequentialHits)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn decoding_garbage_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_record(&data);
    }

    #[test]
    fn truncated_frames_are_rejected(record in arb_record()) {
        let data = encode_record(&record).unwrap();
        prop_assert_eq!(decode_record(&data).unwrap(), record);
        prop_assert!(decode_record(&data[..data.len() - 1]).is_err());
    }
}

#[test]
fn oversized_frames_are_rejected_both_ways() {
    let huge = SyncRecord::Status("x".repeat(MAX_FRAME_SIZE));
    let err = encode_record(&huge).unwrap_err();
    assert!(err.to_string().contains("too large"));
    assert!(decode_record(&vec![0u8; MAX_FRAME_SIZE + 1]).is_err());
}

#[test]
fn status_round_trips_through_its_string_form() {
    for event in [
        StatusEvent::Surrender("p_1".into()),
        StatusEvent::Timeout("p_2".into()),
    ] {
        assert_eq!(StatusEvent::parse(&event.to_string()), Some(event.clone()));
    }
    assert_eq!(StatusEvent::Surrender("p_1".into()).subject(), "p_1");
}

#[tokio::test]
async fn subscription_skips_undecodable_frames() {
    let (tx, rx) = mpsc::unbounded_channel();
    let released = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = released.clone();
    let mut sub = Subscription::new(SyncPath::Fleet("p".into()), rx, move || {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    });

    let fleet = SyncRecord::Fleet(vec![ShipPlacement::new(2, 1, 1, Orientation::Vertical)]);
    tx.send(vec![0xde, 0xad]).unwrap();
    tx.send(Vec::new()).unwrap();
    tx.send(encode_record(&fleet).unwrap()).unwrap();
    assert_eq!(sub.next().await, Some(fleet));

    drop(tx);
    assert_eq!(sub.next().await, None);
    drop(sub);
    assert!(released.load(std::sync::atomic::Ordering::SeqCst));
}
