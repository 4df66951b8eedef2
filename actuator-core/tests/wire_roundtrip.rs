use core::time::Duration;

use actuator_core::decode::{FRAME_END, FRAME_START, HEADER_SIZE, MAX_PAYLOAD_SIZE, StatusMonitor};
use actuator_core::mapping::RELAY_ROW_COUNT;
use actuator_core::relay::{NoopRelayDriver, RelayBank, TickInstant};
use actuator_core::report;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct MsInstant(u64);

impl TickInstant for MsInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

fn new_bank() -> RelayBank<NoopRelayDriver, MsInstant> {
    RelayBank::new(NoopRelayDriver::new())
}

#[test]
fn full_snapshot_survives_the_wire_in_tiny_chunks() {
    let mut bank = new_bank();
    bank.activate(0, MsInstant(0));
    bank.pause_single(0, MsInstant(1_250));

    let frame = report::encode_all(&mut bank, 1_250).expect("snapshot encodes");
    assert!(
        frame[HEADER_SIZE..].starts_with(FRAME_START),
        "encoder output must begin with the decoder's start marker"
    );
    assert!(frame.ends_with(FRAME_END));

    let mut monitor = StatusMonitor::new();
    let mut merged = 0;
    for chunk in frame.as_bytes().chunks(1) {
        merged += monitor.ingest(chunk);
    }
    assert_eq!(merged, 1, "one document should come out of the stream");

    let store = monitor.store();
    for row in 0..RELAY_ROW_COUNT {
        assert!(store.actuator(row).seen, "row {row} must appear in the store");
    }
    assert_eq!(store.actuator(0).position, 1_250);
    assert_eq!(store.actuator(4).position, 1_250, "pair mirrors the position");
    assert_eq!(store.actuator(0).mode, "IDLE");
    assert_eq!(store.actuator(0).max_duration, 8_000);
    assert_eq!(store.last_timestamp(), 1_250);
}

#[test]
fn delta_frames_merge_without_erasing_earlier_state() {
    let mut bank = new_bank();
    let mut monitor = StatusMonitor::new();

    let snapshot = report::encode_all(&mut bank, 0).expect("snapshot encodes");
    assert_eq!(monitor.ingest(snapshot.as_bytes()), 1);
    assert!(!monitor.store().actuator(2).active);

    bank.activate(2, MsInstant(0));
    let delta = report::encode_changed(&mut bank, 500)
        .expect("delta encodes")
        .expect("a change is pending");
    assert_eq!(monitor.ingest(delta.as_bytes()), 1);

    let store = monitor.store();
    assert!(store.actuator(2).active);
    assert_eq!(store.actuator(2).mode, "EXTENDING");
    assert_eq!(store.actuator(6).timestamp, 500, "pair row rides along");
    assert_eq!(
        store.actuator(0).timestamp,
        0,
        "rows absent from the delta keep their old report"
    );
    assert_eq!(store.last_timestamp(), 500);
}

#[test]
fn frames_are_recovered_between_bursts_of_line_noise() {
    let mut bank = new_bank();
    let mut monitor = StatusMonitor::new();

    let mut wire = Vec::new();
    wire.extend_from_slice(&[0x00, 0xff, 0x7f, b'{', b'"']);
    wire.extend_from_slice(report::encode_all(&mut bank, 1).expect("encodes").as_bytes());
    wire.extend_from_slice(b"#### serial glitch ####");
    bank.force_all(true, MsInstant(0));
    wire.extend_from_slice(
        report::encode_changed(&mut bank, 2)
            .expect("encodes")
            .expect("force is a change")
            .as_bytes(),
    );

    let mut merged = 0;
    for chunk in wire.chunks(7) {
        merged += monitor.ingest(chunk);
    }
    assert_eq!(merged, 2, "both documents survive the noise");
    assert!(monitor.store().force_mode());
}

#[test]
fn reassembler_recovers_after_an_oversized_junk_burst() {
    let mut bank = new_bank();
    let mut monitor = StatusMonitor::new();

    let junk = vec![b'~'; MAX_PAYLOAD_SIZE * 2];
    assert_eq!(monitor.ingest(&junk), 0);

    let frame = report::encode_all(&mut bank, 9).expect("encodes");
    assert_eq!(monitor.ingest(frame.as_bytes()), 1);
    assert_eq!(monitor.store().last_timestamp(), 9);
}
