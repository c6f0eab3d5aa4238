use super::*;

fn header(object_id: u32, opcode: u16, size: u16) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[0..4].copy_from_slice(&object_id.to_ne_bytes());
    buf[4..6].copy_from_slice(&opcode.to_ne_bytes());
    buf[6..8].copy_from_slice(&size.to_ne_bytes());
    buf
}

fn message_with_u32(object_id: u32, opcode: u16, word: u32) -> Vec<u8> {
    let mut buf = header(object_id, opcode, 12).to_vec();
    buf.extend_from_slice(&word.to_ne_bytes());
    buf
}

fn bind_message(registry_id: u32, interface: &str, version: u32, new_id: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&5u32.to_ne_bytes());
    let len = interface.len() as u32 + 1;
    payload.extend_from_slice(&len.to_ne_bytes());
    payload.extend_from_slice(interface.as_bytes());
    payload.push(0);
    while payload.len() % 4 != 0 {
        payload.push(0);
    }
    payload.extend_from_slice(&version.to_ne_bytes());
    payload.extend_from_slice(&new_id.to_ne_bytes());
    let size = (8 + payload.len()) as u16;
    let mut buf = header(registry_id, 0, size).to_vec();
    buf.extend_from_slice(&payload);
    buf
}

/// Builds a tracker that has already learned registry id 2, seat id 3, pointer id 4,
/// keyboard id 5 and touch id 6, the way a real client handshake would.
fn tracker_with_devices() -> ObjectTracker {
    let mut tracker = ObjectTracker::default();
    for msg in [
        message_with_u32(1, 1, 2),
        bind_message(2, "wl_seat", 7, 3),
        message_with_u32(3, 0, 4),
        message_with_u32(3, 1, 5),
        message_with_u32(3, 2, 6),
    ] {
        for parsed in Scanner::new(&msg).unwrap() {
            tracker.observe_request(&parsed.unwrap());
        }
    }
    tracker
}

#[test]
fn passthrough_forwards_untracked_messages_identically_in_idle_mode() {
    let tracker = ObjectTracker::default();
    let batch = message_with_u32(1, 1, 2);
    let mut out = [0u8; MAX_MESSAGE_SIZE];
    let (out_len, captured) = filter_batch(&tracker, Mode::Idle, &batch, &mut out).unwrap();
    assert_eq!(&out[..out_len], &batch[..]);
    assert!(captured.is_empty());
}

#[test]
fn capture_mode_forwards_pointer_events_and_also_logs_them() {
    let tracker = tracker_with_devices();
    let motion = message_with_u32(4, 2, 100);
    let mut out = [0u8; MAX_MESSAGE_SIZE];
    let (out_len, captured) = filter_batch(&tracker, Mode::Capture, &motion, &mut out).unwrap();
    assert_eq!(&out[..out_len], &motion[..], "capture still forwards live input");
    assert_eq!(captured, vec![&motion[..]]);
}

#[test]
fn replay_mode_suppresses_pointer_events_entirely() {
    let tracker = tracker_with_devices();
    let motion = message_with_u32(4, 2, 100);
    let mut out = [0u8; MAX_MESSAGE_SIZE];
    let (out_len, captured) = filter_batch(&tracker, Mode::Replay, &motion, &mut out).unwrap();
    assert_eq!(out_len, 0);
    assert!(captured.is_empty());
}

#[test]
fn replay_mode_forwards_a_mixed_batch_with_only_the_non_target_message_surviving() {
    let tracker = tracker_with_devices();
    let motion = message_with_u32(4, 2, 100);
    let done = message_with_u32(7, 0, 1);
    let mut batch = motion.clone();
    batch.extend_from_slice(&done);

    let mut out = [0u8; MAX_MESSAGE_SIZE];
    let (out_len, captured) = filter_batch(&tracker, Mode::Replay, &batch, &mut out).unwrap();
    assert_eq!(&out[..out_len], &done[..]);
    assert!(captured.is_empty());
}

#[test]
fn suppressed_keyboard_opcodes_are_filtered_but_others_pass_through() {
    let tracker = tracker_with_devices();
    let key_event = message_with_u32(5, 2, 42); // wl_keyboard.key
    let other_event = message_with_u32(5, 0, 42); // keymap, not suppressed

    let mut out = [0u8; MAX_MESSAGE_SIZE];
    let (out_len, _) = filter_batch(&tracker, Mode::Replay, &key_event, &mut out).unwrap();
    assert_eq!(out_len, 0);

    let mut out = [0u8; MAX_MESSAGE_SIZE];
    let (out_len, _) = filter_batch(&tracker, Mode::Replay, &other_event, &mut out).unwrap();
    assert_eq!(&out[..out_len], &other_event[..]);
}

#[test]
fn malformed_batch_propagates_the_scan_error() {
    let tracker = ObjectTracker::default();
    let bad = header(1, 0, 4); // size below the header floor
    let mut out = [0u8; MAX_MESSAGE_SIZE];
    assert!(filter_batch(&tracker, Mode::Idle, &bad, &mut out).is_err());
}
