use {super::*, crate::wire::Scanner};

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
    payload.extend_from_slice(&5u32.to_ne_bytes()); // name
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

fn observe(tracker: &mut ObjectTracker, bytes: &[u8]) {
    for msg in Scanner::new(bytes).unwrap() {
        tracker.observe_request(&msg.unwrap());
    }
}

#[test]
fn learns_registry_then_seat_then_devices() {
    let mut tracker = ObjectTracker::default();
    observe(&mut tracker, &message_with_u32(1, 1, 2));
    assert!(!tracker.is_policy_target(&RawMessage { bytes: &header(2, 0, 8) }));

    observe(&mut tracker, &bind_message(2, "wl_seat", 7, 3));
    observe(&mut tracker, &message_with_u32(3, 0, 4));
    observe(&mut tracker, &message_with_u32(3, 1, 5));
    observe(&mut tracker, &message_with_u32(3, 2, 6));

    assert!(tracker.is_policy_target(&RawMessage { bytes: &header(4, 99, 8) }));
    assert!(tracker.is_policy_target(&RawMessage { bytes: &header(6, 0, 8) }));
    assert!(tracker.is_policy_target(&RawMessage {
        bytes: &header(5, 1, 8)
    }));
    assert!(!tracker.is_policy_target(&RawMessage {
        bytes: &header(5, 0, 8)
    }));
}

#[test]
fn ignores_bind_for_other_interfaces() {
    let mut tracker = ObjectTracker::default();
    observe(&mut tracker, &message_with_u32(1, 1, 2));
    observe(&mut tracker, &bind_message(2, "wl_output", 4, 9));
    observe(&mut tracker, &message_with_u32(9, 0, 4));
    assert!(!tracker.is_policy_target(&RawMessage { bytes: &header(4, 0, 8) }));
}

#[test]
fn rebind_overwrites_previous_seat() {
    let mut tracker = ObjectTracker::default();
    observe(&mut tracker, &message_with_u32(1, 1, 2));
    observe(&mut tracker, &bind_message(2, "wl_seat", 7, 3));
    observe(&mut tracker, &message_with_u32(3, 0, 10));
    assert!(tracker.is_policy_target(&RawMessage { bytes: &header(10, 0, 8) }));

    observe(&mut tracker, &bind_message(2, "wl_seat", 7, 30));
    observe(&mut tracker, &message_with_u32(30, 0, 20));
    assert!(tracker.is_policy_target(&RawMessage { bytes: &header(20, 0, 8) }));
}
