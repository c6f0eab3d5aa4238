//! Learns the live object ids of `wl_registry`, `wl_seat`, `wl_pointer`, `wl_keyboard`
//! and `wl_touch` by observing client-to-compositor requests.

use crate::wire::{RawMessage, WL_DISPLAY_ID, decode_bind, read_u32};

const OP_GET_REGISTRY: u16 = 1;
const OP_BIND: u16 = 0;
const OP_GET_POINTER: u16 = 0;
const OP_GET_KEYBOARD: u16 = 1;
const OP_GET_TOUCH: u16 = 2;

/// Keyboard opcodes whose events carry input state and are subject to replay
/// suppression: `enter`, `leave`, `key`, `modifiers`.
const SUPPRESSED_KEYBOARD_OPCODES: [u16; 4] = [1, 2, 3, 4];

#[derive(Default)]
pub(crate) struct ObjectTracker {
    registry: Option<u32>,
    seat: Option<u32>,
    pointer: Option<u32>,
    keyboard: Option<u32>,
    touch: Option<u32>,
}

impl ObjectTracker {
    /// Updates tracked ids from a single client-to-compositor request. Never fails:
    /// a request the tracker cannot parse simply teaches it nothing.
    pub(crate) fn observe_request(&mut self, msg: &RawMessage<'_>) {
        let id = msg.object_id();
        let opcode = msg.opcode();
        let payload = msg.payload();
        if id == WL_DISPLAY_ID && opcode == OP_GET_REGISTRY {
            if let Some(new_id) = read_u32(payload, 0) {
                self.registry = Some(new_id);
            }
            return;
        }
        if Some(id) == self.registry && opcode == OP_BIND {
            if let Some(bind) = decode_bind(payload)
                && bind.interface == "wl_seat"
            {
                self.seat = Some(bind.new_id);
            }
            return;
        }
        if Some(id) == self.seat {
            let new_id = read_u32(payload, 0);
            match (opcode, new_id) {
                (OP_GET_POINTER, Some(new_id)) => self.pointer = Some(new_id),
                (OP_GET_KEYBOARD, Some(new_id)) => self.keyboard = Some(new_id),
                (OP_GET_TOUCH, Some(new_id)) => self.touch = Some(new_id),
                _ => {}
            }
        }
    }

    /// Whether a compositor-to-client message is subject to capture/replay policy
    /// (pointer or touch events of any opcode, or the four state-carrying keyboard
    /// events).
    pub(crate) fn is_policy_target(&self, msg: &RawMessage<'_>) -> bool {
        let id = msg.object_id();
        if Some(id) == self.pointer || Some(id) == self.touch {
            return true;
        }
        if Some(id) == self.keyboard {
            return SUPPRESSED_KEYBOARD_OPCODES.contains(&msg.opcode());
        }
        false
    }
}

#[cfg(test)]
mod tests;
