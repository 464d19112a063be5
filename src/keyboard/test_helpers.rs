//! Shared test utilities for keyboard modules
//!
//! Provides common helper functions for creating test events and fixtures.

use crate::keyboard::{KeyId, RawKeyEvent};
use std::time::{Duration, Instant};

/// Key 'A' (scancode 30)
pub const A: KeyId = KeyId::new(30);

/// Key 'S' (scancode 31)
pub const S: KeyId = KeyId::new(31);

/// Shorthand for a millisecond duration
pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Creates a key press event with a specific timestamp.
pub fn press_at(key: KeyId, timestamp: Instant) -> RawKeyEvent {
    RawKeyEvent::press(key.as_u16(), timestamp)
}

/// Creates a key release event with a specific timestamp.
pub fn release_at(key: KeyId, timestamp: Instant) -> RawKeyEvent {
    RawKeyEvent::release(key.as_u16(), timestamp)
}

/// Press at `start`, release `hold` later.
pub fn tap_at(key: KeyId, start: Instant, hold: Duration) -> [RawKeyEvent; 2] {
    [press_at(key, start), release_at(key, start + hold)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyEventType;

    #[test]
    fn tap_at_orders_press_then_release() {
        let t0 = Instant::now();
        let [down, up] = tap_at(A, t0, ms(40));
        assert_eq!(down.kind, KeyEventType::Press);
        assert_eq!(up.kind, KeyEventType::Release);
        assert_eq!(up.timestamp - down.timestamp, ms(40));
        assert_eq!(down.code, 30);
    }
}
