//! Raw keyboard events and the polling listener

use super::keymap::scancode_for;
use device_query::{DeviceQuery, DeviceState, Keycode};
use std::io;
use std::sync::mpsc;
use std::time::Instant;

/// Type of keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    /// Key was pressed down (or auto-repeated)
    Press,
    /// Key was released
    Release,
}

/// An unresolved key event as delivered by an input backend
#[derive(Debug, Clone)]
pub struct RawKeyEvent {
    /// Platform scancode, not yet resolved against the layout
    pub code: u16,
    /// Type of event (press/release)
    pub kind: KeyEventType,
    /// When the event was observed
    pub timestamp: Instant,
}

impl RawKeyEvent {
    pub fn new(code: u16, kind: KeyEventType, timestamp: Instant) -> Self {
        Self {
            code,
            kind,
            timestamp,
        }
    }

    pub fn press(code: u16, timestamp: Instant) -> Self {
        Self::new(code, KeyEventType::Press, timestamp)
    }

    pub fn release(code: u16, timestamp: Instant) -> Self {
        Self::new(code, KeyEventType::Release, timestamp)
    }
}

/// Something that can be polled for raw key events.
///
/// Implementations push events into the channel they were built with and
/// return how many they sent.
pub trait EventSource {
    /// Short backend name for logging
    fn name(&self) -> &'static str;

    /// Poll the device once
    fn poll(&mut self) -> io::Result<usize>;
}

/// Keyboard listener that polls device_query for key state changes
pub struct KeyboardListener {
    device_state: DeviceState,
    last_keys: Vec<Keycode>,
    event_tx: mpsc::Sender<RawKeyEvent>,
}

impl KeyboardListener {
    /// Create a new keyboard listener
    pub fn new(event_tx: mpsc::Sender<RawKeyEvent>) -> Self {
        Self {
            device_state: DeviceState::new(),
            last_keys: Vec::new(),
            event_tx,
        }
    }

    fn emit(&self, key: Keycode, kind: KeyEventType, now: Instant) -> bool {
        // Keys without a scancode have no chance of resolving, skip them here
        match scancode_for(key) {
            Some(code) => self.event_tx.send(RawKeyEvent::new(code, kind, now)).is_ok(),
            None => false,
        }
    }
}

impl EventSource for KeyboardListener {
    fn name(&self) -> &'static str {
        "device_query"
    }

    /// Diff the current key set against the previous poll
    fn poll(&mut self) -> io::Result<usize> {
        let now = Instant::now();
        let current_keys = self.device_state.get_keys();
        let mut event_count = 0;

        for key in current_keys.iter().filter(|k| !self.last_keys.contains(k)) {
            if self.emit(*key, KeyEventType::Press, now) {
                event_count += 1;
            }
        }

        for key in self.last_keys.iter().filter(|k| !current_keys.contains(k)) {
            if self.emit(*key, KeyEventType::Release, now) {
                event_count += 1;
            }
        }

        self.last_keys = current_keys;
        Ok(event_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        let now = Instant::now();
        let press = RawKeyEvent::press(30, now);
        let release = RawKeyEvent::release(30, now);
        assert_eq!(press.kind, KeyEventType::Press);
        assert_eq!(release.kind, KeyEventType::Release);
        assert_eq!(press.code, 30);
        assert_eq!(release.timestamp, now);
    }
}
