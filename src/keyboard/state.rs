//! Per-key press/release state machine

use super::{KeyCodeResolver, KeyEventType, KeyId, RawKeyEvent};
use crate::stats::AggregationStore;
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State of a single key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    Idle,
    Held {
        pressed_at: Instant,
    },
}

/// What a single notification did to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Idle key went down; one press was counted
    Pressed,
    /// Press on a key that is already held (OS auto-repeat)
    Repeat,
    /// Held key went up after the given hold time
    Released(Duration),
    /// Release without a tracked press
    SpuriousRelease,
}

/// Turns raw press/release notifications into store updates.
///
/// Owned by the listener thread; the only shared piece is the store.
pub struct KeyStateTracker {
    resolver: KeyCodeResolver,
    keys: HashMap<KeyId, KeyState>,
    store: Arc<AggregationStore>,
}

impl KeyStateTracker {
    pub fn new(store: Arc<AggregationStore>) -> Self {
        Self::with_resolver(KeyCodeResolver::new(), store)
    }

    pub fn with_resolver(resolver: KeyCodeResolver, store: Arc<AggregationStore>) -> Self {
        Self {
            resolver,
            keys: HashMap::new(),
            store,
        }
    }

    /// Resolve and dispatch a raw event. Unknown codes are dropped.
    pub fn process(&mut self, event: &RawKeyEvent) -> Option<Transition> {
        let Some(key) = self.resolver.resolve(event.code) else {
            trace!("Ignoring unresolved key code {}", event.code);
            return None;
        };

        let transition = match event.kind {
            KeyEventType::Press => self.on_press(key, event.timestamp),
            KeyEventType::Release => self.on_release(key, event.timestamp),
        };
        Some(transition)
    }

    pub fn on_press(&mut self, key: KeyId, now: Instant) -> Transition {
        let state = self.keys.entry(key).or_default();
        match *state {
            KeyState::Held { .. } => Transition::Repeat,
            KeyState::Idle => {
                *state = KeyState::Held { pressed_at: now };
                self.store.record_press(key);
                Transition::Pressed
            }
        }
    }

    pub fn on_release(&mut self, key: KeyId, now: Instant) -> Transition {
        let state = self.keys.entry(key).or_default();
        match *state {
            KeyState::Held { pressed_at } => {
                let elapsed = now.saturating_duration_since(pressed_at);
                *state = KeyState::Idle;
                self.store.record_duration(key, elapsed);
                debug!("{} held for {:?}", key, elapsed);
                Transition::Released(elapsed)
            }
            KeyState::Idle => {
                debug!("Spurious release of {} without a tracked press", key);
                Transition::SpuriousRelease
            }
        }
    }

    /// Current state of `key`; unseen keys are idle
    pub fn state(&self, key: KeyId) -> KeyState {
        self.keys.get(&key).copied().unwrap_or_default()
    }

    /// Keys currently held down, in scancode order
    pub fn held_keys(&self) -> Vec<KeyId> {
        let mut held: Vec<KeyId> = self
            .keys
            .iter()
            .filter(|(_, s)| matches!(s, KeyState::Held { .. }))
            .map(|(k, _)| *k)
            .collect();
        held.sort();
        held
    }

    pub fn store(&self) -> &Arc<AggregationStore> {
        &self.store
    }
}
