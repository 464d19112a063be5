//! Keyboard event handling and state management

mod event;
mod state;
pub mod keymap;

#[cfg(target_os = "linux")]
pub mod evdev_listener;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use event::{EventSource, KeyEventType, KeyboardListener, RawKeyEvent};
pub use state::{KeyState, KeyStateTracker, Transition};
pub use keymap::{KeyCodeResolver, KeyId, KeyInfo, KEYMAP, LAYOUT};

#[cfg(target_os = "linux")]
pub use evdev_listener::{EvdevError, EvdevListener};
