//! Canonical key identifiers and the raw-code resolver
//!
//! Every backend reports keys as Linux evdev scancodes. A scancode only
//! becomes a [`KeyId`] when it is part of the reference layout in [`LAYOUT`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Logical key on the reference US layout, identified by its evdev scancode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(u16);

impl KeyId {
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Display name from the layout table
    pub fn name(&self) -> &'static str {
        KEYMAP.get(self).map(|info| info.name).unwrap_or("Unknown")
    }

    /// Short label used when drawing the keyboard
    pub fn label(&self) -> &'static str {
        KEYMAP.get(self).map(|info| info.label).unwrap_or("?")
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Information about a key on the reference layout
#[derive(Debug, Clone)]
pub struct KeyInfo {
    /// Evdev scancode
    pub code: u16,
    /// Display name for the key
    pub name: &'static str,
    /// Short label (for keyboard visualization)
    pub label: &'static str,
    /// Row position (0 = number row, 4 = modifiers and space)
    pub row: u8,
    /// Column position within the row
    pub col: u8,
    /// Width in units (1.0 = standard key)
    pub width: f32,
}

const fn key(code: u16, name: &'static str, label: &'static str, row: u8, col: u8, width: f32) -> KeyInfo {
    KeyInfo { code, name, label, row, col, width }
}

/// Reference layout: standard US ANSI keyboard, row-major order
pub static LAYOUT: &[KeyInfo] = &[
    // Number row
    key(41, "Grave", "`", 0, 0, 1.0),
    key(2, "1", "1", 0, 1, 1.0),
    key(3, "2", "2", 0, 2, 1.0),
    key(4, "3", "3", 0, 3, 1.0),
    key(5, "4", "4", 0, 4, 1.0),
    key(6, "5", "5", 0, 5, 1.0),
    key(7, "6", "6", 0, 6, 1.0),
    key(8, "7", "7", 0, 7, 1.0),
    key(9, "8", "8", 0, 8, 1.0),
    key(10, "9", "9", 0, 9, 1.0),
    key(11, "0", "0", 0, 10, 1.0),
    key(12, "Minus", "-", 0, 11, 1.0),
    key(13, "Equals", "=", 0, 12, 1.0),
    key(14, "Backspace", "Bksp", 0, 13, 2.0),
    // Top letter row
    key(15, "Tab", "Tab", 1, 0, 1.5),
    key(16, "Q", "Q", 1, 1, 1.0),
    key(17, "W", "W", 1, 2, 1.0),
    key(18, "E", "E", 1, 3, 1.0),
    key(19, "R", "R", 1, 4, 1.0),
    key(20, "T", "T", 1, 5, 1.0),
    key(21, "Y", "Y", 1, 6, 1.0),
    key(22, "U", "U", 1, 7, 1.0),
    key(23, "I", "I", 1, 8, 1.0),
    key(24, "O", "O", 1, 9, 1.0),
    key(25, "P", "P", 1, 10, 1.0),
    key(26, "LeftBracket", "[", 1, 11, 1.0),
    key(27, "RightBracket", "]", 1, 12, 1.0),
    key(43, "Backslash", "\\", 1, 13, 1.5),
    // Home row
    key(58, "CapsLock", "Caps", 2, 0, 1.75),
    key(30, "A", "A", 2, 1, 1.0),
    key(31, "S", "S", 2, 2, 1.0),
    key(32, "D", "D", 2, 3, 1.0),
    key(33, "F", "F", 2, 4, 1.0),
    key(34, "G", "G", 2, 5, 1.0),
    key(35, "H", "H", 2, 6, 1.0),
    key(36, "J", "J", 2, 7, 1.0),
    key(37, "K", "K", 2, 8, 1.0),
    key(38, "L", "L", 2, 9, 1.0),
    key(39, "Semicolon", ";", 2, 10, 1.0),
    key(40, "Apostrophe", "'", 2, 11, 1.0),
    key(28, "Enter", "Enter", 2, 12, 2.25),
    // Bottom letter row
    key(42, "LeftShift", "Shift", 3, 0, 2.25),
    key(44, "Z", "Z", 3, 1, 1.0),
    key(45, "X", "X", 3, 2, 1.0),
    key(46, "C", "C", 3, 3, 1.0),
    key(47, "V", "V", 3, 4, 1.0),
    key(48, "B", "B", 3, 5, 1.0),
    key(49, "N", "N", 3, 6, 1.0),
    key(50, "M", "M", 3, 7, 1.0),
    key(51, "Comma", ",", 3, 8, 1.0),
    key(52, "Period", ".", 3, 9, 1.0),
    key(53, "Slash", "/", 3, 10, 1.0),
    key(54, "RightShift", "Shift", 3, 11, 2.75),
    // Modifiers and space
    key(29, "LeftCtrl", "Ctrl", 4, 0, 1.25),
    key(125, "LeftMeta", "Win", 4, 1, 1.25),
    key(56, "LeftAlt", "Alt", 4, 2, 1.25),
    key(57, "Space", "Space", 4, 3, 6.25),
    key(100, "RightAlt", "Alt", 4, 4, 1.25),
    key(126, "RightMeta", "Win", 4, 5, 1.25),
    key(97, "RightCtrl", "Ctrl", 4, 6, 1.25),
];

/// Layout table indexed by key
pub static KEYMAP: LazyLock<HashMap<KeyId, KeyInfo>> = LazyLock::new(|| {
    LAYOUT
        .iter()
        .map(|info| (KeyId(info.code), info.clone()))
        .collect()
});

/// Maps raw scancodes to canonical key ids.
///
/// The table is built once when the resolver is created and never changes,
/// so lookups are pure.
#[derive(Debug, Clone)]
pub struct KeyCodeResolver {
    table: HashMap<u16, KeyId>,
}

impl KeyCodeResolver {
    pub fn new() -> Self {
        Self::from_layout(LAYOUT)
    }

    /// Build a resolver that only knows the keys of `layout`
    pub fn from_layout(layout: &[KeyInfo]) -> Self {
        Self {
            table: layout.iter().map(|info| (info.code, KeyId(info.code))).collect(),
        }
    }

    /// Resolve a raw scancode. Codes outside the layout yield `None`.
    pub fn resolve(&self, raw: u16) -> Option<KeyId> {
        self.table.get(&raw).copied()
    }

    /// All keys this resolver can produce, in scancode order
    pub fn keys(&self) -> Vec<KeyId> {
        let mut keys: Vec<KeyId> = self.table.values().copied().collect();
        keys.sort();
        keys
    }
}

impl Default for KeyCodeResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a device_query keycode into its evdev scancode
pub fn scancode_for(keycode: device_query::Keycode) -> Option<u16> {
    use device_query::Keycode as DK;
    let code = match keycode {
        DK::Escape => 1,
        DK::Key1 => 2,
        DK::Key2 => 3,
        DK::Key3 => 4,
        DK::Key4 => 5,
        DK::Key5 => 6,
        DK::Key6 => 7,
        DK::Key7 => 8,
        DK::Key8 => 9,
        DK::Key9 => 10,
        DK::Key0 => 11,
        DK::Minus => 12,
        DK::Equal => 13,
        DK::Backspace => 14,
        DK::Tab => 15,
        DK::Q => 16,
        DK::W => 17,
        DK::E => 18,
        DK::R => 19,
        DK::T => 20,
        DK::Y => 21,
        DK::U => 22,
        DK::I => 23,
        DK::O => 24,
        DK::P => 25,
        DK::LeftBracket => 26,
        DK::RightBracket => 27,
        DK::Enter => 28,
        DK::LControl => 29,
        DK::A => 30,
        DK::S => 31,
        DK::D => 32,
        DK::F => 33,
        DK::G => 34,
        DK::H => 35,
        DK::J => 36,
        DK::K => 37,
        DK::L => 38,
        DK::Semicolon => 39,
        DK::Apostrophe => 40,
        DK::Grave => 41,
        DK::LShift => 42,
        DK::BackSlash => 43,
        DK::Z => 44,
        DK::X => 45,
        DK::C => 46,
        DK::V => 47,
        DK::B => 48,
        DK::N => 49,
        DK::M => 50,
        DK::Comma => 51,
        DK::Dot => 52,
        DK::Slash => 53,
        DK::RShift => 54,
        DK::LAlt => 56,
        DK::Space => 57,
        DK::CapsLock => 58,
        DK::RControl => 97,
        DK::RAlt => 100,
        DK::LMeta => 125,
        DK::RMeta => 126,
        _ => return None,
    };
    Some(code)
}
