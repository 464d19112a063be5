//! Terminal rendering of a heatmap

use crate::heatmap::{to_hex, KeyRenderer, Rgb};
use crate::keyboard::{KeyId, LAYOUT};
use crate::stats::Snapshot;
use crossterm::style::{style, Color, Stylize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

/// Characters per layout unit
const UNIT_WIDTH: f32 = 5.0;

/// Collects key colors and prints them as a keyboard
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    colors: BTreeMap<KeyId, Rgb>,
}

impl KeyRenderer for TerminalRenderer {
    fn update_key(&mut self, key: KeyId, color: Rgb) {
        self.colors.insert(key, color);
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb {
        r: rgb.0,
        g: rgb.1,
        b: rgb.2,
    }
}

/// Readable label color on top of `bg`
fn text_color(bg: Rgb) -> Color {
    let luma = 0.299 * bg.0 as f32 + 0.587 * bg.1 as f32 + 0.114 * bg.2 as f32;
    if luma > 140.0 {
        Color::Black
    } else {
        Color::White
    }
}

fn format_held(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 60.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.2}s", secs)
    }
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(&self, key: KeyId) -> Option<Rgb> {
        self.colors.get(&key).copied()
    }

    /// Colored keyboard, one text line per layout row
    pub fn render_keyboard(&self) -> String {
        let mut out = String::new();
        let rows = LAYOUT.iter().map(|k| k.row).max().unwrap_or(0);

        for row in 0..=rows {
            let mut keys: Vec<_> = LAYOUT.iter().filter(|k| k.row == row).collect();
            keys.sort_by_key(|k| k.col);
            for info in keys {
                let key = KeyId::new(info.code);
                let width = (info.width * UNIT_WIDTH).round() as usize - 1;
                let cell = format!("{:^width$}", info.label, width = width);
                match self.color(key) {
                    Some(bg) => {
                        let _ = write!(out, "{} ", style(cell).with(text_color(bg)).on(to_color(bg)));
                    }
                    None => {
                        let _ = write!(out, "{} ", cell);
                    }
                }
            }
            out.push('\n');
        }
        out
    }

    /// Plain `name  #rrggbb  presses  held` lines for every rendered key
    pub fn render_table(&self, snapshot: &Snapshot) -> String {
        let mut out = String::new();
        for (key, color) in &self.colors {
            let (presses, held) = snapshot
                .get(*key)
                .map(|r| (r.press_count.to_string(), format_held(r.total_held)))
                .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
            let _ = writeln!(
                out,
                "{:<14} {}  {:>8}  {:>8}",
                key.name(),
                to_hex(*color),
                presses,
                held
            );
        }
        out
    }
}
