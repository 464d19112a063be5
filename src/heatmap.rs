//! Heatmap color mapping
//!
//! Values are rescaled linearly into `[0, 1]` and then interpolated from blue
//! (least used) to red (most used). Keys with no record at all get a fixed
//! gray so "no data" never looks like "least used".

use crate::keyboard::KeyId;
use crate::stats::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 24-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(*self))
    }
}

/// Gradient start
pub const COLD: Rgb = Rgb(0, 0, 255);
/// Gradient end
pub const HOT: Rgb = Rgb(255, 0, 0);
/// Color for keys absent from the mapping
pub const NO_DATA_GRAY: Rgb = Rgb(107, 107, 107);

/// Rescale values to `[0, 1]`.
///
/// When every value is equal (including a single entry or all zeros) the
/// result is `0.0` for every key.
pub fn normalize(values: &BTreeMap<KeyId, f64>) -> BTreeMap<KeyId, f64> {
    let mut iter = values.values().copied();
    let Some(first) = iter.next() else {
        return BTreeMap::new();
    };
    let (min, max) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let range = max - min;

    values
        .iter()
        .map(|(key, v)| {
            let n = if range > 0.0 { (v - min) / range } else { 0.0 };
            (*key, n)
        })
        .collect()
}

/// Blue-to-red gradient color for a normalized value
pub fn color_for(normalized: f64) -> Rgb {
    let v = if normalized.is_nan() {
        0.0
    } else {
        normalized.clamp(0.0, 1.0)
    };
    let red = (255.0 * v) as u8;
    let blue = (255.0 * (1.0 - v)) as u8;
    Rgb(red, 0, blue)
}

/// `#rrggbb` encoding
pub fn to_hex(rgb: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb.0, rgb.1, rgb.2)
}

/// Which statistic drives the heatmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Metric {
    /// Number of presses
    #[default]
    Presses,
    /// Cumulative time held down
    HeldTime,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Presses => "presses",
            Metric::HeldTime => "held time",
        }
    }
}

/// Receives one color per key; implemented by whatever draws the keyboard.
pub trait KeyRenderer {
    fn update_key(&mut self, key: KeyId, color: Rgb);
}

/// Turns snapshots into per-key colors
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatmapMapper {
    metric: Metric,
}

impl HeatmapMapper {
    pub fn new(metric: Metric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Raw metric value per recorded key (held time in microseconds)
    pub fn values(&self, snapshot: &Snapshot) -> BTreeMap<KeyId, f64> {
        snapshot
            .records
            .iter()
            .map(|(key, record)| {
                let value = match self.metric {
                    Metric::Presses => record.press_count as f64,
                    Metric::HeldTime => record.held_micros() as f64,
                };
                (*key, value)
            })
            .collect()
    }

    pub fn normalized(&self, snapshot: &Snapshot) -> BTreeMap<KeyId, f64> {
        normalize(&self.values(snapshot))
    }

    /// Gradient colors for every recorded key
    pub fn colors(&self, snapshot: &Snapshot) -> BTreeMap<KeyId, Rgb> {
        self.normalized(snapshot)
            .into_iter()
            .map(|(key, v)| (key, color_for(v)))
            .collect()
    }

    /// Push a color for each of `keys` to the renderer
    pub fn apply<R: KeyRenderer>(
        &self,
        snapshot: &Snapshot,
        keys: impl IntoIterator<Item = KeyId>,
        renderer: &mut R,
    ) {
        let colors = self.colors(snapshot);
        for key in keys {
            renderer.update_key(key, color_of(key, &colors));
        }
    }
}

/// Color for `key`, or the gray sentinel when it has no data
pub fn color_of(key: KeyId, colors: &BTreeMap<KeyId, Rgb>) -> Rgb {
    colors.get(&key).copied().unwrap_or(NO_DATA_GRAY)
}
