//! Keystroke Heatmap - per-key usage statistics
//!
//! Counts key presses and cumulative hold time from a background listener,
//! writes one snapshot per session and maps snapshots onto heatmap colors.

pub mod config;
pub mod heatmap;
pub mod keyboard;
pub mod persistence;
pub mod render;
pub mod session;
pub mod stats;

pub use config::Config;
pub use heatmap::{HeatmapMapper, Metric, Rgb};
pub use stats::{AggregateRecord, AggregationStore, Snapshot};
