//! Snapshot files
//!
//! Each flush writes one JSON document whose file name embeds the snapshot's
//! creation time. Names sharing a timestamp get a `-N` suffix and are
//! ordered by `N`:
//!
//! ```json
//! {
//!   "version": 1,
//!   "created_at": "2026-10-14T12:00:00.000000Z",
//!   "press_counts": { "30": 2 },
//!   "held_durations_us": { "30": 150000 }
//! }
//! ```
//!
//! Unknown fields are ignored on load. Missing fields are an error.

use crate::keyboard::KeyId;
use crate::stats::{AggregateRecord, Snapshot};
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

const FILE_PREFIX: &str = "keystrokes_";
const FILE_EXTENSION: &str = "json";

/// Error type for snapshot persistence
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("could not create snapshot directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("snapshot is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("key {key} has no `{field}` entry")]
    IncompleteRecord { key: u16, field: &'static str },
    #[error("invalid timestamp `{0}`")]
    Timestamp(String),
}

/// Serialized form. Fields are optional here so that absence can be
/// reported by name instead of as a generic parse error.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    press_counts: Option<BTreeMap<KeyId, u64>>,
    #[serde(default)]
    held_durations_us: Option<BTreeMap<KeyId, u64>>,
}

impl From<&Snapshot> for SnapshotFile {
    fn from(snapshot: &Snapshot) -> Self {
        let press_counts = snapshot
            .records
            .iter()
            .map(|(k, r)| (*k, r.press_count))
            .collect();
        let held_durations_us = snapshot
            .records
            .iter()
            .map(|(k, r)| (*k, r.held_micros()))
            .collect();
        Self {
            version: Some(FORMAT_VERSION),
            created_at: Some(
                snapshot
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ),
            press_counts: Some(press_counts),
            held_durations_us: Some(held_durations_us),
        }
    }
}

impl TryFrom<SnapshotFile> for Snapshot {
    type Error = SnapshotError;

    fn try_from(file: SnapshotFile) -> Result<Self, Self::Error> {
        let created_at = file
            .created_at
            .ok_or(SnapshotError::MissingField("created_at"))?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|_| SnapshotError::Timestamp(created_at.clone()))?
            .with_timezone(&Utc);
        let press_counts = file
            .press_counts
            .ok_or(SnapshotError::MissingField("press_counts"))?;
        let mut held = file
            .held_durations_us
            .ok_or(SnapshotError::MissingField("held_durations_us"))?;

        let mut records = BTreeMap::new();
        for (key, press_count) in press_counts {
            let micros = held.remove(&key).ok_or(SnapshotError::IncompleteRecord {
                key: key.as_u16(),
                field: "held_durations_us",
            })?;
            records.insert(
                key,
                AggregateRecord::new(press_count, Duration::from_micros(micros)),
            );
        }
        if let Some(key) = held.keys().next() {
            return Err(SnapshotError::IncompleteRecord {
                key: key.as_u16(),
                field: "press_counts",
            });
        }

        Ok(Snapshot::new(created_at, records))
    }
}

/// Sortable file name for a snapshot taken at `created_at`
pub fn snapshot_file_name(created_at: DateTime<Utc>) -> String {
    format!(
        "{}{}.{}",
        FILE_PREFIX,
        created_at.format("%Y%m%d_%H%M%S_%6f"),
        FILE_EXTENSION
    )
}

fn is_snapshot_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(FILE_PREFIX));
    name_ok && path.extension().is_some_and(|e| e == FILE_EXTENSION)
}

/// Ordering key of a snapshot file: timestamp part, then collision counter
fn sort_key(path: &Path) -> (String, u32) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    match stem.rsplit_once('-') {
        Some((base, n)) => match n.parse() {
            Ok(n) => (base.to_string(), n),
            Err(_) => (stem.to_string(), 0),
        },
        None => (stem.to_string(), 0),
    }
}

/// First free path for `snapshot` inside `dir`
fn unique_path(dir: &Path, created_at: DateTime<Utc>) -> PathBuf {
    let name = snapshot_file_name(created_at);
    let mut path = dir.join(&name);
    let stem = name.trim_end_matches(&format!(".{}", FILE_EXTENSION)).to_string();
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}-{}.{}", stem, n, FILE_EXTENSION));
        n += 1;
    }
    path
}

/// Write `snapshot` as a new file in `dir` and return its path.
///
/// The directory is created if needed. The file appears atomically: the
/// document is written to a temporary sibling and renamed into place.
pub fn save(snapshot: &Snapshot, dir: &Path) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(dir).map_err(|source| SnapshotError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = unique_path(dir, snapshot.created_at);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(&SnapshotFile::from(snapshot))?;

    fs::write(&tmp, json).map_err(|source| SnapshotError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, &path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        SnapshotError::Io {
            path: path.clone(),
            source,
        }
    })?;

    info!(
        "Saved snapshot of {} key(s) to {}",
        snapshot.records.len(),
        path.display()
    );
    Ok(path)
}

/// Read a snapshot written by [`save`]
pub fn load(path: &Path) -> Result<Snapshot, SnapshotError> {
    let contents = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_json(&contents)
}

/// Parse a snapshot document
pub fn from_json(contents: &str) -> Result<Snapshot, SnapshotError> {
    let file: SnapshotFile = serde_json::from_str(contents)?;
    Snapshot::try_from(file)
}

/// Snapshot files in `dir`, oldest first. A missing directory has none.
pub fn list_snapshots(dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(SnapshotError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_snapshot_file(path))
        .collect();
    files.sort_by_cached_key(|path| sort_key(path));
    Ok(files)
}

/// Most recent snapshot file in `dir`
pub fn latest_snapshot(dir: &Path) -> Result<Option<PathBuf>, SnapshotError> {
    Ok(list_snapshots(dir)?.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::env;

    fn temp_dir(tag: &str) -> PathBuf {
        env::temp_dir().join(format!(
            "keystroke-heatmap-persist-{}-{}",
            tag,
            std::process::id()
        ))
    }

    fn sample() -> Snapshot {
        let created_at = Utc.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap();
        let mut records = BTreeMap::new();
        records.insert(KeyId::new(30), AggregateRecord::new(2, Duration::from_millis(150)));
        records.insert(KeyId::new(57), AggregateRecord::new(0, Duration::from_micros(7)));
        Snapshot::new(created_at, records)
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = temp_dir("roundtrip");
        let snapshot = sample();

        let path = save(&snapshot, &dir).expect("save");
        let loaded = load(&path).expect("load");
        assert_eq!(loaded, snapshot);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_creates_nested_directory() {
        let dir = temp_dir("nested").join("a").join("b");
        let path = save(&sample(), &dir).expect("save");
        assert!(path.starts_with(&dir));
        assert!(path.exists());

        let _ = fs::remove_dir_all(temp_dir("nested"));
    }

    #[test]
    fn repeated_saves_never_collide() {
        let dir = temp_dir("collide");
        let snapshot = sample();

        let first = save(&snapshot, &dir).expect("first");
        let second = save(&snapshot, &dir).expect("second");
        let third = save(&snapshot, &dir).expect("third");
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(
            list_snapshots(&dir).expect("list"),
            vec![first, second, third.clone()]
        );
        assert_eq!(latest_snapshot(&dir).expect("latest"), Some(third));
        assert!(!dir.join("keystrokes_20261014_093000_000000.json.tmp").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn collision_counter_sorts_numerically() {
        let dir = Path::new("snaps");
        let mut files: Vec<PathBuf> = ["_000000-10", "_000000-2", "_000000", "_000001", "_000000-1"]
            .iter()
            .map(|suffix| dir.join(format!("keystrokes_20261014_093000{}.json", suffix)))
            .collect();
        files.sort_by_cached_key(|path| sort_key(path));

        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
            .map(|s| s.trim_start_matches("keystrokes_20261014_093000"))
            .collect();
        assert_eq!(names, ["_000000", "_000000-1", "_000000-2", "_000000-10", "_000001"]);
    }

    #[test]
    fn file_name_embeds_sortable_timestamp() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            snapshot_file_name(ts),
            "keystrokes_20260102_030405_000000.json"
        );
    }

    #[test]
    fn format_uses_stable_field_names() {
        let json = serde_json::to_string(&SnapshotFile::from(&sample())).expect("json");
        assert!(json.contains("\"press_counts\":{\"30\":2,\"57\":0}"));
        assert!(json.contains("\"held_durations_us\":{\"30\":150000,\"57\":7}"));
        assert!(json.contains("\"created_at\":\"2026-10-14T09:30:00.000000Z\""));
        assert!(json.contains("\"version\":1"));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{
            "created_at": "2026-10-14T09:30:00Z",
            "press_counts": {"30": 4},
            "held_durations_us": {"30": 1000},
            "layout": "qwerty",
            "user": "someone"
        }"#;
        let snapshot = from_json(json).expect("load");
        assert_eq!(
            snapshot.get(KeyId::new(30)),
            Some(&AggregateRecord::new(4, Duration::from_millis(1)))
        );
    }

    #[test]
    fn missing_fields_fail() {
        let json = r#"{"created_at": "2026-10-14T09:30:00Z", "press_counts": {"30": 4}}"#;
        assert!(matches!(
            from_json(json),
            Err(SnapshotError::MissingField("held_durations_us"))
        ));

        let json = r#"{"press_counts": {}, "held_durations_us": {}}"#;
        assert!(matches!(
            from_json(json),
            Err(SnapshotError::MissingField("created_at"))
        ));
    }

    #[test]
    fn mismatched_keys_fail() {
        let json = r#"{
            "created_at": "2026-10-14T09:30:00Z",
            "press_counts": {"30": 4},
            "held_durations_us": {"30": 10, "31": 20}
        }"#;
        assert!(matches!(
            from_json(json),
            Err(SnapshotError::IncompleteRecord { key: 31, field: "press_counts" })
        ));
    }

    #[test]
    fn corrupt_documents_fail() {
        assert!(matches!(from_json("{not json"), Err(SnapshotError::Parse(_))));
        let negative = r#"{
            "created_at": "2026-10-14T09:30:00Z",
            "press_counts": {"30": -1},
            "held_durations_us": {"30": 10}
        }"#;
        assert!(matches!(from_json(negative), Err(SnapshotError::Parse(_))));
        let bad_time = r#"{"created_at": "yesterday", "press_counts": {}, "held_durations_us": {}}"#;
        assert!(matches!(from_json(bad_time), Err(SnapshotError::Timestamp(_))));
    }

    #[test]
    fn latest_picks_newest_name() {
        let dir = temp_dir("latest");
        let mut older = sample();
        older.created_at = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        save(&older, &dir).expect("older");
        let newer_path = save(&sample(), &dir).expect("newer");
        fs::write(dir.join("notes.txt"), "ignored").expect("write");

        assert_eq!(latest_snapshot(&dir).expect("latest"), Some(newer_path));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_lists_nothing() {
        assert!(list_snapshots(&temp_dir("absent")).expect("list").is_empty());
        assert_eq!(latest_snapshot(&temp_dir("absent")).expect("latest"), None);
    }

    #[test]
    fn create_dir_failure_is_reported() {
        let blocker = temp_dir("blocker");
        fs::write(&blocker, "file in the way").expect("write");
        let err = save(&sample(), &blocker.join("sub")).expect_err("should fail");
        assert!(matches!(err, SnapshotError::CreateDir { .. }));
        let _ = fs::remove_file(&blocker);
    }
}
