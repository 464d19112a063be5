//! Recording session: listener thread, stop handshake and final flush
//!
//! The listener thread owns the input source and the [`KeyStateTracker`].
//! The rest of the application only sees the shared [`AggregationStore`]
//! and the [`RecorderHandle`] used to stop the thread and write the
//! session's single snapshot.

use crate::config::Backend;
use crate::keyboard::{EventSource, KeyStateTracker, KeyboardListener, RawKeyEvent, Transition};
use crate::persistence::{self, SnapshotError};
use crate::stats::{AggregationStore, Snapshot};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Boxed error returned by source factories
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Errors starting a recording session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not spawn listener thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("input source unavailable: {0}")]
    Source(String),
}

/// The final snapshot could not be written.
///
/// The drained snapshot is kept so the caller can retry elsewhere.
#[derive(Debug, thiserror::Error)]
#[error("failed to write final snapshot: {source}")]
pub struct FlushError {
    pub snapshot: Snapshot,
    #[source]
    pub source: SnapshotError,
}

impl FlushError {
    /// Try saving the kept snapshot again
    pub fn retry(&self, dir: &Path) -> Result<PathBuf, SnapshotError> {
        persistence::save(&self.snapshot, dir)
    }
}

/// Counters kept by the listener thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub events: u64,
    pub unresolved: u64,
    pub presses: u64,
    pub repeats: u64,
    pub releases: u64,
    pub spurious_releases: u64,
}

impl ListenerStats {
    fn record(&mut self, transition: Option<Transition>) {
        self.events += 1;
        match transition {
            None => self.unresolved += 1,
            Some(Transition::Pressed) => self.presses += 1,
            Some(Transition::Repeat) => self.repeats += 1,
            Some(Transition::Released(_)) => self.releases += 1,
            Some(Transition::SpuriousRelease) => self.spurious_releases += 1,
        }
    }
}

/// Result of a finished session
#[derive(Debug)]
pub struct SessionSummary {
    pub path: PathBuf,
    pub snapshot: Snapshot,
    pub stats: ListenerStats,
}

#[cfg(target_os = "linux")]
fn open_evdev(
    event_tx: mpsc::Sender<RawKeyEvent>,
) -> Result<Box<dyn EventSource>, crate::keyboard::EvdevError> {
    let listener = crate::keyboard::EvdevListener::new(event_tx)?;
    info!("Opened {} keyboard device(s)", listener.device_count());
    Ok(Box::new(listener))
}

/// Open the input backend selected in the config
pub fn open_backend(
    backend: Backend,
    event_tx: mpsc::Sender<RawKeyEvent>,
) -> Result<Box<dyn EventSource>, SourceError> {
    match backend {
        Backend::Poll => Ok(Box::new(KeyboardListener::new(event_tx))),
        #[cfg(target_os = "linux")]
        Backend::Evdev => Ok(open_evdev(event_tx)?),
        #[cfg(not(target_os = "linux"))]
        Backend::Evdev => Err("evdev is only available on Linux".into()),
        #[cfg(target_os = "linux")]
        Backend::Auto => match open_evdev(event_tx.clone()) {
            Ok(source) => Ok(source),
            Err(e) => {
                warn!("Evdev unavailable ({}), falling back to polling", e);
                Ok(Box::new(KeyboardListener::new(event_tx)))
            }
        },
        #[cfg(not(target_os = "linux"))]
        Backend::Auto => Ok(Box::new(KeyboardListener::new(event_tx))),
    }
}

/// Builder for the listener thread
pub struct Recorder {
    store: Arc<AggregationStore>,
    poll_interval: Duration,
}

impl Recorder {
    pub fn new(store: Arc<AggregationStore>) -> Self {
        Self {
            store,
            poll_interval: Duration::from_millis(5),
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start the listener thread.
    ///
    /// `make_source` runs on the new thread, since some backends cannot be
    /// moved across threads. This call returns once the source is open.
    pub fn spawn<F>(self, make_source: F) -> Result<RecorderHandle, SessionError>
    where
        F: FnOnce(mpsc::Sender<RawKeyEvent>) -> Result<Box<dyn EventSource>, SourceError>
            + Send
            + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<&'static str, String>>();
        let thread_stop = Arc::clone(&stop);
        let Recorder {
            store,
            poll_interval,
        } = self;
        let thread_store = Arc::clone(&store);

        let thread = thread::Builder::new()
            .name("key-listener".to_string())
            .spawn(move || {
                let (event_tx, event_rx) = mpsc::channel();
                let mut source = match make_source(event_tx) {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(source.name()));
                        source
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return ListenerStats::default();
                    }
                };
                let tracker = KeyStateTracker::new(thread_store);
                listen(source.as_mut(), &event_rx, tracker, &thread_stop, poll_interval)
            })?;

        match ready_rx.recv() {
            Ok(Ok(name)) => {
                info!("Recording key events via {}", name);
                Ok(RecorderHandle {
                    stop,
                    thread: Some(thread),
                    store,
                })
            }
            Ok(Err(msg)) => {
                let _ = thread.join();
                Err(SessionError::Source(msg))
            }
            Err(_) => {
                let _ = thread.join();
                Err(SessionError::Source(
                    "listener thread exited during startup".to_string(),
                ))
            }
        }
    }
}

fn listen(
    source: &mut dyn EventSource,
    events: &mpsc::Receiver<RawKeyEvent>,
    mut tracker: KeyStateTracker,
    stop: &AtomicBool,
    poll_interval: Duration,
) -> ListenerStats {
    let mut stats = ListenerStats::default();
    let mut failing = false;

    while !stop.load(Ordering::Acquire) {
        match source.poll() {
            Ok(_) if failing => {
                info!("Input source {} recovered", source.name());
                failing = false;
            }
            Ok(_) => {}
            Err(e) => {
                if !failing {
                    warn!("Input source {} failed: {}", source.name(), e);
                }
                failing = true;
            }
        }

        while let Ok(event) = events.try_recv() {
            stats.record(tracker.process(&event));
        }

        thread::sleep(poll_interval);
    }

    debug!("Listener stopped after {} events", stats.events);
    stats
}

/// Control side of a running recording session
pub struct RecorderHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<ListenerStats>>,
    store: Arc<AggregationStore>,
}

impl RecorderHandle {
    /// Point-in-time copy of the running totals
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the listener and wait for it to exit.
    ///
    /// Once this returns no further event reaches the tracker. Calling it
    /// again is a no-op returning empty stats.
    pub fn stop(&mut self) -> ListenerStats {
        self.stop.store(true, Ordering::Release);
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                error!("Listener thread panicked");
                ListenerStats::default()
            }
            None => ListenerStats::default(),
        }
    }

    /// Stop the listener, drain the store and write the session snapshot
    pub fn finish(mut self, dir: &Path) -> Result<SessionSummary, FlushError> {
        let stats = self.stop();
        let snapshot = self.store.drain();
        match persistence::save(&snapshot, dir) {
            Ok(path) => Ok(SessionSummary {
                path,
                snapshot,
                stats,
            }),
            Err(source) => Err(FlushError { snapshot, source }),
        }
    }
}

impl Drop for RecorderHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}
