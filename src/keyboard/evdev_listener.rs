//! Raw evdev-based keyboard listener for Linux
//!
//! Reads scancodes straight from `/dev/input/event*`, which works without a
//! display server. Auto-repeat events are forwarded as presses and left for
//! the state tracker to suppress.

use super::{EventSource, KeyEventType, RawKeyEvent};
use evdev::{Device, EventType, Key};
use log::{debug, warn};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Instant;

/// Error type for evdev operations
#[derive(Debug, thiserror::Error)]
pub enum EvdevError {
    /// No keyboard devices found
    #[error("No keyboard devices found")]
    NoDevices,
    /// Keyboards exist but none could be opened
    #[error("Permission denied accessing {0}")]
    PermissionDenied(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

const VALUE_RELEASE: i32 = 0;
const VALUE_PRESS: i32 = 1;
const VALUE_REPEAT: i32 = 2;

fn is_keyboard(device: &Device) -> bool {
    device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::KEY_A) && keys.contains(Key::KEY_SPACE))
}

fn set_nonblocking(fd: &impl AsRawFd) -> io::Result<()> {
    let fd = fd.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Open every keyboard under `/dev/input`
fn find_keyboard_devices() -> Result<Vec<(PathBuf, Device)>, EvdevError> {
    let mut saw_denied = false;
    let mut keyboards = Vec::new();

    for entry in std::fs::read_dir("/dev/input")?.flatten() {
        let path = entry.path();
        let is_event = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("event"));
        if !is_event {
            continue;
        }
        match Device::open(&path) {
            Ok(device) if is_keyboard(&device) => keyboards.push((path, device)),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => saw_denied = true,
            Err(e) => debug!("Skipping {}: {}", path.display(), e),
        }
    }

    if keyboards.is_empty() {
        if saw_denied {
            return Err(EvdevError::PermissionDenied(
                "/dev/input (run with sudo or add user to 'input' group)".to_string(),
            ));
        }
        return Err(EvdevError::NoDevices);
    }
    Ok(keyboards)
}

/// Evdev-based keyboard listener for raw scancode detection
pub struct EvdevListener {
    devices: Vec<(PathBuf, Device)>,
    event_tx: mpsc::Sender<RawKeyEvent>,
}

impl EvdevListener {
    /// Open all accessible keyboards
    pub fn new(event_tx: mpsc::Sender<RawKeyEvent>) -> Result<Self, EvdevError> {
        let devices = find_keyboard_devices()?;
        for (path, device) in &devices {
            if let Err(e) = set_nonblocking(device) {
                warn!("Could not make {} nonblocking: {}", path.display(), e);
            }
            debug!(
                "Listening on {} ({})",
                path.display(),
                device.name().unwrap_or("unnamed")
            );
        }
        Ok(Self { devices, event_tx })
    }

    /// Get the number of connected devices
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl EventSource for EvdevListener {
    fn name(&self) -> &'static str {
        "evdev"
    }

    fn poll(&mut self) -> io::Result<usize> {
        let now = Instant::now();
        let mut event_count = 0;
        let mut lost = Vec::new();

        for (idx, (path, device)) in self.devices.iter_mut().enumerate() {
            let events = match device.fetch_events() {
                Ok(events) => events,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    warn!("Keyboard {} stopped responding: {}", path.display(), e);
                    lost.push(idx);
                    continue;
                }
            };

            for event in events.filter(|e| e.event_type() == EventType::KEY) {
                let kind = match event.value() {
                    VALUE_PRESS | VALUE_REPEAT => KeyEventType::Press,
                    VALUE_RELEASE => KeyEventType::Release,
                    _ => continue,
                };
                if self
                    .event_tx
                    .send(RawKeyEvent::new(event.code(), kind, now))
                    .is_ok()
                {
                    event_count += 1;
                }
            }
        }

        for idx in lost.into_iter().rev() {
            self.devices.remove(idx);
        }
        if self.devices.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no keyboard devices left",
            ));
        }
        Ok(event_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedFd;

    impl AsRawFd for ClosedFd {
        fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
            -1
        }
    }

    #[test]
    fn nonblocking_flag_is_set() {
        let file = std::fs::File::open("/dev/null").expect("open /dev/null");
        set_nonblocking(&file).expect("fcntl");
        let flags = OFlag::from_bits_truncate(fcntl(file.as_raw_fd(), FcntlArg::F_GETFL).expect("getfl"));
        assert!(flags.contains(OFlag::O_NONBLOCK));
    }

    #[test]
    fn nonblocking_failure_is_reported() {
        let err = set_nonblocking(&ClosedFd).expect_err("bad descriptor");
        assert_eq!(err.raw_os_error(), Some(nix::libc::EBADF));
    }

    #[test]
    fn error_messages() {
        assert_eq!(EvdevError::NoDevices.to_string(), "No keyboard devices found");
        let err = EvdevError::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(err.to_string().contains("boom"));
    }
}
