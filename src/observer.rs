//! Research data logging
//!
//! Observers receive `LogMessage`s from the Sim and from entities. This stream
//! is separate from diagnostic logging (the `log` facade): it is the raw data
//! the external analysis pipeline consumes.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// One research log record.
///
/// `message` is itself a JSON-encoded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub time: f64,
    pub caller_type: String,
    pub id: u32,
    pub message: String,
}

impl LogMessage {
    /// Build a record, encoding the payload to a JSON string
    pub fn new(time: f64, caller_type: &str, id: u32, payload: &serde_json::Value) -> Self {
        Self {
            time,
            caller_type: caller_type.to_string(),
            id,
            message: payload.to_string(),
        }
    }

    /// Decode the inner payload
    pub fn payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.message)?)
    }
}

/// Receiver of research log records
pub trait Observer {
    fn notify(&self, message: &LogMessage);
}

/// Shared observer handle; entities and the Sim hold clones, never ownership of the sink
pub type ObserverHandle = Rc<dyn Observer>;

/// Send a record to every observer
pub fn notify_all(observers: &[ObserverHandle], message: &LogMessage) {
    for observer in observers {
        observer.notify(message);
    }
}

/// Time-based throttle: fires when more than `interval` seconds of
/// simulation time have passed since it last fired.
#[derive(Debug, Clone, Copy)]
pub struct LogThrottle {
    interval: f64,
    last: f64,
}

impl LogThrottle {
    pub fn new(interval: f64, now: f64) -> Self {
        Self {
            interval,
            last: now,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn set_interval(&mut self, interval: f64) {
        self.interval = interval;
    }

    /// Returns true (and restarts the window) if the interval has elapsed
    pub fn ready(&mut self, now: f64) -> bool {
        if now - self.last > self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// Writes one JSON object per line to a file
pub struct JsonLinesObserver {
    path: PathBuf,
    writer: RefCell<BufWriter<File>>,
}

impl JsonLinesObserver {
    /// Create (truncate) the log file, creating parent directories as needed
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| SimError::resource(dir, e))?;
            }
        }
        let file = File::create(&path).map_err(|e| SimError::resource(&path, e))?;
        log::info!("Research log: {}", path.display());
        Ok(Self {
            path,
            writer: RefCell::new(BufWriter::new(file)),
        })
    }

    /// Per-run log file name: `<timestamp>_<behaviour>.log`
    pub fn run_file_name(behaviour: &str) -> String {
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        format!("{stamp}_{behaviour}.log")
    }

    /// Create a per-run log inside `dir`. Runs started within the same
    /// second get a numeric suffix instead of overwriting each other.
    pub fn for_run(dir: &Path, behaviour: &str) -> Result<Self> {
        let name = Self::run_file_name(behaviour);
        let mut path = dir.join(&name);
        let mut n = 1;
        while path.exists() {
            let stem = name.trim_end_matches(".log");
            path = dir.join(format!("{stem}_{n}.log"));
            n += 1;
        }
        Self::create(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> Result<()> {
        self.writer
            .borrow_mut()
            .flush()
            .map_err(|e| SimError::resource(&self.path, e))
    }
}

impl Observer for JsonLinesObserver {
    fn notify(&self, message: &LogMessage) {
        let mut writer = self.writer.borrow_mut();
        let written = serde_json::to_writer(&mut *writer, message)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        if let Err(e) = written {
            log::warn!("Failed to write research log {}: {e}", self.path.display());
        }
    }
}

impl Drop for JsonLinesObserver {
    fn drop(&mut self) {
        let _ = self.writer.get_mut().flush();
    }
}

/// Collects records in memory
#[derive(Default)]
pub struct MemoryObserver {
    messages: RefCell<Vec<LogMessage>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<LogMessage> {
        self.messages.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    /// Records from one caller type
    pub fn from_caller(&self, caller_type: &str) -> Vec<LogMessage> {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.caller_type == caller_type)
            .cloned()
            .collect()
    }
}

impl Observer for MemoryObserver {
    fn notify(&self, message: &LogMessage) {
        self.messages.borrow_mut().push(message.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_throttle_fires_after_interval() {
        let mut throttle = LogThrottle::new(0.1, 0.0);
        assert!(!throttle.ready(0.05));
        assert!(!throttle.ready(0.1));
        assert!(throttle.ready(0.11));
        // Window restarts
        assert!(!throttle.ready(0.15));
        assert!(throttle.ready(0.25));
    }

    #[test]
    fn test_message_payload_round_trip() {
        let msg = LogMessage::new(1.5, "Drone", 3, &json!({"position": [1.0, 2.0]}));
        assert_eq!(msg.payload().unwrap()["position"][1], 2.0);
    }

    #[test]
    fn test_memory_observer_filters_by_caller() {
        let obs = MemoryObserver::new();
        obs.notify(&LogMessage::new(0.0, "Sim", 0, &json!({})));
        obs.notify(&LogMessage::new(0.0, "Drone", 1, &json!({})));
        assert_eq!(obs.len(), 2);
        assert_eq!(obs.from_caller("Sim").len(), 1);
    }

    #[test]
    fn test_json_lines_observer_writes_one_line_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");
        {
            let obs = JsonLinesObserver::create(&path).unwrap();
            obs.notify(&LogMessage::new(0.5, "Sim", 0, &json!({"targets_found": 2})));
            obs.notify(&LogMessage::new(1.0, "Sim", 0, &json!({"targets_found": 3})));
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: LogMessage = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.payload().unwrap()["targets_found"], 3);
    }

    #[test]
    fn test_run_file_name_shape() {
        let name = JsonLinesObserver::run_file_name("Flocking");
        assert!(name.ends_with("_Flocking.log"));
        // YYYY-MM-DD_HH-MM-SS
        assert_eq!(name.len(), "2024-01-01_00-00-00_Flocking.log".len());
    }

    #[test]
    fn test_runs_in_the_same_second_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = JsonLinesObserver::for_run(dir.path(), "Flocking").unwrap();
        let second = JsonLinesObserver::for_run(dir.path(), "Flocking").unwrap();
        assert_ne!(first.path(), second.path());
    }
}
