//! Batch run results
//!
//! One [`RunSummary`] per queued test, collected into a [`BatchReport`] that
//! is saved as JSON for the analysis pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Outcome of a single queued run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Position in the batch (0-based)
    pub index: usize,
    pub behaviour: String,
    pub map: String,
    pub drone_config: String,
    pub num_drones: usize,
    pub num_targets: usize,
    pub targets_found: usize,
    /// Simulated seconds
    pub sim_time: f64,
    pub ticks: u64,
    /// Wall-clock duration
    pub wall_ms: f64,
    /// Real-time factor (simulated seconds per wall second)
    pub rtf: f64,
    /// Research log written for this run, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Set when the run could not be built or completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// All runs of one batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Local start time, `%Y-%m-%d %H:%M:%S`
    pub started: String,
    pub runs: Vec<RunSummary>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            started: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            runs: Vec::new(),
        }
    }

    pub fn push(&mut self, run: RunSummary) {
        self.runs.push(run);
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn succeeded(&self) -> usize {
        self.runs.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunSummary> {
        self.runs.iter().filter(|r| !r.succeeded())
    }

    /// Total wall time of all runs (ms)
    pub fn total_wall_ms(&self) -> f64 {
        self.runs.iter().map(|r| r.wall_ms).sum()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| SimError::resource(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| SimError::resource(path, e))?;
        log::info!("Report saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(index: usize, error: Option<&str>) -> RunSummary {
        RunSummary {
            index,
            behaviour: "Flocking".to_string(),
            map: "open".to_string(),
            drone_config: "Small".to_string(),
            num_drones: 4,
            num_targets: 2,
            targets_found: 1,
            sim_time: 1.0,
            ticks: 60,
            wall_ms: 12.5,
            rtf: 80.0,
            log_file: None,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_counts() {
        let mut report = BatchReport::new();
        assert!(report.is_empty());
        report.push(run(0, None));
        report.push(run(1, Some("unknown map: maze")));
        report.push(run(2, None));
        assert_eq!(report.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failures().map(|r| r.index).collect::<Vec<_>>(), vec![1]);
        assert_eq!(report.total_wall_ms(), 37.5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut report = BatchReport::new();
        report.push(run(0, None));
        report.push(run(1, Some("boom")));
        report.save(&path).unwrap();
        assert_eq!(BatchReport::load(&path).unwrap(), report);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.matches("\"error\"").count(), 1);
    }
}
