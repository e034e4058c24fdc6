//! Testbed settings
//!
//! Persisted as JSON next to the executable (or wherever `--settings` points).
//! Every field has a default so partial files are accepted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts;
use crate::error::{Result, SimError};

/// Testbed settings/preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Files ===
    /// Directory holding `*.json` map files (relative paths resolve against the executable)
    pub maps_dir: PathBuf,
    /// Directory per-run research logs are written to
    pub log_dir: PathBuf,
    /// Write a JSON-lines research log for every run
    pub write_run_logs: bool,

    // === Physics ===
    /// Physics step frequency
    pub hertz: f32,
    pub solver_iterations: usize,

    // === Logging cadence ===
    /// Sim-level observer notification period (ticks)
    pub sim_log_interval_ticks: u64,
    /// Per-entity observer throttle (seconds of simulation time)
    pub entity_log_interval: f64,

    // === Runs ===
    /// Seed for the simulation RNG
    pub seed: u64,
    /// Keep-out distance from the border when spawning at random
    pub spawn_margin: f32,
    /// Maximum number of runs one parameter sweep may generate
    pub max_permutations: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            maps_dir: PathBuf::from("maps"),
            log_dir: PathBuf::from("logs"),
            write_run_logs: false,

            hertz: 1.0 / consts::SIM_DT,
            solver_iterations: consts::SOLVER_ITERATIONS,

            sim_log_interval_ticks: consts::SIM_LOG_INTERVAL_TICKS,
            entity_log_interval: consts::ENTITY_LOG_INTERVAL,

            seed: 0,
            spawn_margin: consts::SPAWN_MARGIN,
            max_permutations: consts::MAX_PERMUTATIONS,
        }
    }
}

impl Settings {
    /// Fixed timestep derived from `hertz`
    pub fn dt(&self) -> f32 {
        if self.hertz > 0.0 {
            1.0 / self.hertz
        } else {
            consts::SIM_DT
        }
    }

    /// Resolve the maps directory. Relative paths are taken from the executable's directory.
    pub fn resolved_maps_dir(&self) -> PathBuf {
        resolve_from_exe(&self.maps_dir)
    }

    /// Resolve the log directory the same way as the maps directory
    pub fn resolved_log_dir(&self) -> PathBuf {
        resolve_from_exe(&self.log_dir)
    }

    /// Load settings from a JSON file.
    ///
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let settings = serde_json::from_str(&json)?;
                log::info!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Using default settings");
                Ok(Self::default())
            }
            Err(e) => Err(SimError::resource(path, e)),
        }
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| SimError::resource(path, e))?;
        log::info!("Settings saved");
        Ok(())
    }
}

fn resolve_from_exe(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(path)))
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dt_matches_sim_dt() {
        let settings = Settings::default();
        assert!((settings.dt() - consts::SIM_DT).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.sim_log_interval_ticks, consts::SIM_LOG_INTERVAL_TICKS);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "seed": 42 }"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.seed, 42);
        assert_eq!(settings.max_permutations, consts::MAX_PERMUTATIONS);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ seed: ").unwrap();
        assert!(matches!(Settings::load(&path), Err(SimError::Json(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            seed: 7,
            write_run_logs: true,
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.seed, 7);
        assert!(loaded.write_run_logs);
    }
}
