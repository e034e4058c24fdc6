//! Headless batch execution
//!
//! Runs queued tests one after another. A run that cannot be built (unknown
//! name, bad map) or whose log cannot be opened is recorded as failed and the
//! batch moves on.

use std::rc::Rc;
use std::time::Instant;

use super::config::TestConfig;
use super::test_queue::TestQueue;
use crate::error::Result;
use crate::observer::{JsonLinesObserver, ObserverHandle};
use crate::results::{BatchReport, RunSummary};
use crate::sim::{Sim, SimContext};

pub struct BatchRunner {
    ctx: SimContext,
    dt: f32,
    observers: Vec<ObserverHandle>,
}

impl BatchRunner {
    /// Uses the context's settings for the timestep
    pub fn new(ctx: SimContext) -> Self {
        let dt = ctx.settings.dt();
        Self {
            ctx,
            dt,
            observers: Vec::new(),
        }
    }

    /// Attach an observer to every run (in addition to per-run log files)
    pub fn add_observer(&mut self, observer: ObserverHandle) {
        self.observers.push(observer);
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Pop and run every queued test. The queue is empty afterwards.
    pub fn run_queue(&self, queue: &mut TestQueue) -> BatchReport {
        let total = queue.len();
        let mut report = BatchReport::new();
        let mut index = 0;
        while let Ok(config) = queue.pop() {
            log::info!(
                "[{}/{total}] {} on '{}': {} drones, {} targets, {}s",
                index + 1,
                config.behaviour_name,
                config.map_name,
                config.num_drones,
                config.num_targets,
                config.time_limit
            );
            let summary = self.run_one(index, &config);
            match &summary.error {
                None => log::info!(
                    "[{}/{total}] done: {} targets found, {:.0} ms, RTF {:.1}",
                    index + 1,
                    summary.targets_found,
                    summary.wall_ms,
                    summary.rtf
                ),
                Some(e) => log::error!("[{}/{total}] failed: {e}", index + 1),
            }
            report.push(summary);
            index += 1;
        }
        report
    }

    /// Run a single test to its time limit
    pub fn run_one(&self, index: usize, config: &TestConfig) -> RunSummary {
        let start = Instant::now();
        let mut summary = RunSummary {
            index,
            behaviour: config.behaviour_name.clone(),
            map: config.map_name.clone(),
            drone_config: config.drone_config_name.clone(),
            num_drones: config.num_drones,
            num_targets: config.num_targets,
            targets_found: 0,
            sim_time: 0.0,
            ticks: 0,
            wall_ms: 0.0,
            rtf: 0.0,
            log_file: None,
            error: None,
        };

        if let Err(e) = self.simulate(config, &mut summary) {
            summary.error = Some(e.to_string());
        }

        let wall = start.elapsed().as_secs_f64();
        summary.wall_ms = wall * 1000.0;
        summary.rtf = if wall > 0.0 {
            summary.sim_time / wall
        } else {
            0.0
        };
        summary
    }

    /// The Sim is built before the log file is opened so a run that fails
    /// validation leaves nothing on disk
    fn simulate(&self, config: &TestConfig, summary: &mut RunSummary) -> Result<()> {
        let mut sim = Sim::from_config(&self.ctx, config)?;
        let mut observers = self.observers.clone();
        let mut log_file: Option<Rc<JsonLinesObserver>> = None;
        if self.ctx.settings.write_run_logs {
            let dir = self.ctx.settings.resolved_log_dir();
            let observer = Rc::new(JsonLinesObserver::for_run(&dir, &config.behaviour_name)?);
            summary.log_file = Some(observer.path().to_path_buf());
            observers.push(observer.clone());
            log_file = Some(observer);
        }
        sim.attach_run_observers(&observers);

        summary.ticks = sim.run(self.dt);
        summary.sim_time = sim.current_time();
        summary.targets_found = sim.targets_found();
        drop(sim);

        if let Some(observer) = log_file {
            observer.flush()?;
        }
        Ok(())
    }
}
