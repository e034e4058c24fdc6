//! FIFO of queued runs

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::config::{TestConfig, TestParameters};
use super::permutation::PermutationSet;
use crate::behaviour::BehaviourRegistry;
use crate::error::{Result, SimError};

/// Ordered list of runs; strict FIFO
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestQueue {
    tests: VecDeque<TestConfig>,
}

impl TestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, test: TestConfig) {
        self.tests.push_back(test);
    }

    pub fn pop(&mut self) -> Result<TestConfig> {
        self.tests.pop_front().ok_or(SimError::Underflow("pop"))
    }

    pub fn peek(&self) -> Result<&TestConfig> {
        self.tests.front().ok_or(SimError::Underflow("peek"))
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestConfig> {
        self.tests.iter()
    }

    pub fn get(&self, index: usize) -> Option<&TestConfig> {
        self.tests.get(index)
    }

    pub fn clear(&mut self) {
        self.tests.clear();
    }

    /// Enqueue one copy of `base` per combination of the sweep's value lists.
    ///
    /// Each copy starts from the behaviour's current parameter values, then
    /// `base`'s own overrides, then the varied parameters. Nothing is
    /// enqueued if the sweep is malformed or larger than `limit`.
    pub fn add_permuted_tests(
        &mut self,
        base: &TestConfig,
        sweep: &PermutationSet,
        behaviours: &BehaviourRegistry,
        limit: usize,
    ) -> Result<usize> {
        let combinations = sweep.expand(limit)?;
        let behaviour = behaviours.require(&base.behaviour_name)?;
        let mut parameters = TestParameters::from_set(behaviour.borrow().parameters());
        for (name, value) in base.parameters.values() {
            parameters.set(name, *value);
        }
        for name in &sweep.parameter_names {
            if parameters.get(name).is_none() {
                log::warn!("'{}' has no parameter '{name}'; it will be ignored", base.behaviour_name);
            }
        }

        let added = combinations.len();
        for combination in combinations {
            let mut config = base.clone();
            config.parameters = parameters.clone();
            for (name, value) in sweep.parameter_names.iter().zip(combination) {
                config.parameters.set(name, value);
            }
            self.push(config);
        }
        log::info!("Queued {added} permuted runs of {}", base.behaviour_name);
        Ok(added)
    }

    /// Write the queue as a JSON array
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = with_json_extension(path);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| SimError::resource(&path, e))?;
        log::info!("Saved {} queued runs to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a queue written by [`save`](Self::save). `.json` is appended when
    /// the path has no extension.
    pub fn load(path: &Path) -> Result<Self> {
        let path = with_json_extension(path);
        let json = std::fs::read_to_string(&path).map_err(|e| SimError::resource(&path, e))?;
        let queue: Self = serde_json::from_str(&json)?;
        log::info!("Loaded {} queued runs from {}", queue.len(), path.display());
        Ok(queue)
    }
}

impl Extend<TestConfig> for TestQueue {
    fn extend<I: IntoIterator<Item = TestConfig>>(&mut self, iter: I) {
        self.tests.extend(iter);
    }
}

fn with_json_extension(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "json") {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".json");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(num_drones: usize) -> TestConfig {
        TestConfig::new("Flocking", "Small", "open", num_drones, 60.0)
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TestQueue::new();
        queue.push(config(100));
        queue.push(config(50));
        assert_eq!(queue.peek().unwrap().num_drones, 100);
        assert_eq!(queue.pop().unwrap().num_drones, 100);
        assert_eq!(queue.pop().unwrap().num_drones, 50);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_empty_queue_underflows() {
        let mut queue = TestQueue::new();
        assert!(matches!(queue.pop(), Err(SimError::Underflow("pop"))));
        assert!(matches!(queue.peek(), Err(SimError::Underflow("peek"))));
    }

    #[test]
    fn test_save_and_load_append_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = TestQueue::new();
        let mut first = config(7);
        first.num_targets = 3;
        first.time_limit = 12.5;
        first.behaviour_name = "Pheromone Avoidance".to_string();
        queue.push(first.clone());
        queue.push(config(9));

        queue.save(&dir.path().join("batch")).unwrap();
        assert!(dir.path().join("batch.json").exists());
        let mut loaded = TestQueue::load(&dir.path().join("batch")).unwrap();
        let back = loaded.pop().unwrap();
        assert_eq!(back.num_drones, 7);
        assert_eq!(back.num_targets, 3);
        assert_eq!(back.time_limit, 12.5);
        assert_eq!(back.behaviour_name, "Pheromone Avoidance");
        assert_eq!(loaded.pop().unwrap(), config(9));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        match TestQueue::load(&dir.path().join("absent")) {
            Err(SimError::Resource { path, .. }) => assert_eq!(path, dir.path().join("absent.json")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_permuted_tests_override_only_varied_parameters() {
        let registry = BehaviourRegistry::with_defaults();
        let mut base = config(10);
        base.parameters.set("Separation Distance", 50.0);
        let sweep = PermutationSet::new(
            vec!["Alignment Weight".into(), "Cohesion Weight".into()],
            vec![vec![0.5, 1.0, 1.5], vec![0.1, 0.2, 0.3]],
        );

        let mut queue = TestQueue::new();
        assert_eq!(queue.add_permuted_tests(&base, &sweep, &registry, 100).unwrap(), 9);
        assert_eq!(queue.len(), 9);

        let flocking = registry.require("Flocking").unwrap();
        let separation_weight = flocking.borrow().parameter("Separation Weight");
        for run in queue.iter() {
            assert_eq!(run.num_drones, 10);
            assert_eq!(run.parameters.get("Separation Distance"), Some(50.0));
            assert_eq!(run.parameters.get("Separation Weight"), Some(separation_weight));
        }
        let first = queue.peek().unwrap();
        assert_eq!(first.parameters.get("Alignment Weight"), Some(0.5));
        assert_eq!(first.parameters.get("Cohesion Weight"), Some(0.1));
        let last = queue.get(8).unwrap();
        assert_eq!(last.parameters.get("Alignment Weight"), Some(1.5));
        assert_eq!(last.parameters.get("Cohesion Weight"), Some(0.3));
    }

    #[test]
    fn test_oversized_sweep_enqueues_nothing() {
        let registry = BehaviourRegistry::with_defaults();
        let sweep = PermutationSet::new(vec!["Alignment Weight".into()], vec![vec![0.0; 20]]);
        let mut queue = TestQueue::new();
        assert!(matches!(
            queue.add_permuted_tests(&config(1), &sweep, &registry, 10),
            Err(SimError::PermutationLimit { requested: 20, limit: 10 })
        ));
        assert!(queue.is_empty());
    }
}
