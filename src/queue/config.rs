//! One queued experiment

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::behaviour::{Behaviour, ParameterSet, parameter_values};
use crate::sim::{ContactListenerRegistry, NO_TARGETS};

/// Parameter overrides for a run, by parameter name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestParameters(BTreeMap<String, f32>);

impl TestParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current values of a live parameter set
    pub fn from_set(set: &ParameterSet) -> Self {
        Self(parameter_values(set))
    }

    pub fn values(&self) -> &BTreeMap<String, f32> {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.0.get(name).copied()
    }

    pub fn set(&mut self, name: &str, value: f32) {
        self.0.insert(name.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Push every override into a behaviour's live parameters
    pub fn apply_to(&self, behaviour: &mut dyn Behaviour) {
        behaviour.set_parameters(&self.0);
    }
}

impl From<BTreeMap<String, f32>> for TestParameters {
    fn from(values: BTreeMap<String, f32>) -> Self {
        Self(values)
    }
}

fn default_target_type() -> String {
    NO_TARGETS.to_string()
}

fn default_listener() -> String {
    ContactListenerRegistry::DEFAULT.to_string()
}

fn default_keep() -> bool {
    true
}

/// Declarative description of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    pub behaviour_name: String,
    #[serde(default)]
    pub parameters: TestParameters,
    pub drone_config_name: String,
    pub map_name: String,
    pub num_drones: usize,
    #[serde(default)]
    pub num_targets: usize,
    /// Seconds of simulation time
    pub time_limit: f32,
    #[serde(default = "default_target_type")]
    pub target_type: String,
    #[serde(default = "default_listener")]
    pub contact_listener_name: String,
    /// Interactive front-ends keep the finished run on screen
    #[serde(default = "default_keep")]
    pub keep: bool,
}

impl TestConfig {
    /// A run with no targets, no overrides and the default contact listener
    pub fn new(behaviour: &str, drone_config: &str, map: &str, num_drones: usize, time_limit: f32) -> Self {
        Self {
            behaviour_name: behaviour.to_string(),
            parameters: TestParameters::new(),
            drone_config_name: drone_config.to_string(),
            map_name: map.to_string(),
            num_drones,
            num_targets: 0,
            time_limit,
            target_type: default_target_type(),
            contact_listener_name: default_listener(),
            keep: default_keep(),
        }
    }
}
