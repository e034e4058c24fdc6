//! Bounded tunable parameters

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// A float constrained to a fixed `[min, max]` range.
///
/// Construction with an out-of-range value fails. Assignment outside the range
/// is rejected and reported, and the previous value is kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    value: f32,
    min: f32,
    max: f32,
}

impl Parameter {
    pub fn new(value: f32, min: f32, max: f32) -> Result<Self> {
        if !(min..=max).contains(&value) {
            return Err(SimError::Validation { value, min, max });
        }
        Ok(Self { value, min, max })
    }

    /// Infallible constructor for built-in defaults; the value is clamped into range
    pub fn clamped(value: f32, min: f32, max: f32) -> Self {
        let (min, max) = (min.min(max), max.max(min));
        Self {
            value: value.clamp(min, max),
            min,
            max,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Assign a new value; out-of-range values are logged and rejected
    pub fn set(&mut self, value: f32) -> Result<()> {
        if !self.contains(value) {
            log::warn!(
                "Assignment value {value} out of bounds [{}, {}]",
                self.min,
                self.max
            );
            return Err(SimError::Validation {
                value,
                min: self.min,
                max: self.max,
            });
        }
        self.value = value;
        Ok(())
    }
}

impl From<Parameter> for f32 {
    fn from(p: Parameter) -> f32 {
        p.value
    }
}

impl From<&Parameter> for f32 {
    fn from(p: &Parameter) -> f32 {
        p.value
    }
}

/// Named parameters of one behaviour, in stable (sorted) order
pub type ParameterSet = BTreeMap<String, Parameter>;

/// Plain name -> value view of a parameter set
pub fn parameter_values(set: &ParameterSet) -> BTreeMap<String, f32> {
    set.iter().map(|(k, p)| (k.clone(), p.value())).collect()
}
