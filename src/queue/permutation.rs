//! Parameter sweeps
//!
//! A sweep names the parameters to vary and gives one list of candidate
//! values per parameter. Expansion is the Cartesian product of those lists,
//! generated by an odometer over per-list indices (last list turns fastest).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Sweep definition as stored on disk
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PermutationSet {
    /// One list of values per entry in `parameter_names`
    pub permutations: Vec<Vec<f32>>,
    pub parameter_names: Vec<String>,
}

impl PermutationSet {
    pub fn new(parameter_names: Vec<String>, permutations: Vec<Vec<f32>>) -> Self {
        Self {
            permutations,
            parameter_names,
        }
    }

    /// Names and lists must pair up and no list may be empty
    pub fn validate(&self) -> Result<()> {
        if self.permutations.len() != self.parameter_names.len() {
            return Err(SimError::Permutation(format!(
                "{} value lists for {} parameter names",
                self.permutations.len(),
                self.parameter_names.len()
            )));
        }
        if let Some(i) = self.permutations.iter().position(Vec::is_empty) {
            return Err(SimError::Permutation(format!(
                "no values given for '{}'",
                self.parameter_names[i]
            )));
        }
        Ok(())
    }

    /// Number of combinations, `None` on overflow
    pub fn combination_count(&self) -> Option<usize> {
        self.permutations
            .iter()
            .try_fold(1usize, |acc, list| acc.checked_mul(list.len()))
    }

    pub fn expand(&self, limit: usize) -> Result<Vec<Vec<f32>>> {
        self.validate()?;
        generate_permutations(&self.permutations, limit)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| SimError::resource(path, e))?;
        let set: Self = serde_json::from_str(&json)?;
        set.validate()?;
        Ok(set)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| SimError::resource(path, e))
    }
}

/// Cartesian product of `lists`, failing if it would exceed `limit` entries
pub fn generate_permutations(lists: &[Vec<f32>], limit: usize) -> Result<Vec<Vec<f32>>> {
    let requested = lists
        .iter()
        .try_fold(1usize, |acc, list| acc.checked_mul(list.len()))
        .unwrap_or(usize::MAX);
    if requested > limit {
        return Err(SimError::PermutationLimit { requested, limit });
    }
    if requested == 0 {
        return Ok(Vec::new());
    }

    let mut results = Vec::with_capacity(requested);
    let mut indices = vec![0usize; lists.len()];
    loop {
        results.push(indices.iter().zip(lists).map(|(&i, list)| list[i]).collect());

        // Advance the odometer from the rightmost wheel
        let mut wheel = lists.len();
        loop {
            if wheel == 0 {
                return Ok(results);
            }
            wheel -= 1;
            indices[wheel] += 1;
            if indices[wheel] < lists[wheel].len() {
                break;
            }
            indices[wheel] = 0;
        }
    }
}

/// Values from `min` to `max` (inclusive within half a step) in `step`
/// increments, each rounded to six decimals
pub fn generate_range(min: f32, max: f32, step: f32) -> Vec<f32> {
    if step <= 0.0 || !step.is_finite() || max < min {
        log::warn!("Empty range for min {min}, max {max}, step {step}");
        return Vec::new();
    }
    let min = f64::from(min);
    let max = f64::from(max);
    let step = f64::from(step);
    let mut values = Vec::new();
    let mut k = 0u32;
    loop {
        let raw = min + step * f64::from(k);
        if raw > max + step / 2.0 {
            break;
        }
        let value = (raw * 1e6).round() / 1e6;
        if value <= max {
            values.push(value as f32);
        }
        k += 1;
    }
    values
}

/// Parse whitespace-separated floats. Invalid tokens are reported and skipped.
pub fn parse_list(text: &str) -> Vec<f32> {
    text.split_whitespace()
        .filter_map(|token| match token.parse::<f32>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Invalid float: {token}");
                None
            }
        })
        .collect()
}
