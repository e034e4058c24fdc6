//! Error types for the testbed
//!
//! Construction-time failures surface as `SimError`; per-tick problems are
//! logged and skipped by the simulation loop instead.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for testbed operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// A bounded parameter was constructed or assigned outside its range
    #[error("parameter value {value} is outside [{min}, {max}]")]
    Validation { value: f32, min: f32, max: f32 },

    /// A named behaviour, map, drone configuration, listener or target type was not registered
    #[error("unknown {kind}: {name}")]
    Lookup { kind: &'static str, name: String },

    /// `pop`/`peek` on an empty test queue
    #[error("cannot {0} from an empty test queue")]
    Underflow(&'static str),

    /// A file could not be opened, read or written
    #[error("could not access {path}: {source}")]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A parameter sweep would produce more combinations than allowed
    #[error("parameter sweep would produce {requested} runs (limit {limit})")]
    PermutationLimit { requested: usize, limit: usize },

    /// Malformed sweep definition (mismatched names and value lists, empty lists)
    #[error("invalid permutation set: {0}")]
    Permutation(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other I/O errors without a useful path
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Shorthand for a lookup failure
    pub fn lookup(kind: &'static str, name: impl Into<String>) -> Self {
        SimError::Lookup {
            kind,
            name: name.into(),
        }
    }

    /// Wrap an I/O error with the path that was being accessed
    pub fn resource(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SimError::Resource {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for testbed operations.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_error_mentions_path() {
        let err = SimError::resource(
            "/tmp/maps/missing.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert!(err.to_string().contains("/tmp/maps/missing.json"));
    }

    #[test]
    fn test_lookup_error_names_kind() {
        let err = SimError::lookup("behaviour", "Swirl");
        assert_eq!(err.to_string(), "unknown behaviour: Swirl");
    }
}
