//! Engine configuration
//!
//! Read once at bootstrap and owned by the [`Registry`](crate::Registry).
//! Configuration is plain JSON:
//!
//! ```json
//! { "mode": "normal", "index_batches": true, "backfill_max": 10, "seed": 7 }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::observability::{log_event_with_fields, Event};

/// Execution mode for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Queries hit the bound store
    #[default]
    Normal,
    /// Queries generate fixtures instead of reading the store
    Simulation,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Simulation => "simulation",
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Query execution mode
    pub mode: Mode,
    /// Whether batches built by the engine carry field indexes
    pub index_batches: bool,
    /// Upper bound on generated resources when no limit is given
    pub backfill_max: u32,
    /// RNG seed for deterministic fixture generation
    pub seed: Option<u64>,
    /// Limit applied to queries that do not set one
    pub default_limit: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            index_batches: true,
            backfill_max: 10,
            seed: None,
            default_limit: None,
        }
    }
}

impl Config {
    /// Config for simulation mode
    pub fn simulation() -> Self {
        Self {
            mode: Mode::Simulation,
            ..Self::default()
        }
    }

    /// Set the fixture RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse and validate a JSON config document
    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let config = Self::from_json_str(&source)?;
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", path.display().to_string().as_str()), ("mode", config.mode.as_str())],
        );
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.backfill_max == 0 {
            return Err(Error::Config("backfill_max must be at least 1".into()));
        }
        if self.default_limit == Some(0) {
            return Err(Error::Config("default_limit must be at least 1".into()));
        }
        Ok(())
    }

    /// Returns true in simulation mode
    pub fn is_simulation(&self) -> bool {
        self.mode == Mode::Simulation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Normal);
        assert!(config.index_batches);
        assert_eq!(config.backfill_max, 10);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json_str(r#"{"mode": "simulation"}"#).unwrap();
        assert!(config.is_simulation());
        assert!(config.index_batches);
    }

    #[test]
    fn test_zero_backfill_rejected() {
        let err = Config::from_json_str(r#"{"backfill_max": 0}"#).unwrap_err();
        assert_eq!(err.code(), "BINDERY_CONFIG");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"seed": 42, "index_batches": false}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.seed, Some(42));
        assert!(!config.index_batches);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/bindery.json").unwrap_err();
        assert_eq!(err.code(), "BINDERY_IO");
    }
}
