//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! [controller]
//! execution_speed_ms = 500
//! stop_on_error = false
//!
//! [simulation]
//! http_success_rate = 0.9
//! messaging_success_rate = 0.95
//! max_delay_ms = 5000
//! seed = 42
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nodes::SimulationConfig;

use crate::EngineError;

/// Tuning knobs for the run controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Pause between steps, for visual pacing.  Seeds the sink's speed.
    pub execution_speed_ms: u64,
    /// Halt the run with status `error` on the first failed node.
    pub stop_on_error: bool,
}

impl ControllerConfig {
    pub fn execution_speed(&self) -> Duration {
        Duration::from_millis(self.execution_speed_ms)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            execution_speed_ms: 1_000,
            stop_on_error: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub controller: ControllerConfig,
    pub simulation: SimulationConfig,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.controller.execution_speed(), Duration::from_secs(1));
        assert_eq!(config.simulation.max_delay_ms, 5_000);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [controller]
            execution_speed_ms = 0

            [simulation]
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.controller.execution_speed_ms, 0);
        assert!(!config.controller.stop_on_error);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.simulation.http_success_rate, 0.9);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            EngineConfig::from_toml_str("[controller\nexecution_speed_ms = 1"),
            Err(EngineError::ConfigParse(_))
        ));
    }
}
