//! Driver configuration.

use anyhow::{Context, Result};
use digevo_core::SimulationConfig;
use digevo_exec::ReplicatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the `digevo` binary needs to start a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub simulation: SimulationConfig,
    pub replicator: ReplicatorConfig,
    /// Genome injected at startup
    pub ancestor: String,
    /// Cell for the ancestor; the world center when unset
    pub inject_cell: Option<usize>,
    /// Serve the control API
    pub api_enabled: bool,
    pub bind_address: String,
    pub port: u16,
    /// Log as JSON lines instead of text
    pub log_json: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            replicator: ReplicatorConfig::default(),
            ancestor: "abcdefghijklmnopqrstuvwx".to_string(),
            inject_cell: None,
            api_enabled: true,
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            log_json: false,
        }
    }
}

impl DriverConfig {
    /// Load from a JSON file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: DriverConfig =
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        config.simulation.validate()?;
        Ok(config)
    }

    pub fn inject_cell(&self) -> usize {
        self.inject_cell.unwrap_or_else(|| {
            let world = &self.simulation.world;
            (world.height / 2 * world.width + world.width / 2).max(0) as usize
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: DriverConfig = serde_json::from_str(
            r#"{ "simulation": { "world": { "width": 10, "height": 10 } }, "port": 9000 }"#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.simulation.world.width, 10);
        assert_eq!(config.inject_cell(), 55);
        assert!(config.api_enabled);
    }

    #[test]
    fn test_defaults_without_path() {
        let config = DriverConfig::load(None).unwrap();
        assert_eq!(config.inject_cell(), 30 * 60 + 30);
    }
}
