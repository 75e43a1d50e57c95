//! Configuration types and loading

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::coordinator::CoordinatorConfig;
use crate::experiment::builtin::Countdown;
use crate::experiment::ExperimentRegistry;
use crate::mission::MissionConfig;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Coordinator settings
    pub coordinator: CoordinatorConfig,

    /// Mission loop settings
    pub mission: MissionConfig,

    /// Sample experiments registered by the simulator
    pub experiments: Vec<ExperimentDef>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            mission: MissionConfig::default(),
            experiments: vec![
                ExperimentDef {
                    code: 1,
                    name: "camera-commissioning".to_string(),
                    iterations: 5,
                    wait_for_cycle: true,
                    fail_start: false,
                    fail_at: None,
                },
                ExperimentDef {
                    code: 2,
                    name: "payload-checkout".to_string(),
                    iterations: 20,
                    wait_for_cycle: false,
                    fail_start: false,
                    fail_at: None,
                },
            ],
        }
    }
}

impl Config {
    /// Validate configuration before use
    ///
    /// Rejects duplicate experiment codes and a zero tick period.
    pub fn validate(&self) -> Result<()> {
        if self.mission.tick_ms == 0 {
            return Err(eyre::eyre!("mission.tick-ms must be greater than zero"));
        }

        let mut seen = HashSet::new();
        for def in &self.experiments {
            if !seen.insert(def.code) {
                return Err(eyre::eyre!("Duplicate experiment code {} ({})", def.code, def.name));
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .expcoord.yml
        let local_config = PathBuf::from(".expcoord.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/expcoord/expcoord.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("expcoord").join("expcoord.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Build the experiment registry from the configured samples
    pub fn build_registry(&self) -> Result<ExperimentRegistry> {
        let mut registry = ExperimentRegistry::new();
        for def in &self.experiments {
            registry
                .register(Box::new(def.build()))
                .context(format!("Failed to register experiment {}", def.name))?;
        }
        Ok(registry)
    }
}

/// Sample experiment definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentDef {
    /// Experiment code
    pub code: u8,

    /// Name used in logs and listings
    pub name: String,

    /// Iterations until `Finished`
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Wait for the next mission tick between iterations
    #[serde(rename = "wait-for-cycle", default)]
    pub wait_for_cycle: bool,

    /// Report failure from `start`
    #[serde(rename = "fail-start", default)]
    pub fail_start: bool,

    /// Report failure from this (1-based) iteration
    #[serde(rename = "fail-at", default)]
    pub fail_at: Option<u32>,
}

fn default_iterations() -> u32 {
    1
}

impl ExperimentDef {
    pub fn build(&self) -> Countdown {
        Countdown::new(self.code, self.name.clone(), self.iterations)
            .wait_for_cycle(self.wait_for_cycle)
            .fail_start(self.fail_start)
            .fail_at(self.fail_at)
    }
}
