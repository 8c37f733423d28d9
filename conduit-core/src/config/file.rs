//! Configuration file loading and saving
//!
//! Loads user configuration from `~/.config/conduit/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{BufferConfig, DriverConfig};
use crate::error::{ConduitError, Result};
use crate::params::ParamValue;
use crate::pipeline::Pipeline;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Driver settings
    #[serde(default)]
    pub driver: DriverConfig,

    /// Unit buffer settings
    #[serde(default)]
    pub buffers: BufferConfig,

    /// Parameter values keyed by node name, then parameter name
    #[serde(default)]
    pub nodes: BTreeMap<String, BTreeMap<String, ParamValue>>,
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("conduit").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("conduit")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/conduit/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConduitError::config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)?;
        config.driver.validate()?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ConduitError::config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)?;

        std::fs::write(&path, content)
            .map_err(|e| ConduitError::config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Create a default config file if it doesn't exist
    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_path();
        if path.exists() {
            return Ok(false);
        }

        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Stored parameters for nodes named `node`
    pub fn node_parameters(&self, node: &str) -> Option<&BTreeMap<String, ParamValue>> {
        self.nodes.get(node)
    }

    /// Record a parameter value for nodes named `node`
    pub fn set_node_parameter(&mut self, node: &str, name: &str, value: ParamValue) {
        self.nodes
            .entry(node.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Apply stored parameters to every node of `pipeline` by name
    ///
    /// Returns the number of values applied.
    pub fn apply_to(&self, pipeline: &mut Pipeline) -> Result<usize> {
        let mut applied = 0;
        for (id, name) in pipeline.node_names() {
            let Some(params) = self.nodes.get(&name) else {
                continue;
            };
            for (param, value) in params {
                pipeline
                    .set_parameter(id, param, value)
                    .map_err(|e| e.with_context(format!("[nodes.{}] {}", name, param)))?;
                applied += 1;
            }
        }
        debug!("Applied {} stored node parameter(s)", applied);
        Ok(applied)
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# Conduit Configuration

[driver]
# Sleep between reads that answered AGAIN, in milliseconds
poll_interval_ms = 5

# Give up after this many AGAIN answers in a row (omit to wait forever)
# max_idle_polls = 2000

[buffers]
# Bytes reserved for each new unit buffer
unit_capacity = 65536

# Parameter values applied to nodes by name
[nodes.scale]
# 0 keeps the input size
width = 0
height = 0

[nodes.clamp]
max_width = 1280
max_height = 720

[nodes.framerate]
# 0 keeps the input rate
fps = 30

[nodes.gain]
gain_db = 0.0
"#
    .to_string()
}
