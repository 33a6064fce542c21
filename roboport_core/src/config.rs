//! Deployment configuration
//!
//! Describes what a daemon hosts: manager settings, where to find component
//! modules, execution contexts, instances and the connections between them.
//!
//! # Example deployment.yaml
//!
//! ```yaml
//! manager:
//!   host_name: rover
//!
//! modules:
//!   search_paths:
//!     - ~/.roboport/modules
//!   preload:
//!     - range-sensors
//!
//! contexts:
//!   - name: fast
//!     rate_hz: 50
//!   - name: manual      # no rate: triggered
//!
//! instances:
//!   - type: RangeSensor
//!     name: scanner
//!     context: fast
//!     activate: true
//!     properties:
//!       frame: laser
//!   - type: Navigator
//!     name: nav
//!     context: fast
//!     activate: true
//!
//! connections:
//!   - from: scanner.range
//!     to: nav.scan
//!     policy:
//!       buffer_capacity: 4
//!       overflow: drop_oldest
//! ```

use crate::communication::ConnectionPolicy;
use crate::core::ComponentConfig;
use crate::error::{RoboportError, RoboportResult};
use crate::manager::ManagerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A complete daemon deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub manager: ManagerConfig,
    pub modules: ModulesConfig,
    pub contexts: Vec<ContextConfig>,
    pub instances: Vec<InstanceConfig>,
    pub connections: Vec<ConnectionConfig>,
}

/// Where component modules come from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Extra directories scanned for module libraries (`~/` expands)
    pub search_paths: Vec<PathBuf>,
    /// Also scan `~/.roboport/modules` and the system module directories
    pub default_paths: bool,
    /// Module ids loaded before any instance is created
    pub preload: Vec<String>,
}

/// One execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub name: String,
    /// Tick rate; a context without one is triggered
    #[serde(default)]
    pub rate_hz: Option<f64>,
}

/// One instance to create and bring up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub properties: ComponentConfig,
    /// Execution context to attach to
    #[serde(default)]
    pub context: Option<String>,
    /// Activate once every connection is made
    #[serde(default)]
    pub activate: bool,
}

/// One connection between qualified port names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub policy: ConnectionPolicy,
}

impl DeploymentConfig {
    pub fn from_yaml(content: &str) -> RoboportResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml(content: &str) -> RoboportResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a deployment file; the format follows the extension
    /// (`.yaml`/`.yml`, `.toml` or `.json`)
    pub fn load(path: impl AsRef<Path>) -> RoboportResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&content),
            Some("toml") => Self::from_toml(&content),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| RoboportError::config(format!("{}: {}", path.display(), e))),
            _ => Err(RoboportError::config(format!(
                "{}: unsupported deployment format (expected .yaml, .yml, .toml or .json)",
                path.display()
            ))),
        }?;

        config.validate()?;
        Ok(config)
    }

    /// Check internal references before anything is deployed
    pub fn validate(&self) -> RoboportResult<()> {
        let mut contexts = HashSet::new();
        for context in &self.contexts {
            if !contexts.insert(context.name.as_str()) {
                return Err(RoboportError::config(format!(
                    "execution context '{}' is declared twice",
                    context.name
                )));
            }
            if let Some(hz) = context.rate_hz {
                if !hz.is_finite() || hz <= 0.0 {
                    return Err(RoboportError::config(format!(
                        "execution context '{}' has rate {} Hz",
                        context.name, hz
                    )));
                }
            }
        }

        let mut instances = HashSet::new();
        for instance in &self.instances {
            if !instances.insert(instance.name.as_str()) {
                return Err(RoboportError::config(format!(
                    "instance '{}' is declared twice",
                    instance.name
                )));
            }
            if let Some(context) = &instance.context {
                if !contexts.contains(context.as_str()) {
                    return Err(RoboportError::config(format!(
                        "instance '{}' names unknown execution context '{}'",
                        instance.name, context
                    )));
                }
            }
        }

        for connection in &self.connections {
            for end in [&connection.from, &connection.to] {
                let owner = end.split_once('.').map(|(owner, _)| owner);
                if !owner.is_some_and(|o| instances.contains(o)) {
                    return Err(RoboportError::config(format!(
                        "connection {} -> {}: '{}' is not a port of a declared instance",
                        connection.from, connection.to, end
                    )));
                }
            }
        }
        Ok(())
    }
}
