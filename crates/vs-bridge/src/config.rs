//! Configuration and manifest files for vs-bridge
//!
//! Two TOML files are read:
//!
//! - the provider configuration (default `/etc/vs-bridge/config.toml`), which
//!   names the `ovs-vsctl` and `ip` binaries and may be absent;
//! - a manifest of `[[bridge]]` declarations passed to `vs-bridge apply`.
//!
//! ```toml
//! [[bridge]]
//! name = "br-ex"
//! mac_table_size = 50000
//!
//! [bridge.external_ids]
//! bridge-id = "br-ex"
//!
//! [[bridge]]
//! name = "br-old"
//! ensure = "absent"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use vswitch_common::shell::{IP_CMD, VSCTL_CMD};
use vswitch_common::{ProviderError, ProviderResult};

use crate::commands::CommandSet;
use crate::types::BridgeResource;

/// Default provider configuration location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/vs-bridge/config.toml";

/// External binaries the provider runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// `ovs-vsctl` binary
    #[serde(default = "default_vsctl")]
    pub vsctl: String,

    /// `ip` binary
    #[serde(default = "default_ip")]
    pub ip: String,
}

/// Complete provider configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Binaries to run
    #[serde(default)]
    pub commands: CommandsConfig,
}

fn default_vsctl() -> String {
    VSCTL_CMD.to_string()
}

fn default_ip() -> String {
    IP_CMD.to_string()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            vsctl: default_vsctl(),
            ip: default_ip(),
        }
    }
}

fn read_file(path: &Path) -> ProviderResult<String> {
    fs::read_to_string(path).map_err(|e| ProviderError::config_file(path, e.to_string()))
}

impl ProviderConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(ProviderError::config_file(path, e.to_string())),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> ProviderResult<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Parse configuration text; `path` is only used in errors
    pub fn parse(content: &str, path: impl AsRef<Path>) -> ProviderResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ProviderError::config_file(path.as_ref(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> ProviderResult<()> {
        if self.commands.vsctl.trim().is_empty() {
            return Err(ProviderError::invalid_config(
                "commands.vsctl",
                "must not be empty",
            ));
        }
        if self.commands.ip.trim().is_empty() {
            return Err(ProviderError::invalid_config(
                "commands.ip",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// Command builders for the configured binaries
    pub fn command_set(&self) -> CommandSet {
        CommandSet::new(self.commands.vsctl.as_str(), self.commands.ip.as_str())
    }
}

/// Declared bridges to converge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Bridge declarations, applied in file order
    #[serde(default, rename = "bridge")]
    pub bridges: Vec<BridgeResource>,
}

impl Manifest {
    /// Load and validate a manifest; the file must exist
    pub fn load(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        Self::parse(&read_file(path)?, path)
    }

    /// Parse manifest text; `path` is only used in errors
    pub fn parse(content: &str, path: impl AsRef<Path>) -> ProviderResult<Self> {
        let manifest: Self = toml::from_str(content)
            .map_err(|e| ProviderError::config_file(path.as_ref(), e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Every declaration valid, no name declared twice
    pub fn validate(&self) -> ProviderResult<()> {
        let mut seen = HashSet::new();
        for bridge in &self.bridges {
            bridge.validate()?;
            if !seen.insert(bridge.name.as_str()) {
                return Err(ProviderError::invalid_config(
                    "bridge",
                    format!("'{}' is declared more than once", bridge.name),
                ));
            }
        }
        Ok(())
    }
}
