//! Command builders for bridge operations

use std::fmt;

use vswitch_common::shell::{IP_CMD, VSCTL_CMD};
use vswitch_common::CommandLine;

/// OVSDB table holding bridges
pub const BRIDGE_TABLE: &str = "Bridge";

/// Bridge column holding free-form configuration
pub const OTHER_CONFIG_COLUMN: &str = "other-config";

/// other-config key limiting the MAC learning table
pub const MAC_TABLE_SIZE_KEY: &str = "mac-table-size";

/// Administrative state of an OS network link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Link up
    Up,
    /// Link down
    Down,
}

impl LinkState {
    /// Convert to `ip link set` argument
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Up => "up",
            LinkState::Down => "down",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds every command the bridge provider issues
///
/// Holds the binaries to invoke so deployments can point at non-default
/// `ovs-vsctl` or `ip` locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet {
    vsctl: String,
    ip: String,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::new(VSCTL_CMD, IP_CMD)
    }
}

impl CommandSet {
    /// Create a command set for the given binaries
    pub fn new(vsctl: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            vsctl: vsctl.into(),
            ip: ip.into(),
        }
    }

    /// `ovs-vsctl` binary in use
    pub fn vsctl(&self) -> &str {
        &self.vsctl
    }

    /// `ip` binary in use
    pub fn ip(&self) -> &str {
        &self.ip
    }

    fn vsctl_cmd(&self) -> CommandLine {
        CommandLine::new(self.vsctl.as_str())
    }

    /// Build bridge existence check command
    pub fn br_exists(&self, bridge: &str) -> CommandLine {
        self.vsctl_cmd().args(["br-exists", bridge])
    }

    /// Build bridge creation command
    pub fn add_br(&self, bridge: &str) -> CommandLine {
        self.vsctl_cmd().args(["add-br", bridge])
    }

    /// Build bridge deletion command
    pub fn del_br(&self, bridge: &str) -> CommandLine {
        self.vsctl_cmd().args(["del-br", bridge])
    }

    /// Build link admin state command
    pub fn link_set(&self, link: &str, state: LinkState) -> CommandLine {
        CommandLine::new(self.ip.as_str()).args(["link", "set", "dev", link, state.as_str()])
    }

    /// Build command listing all external ids as `key=value` lines
    pub fn br_get_external_ids(&self, bridge: &str) -> CommandLine {
        self.vsctl_cmd().args(["br-get-external-id", bridge])
    }

    /// Build command setting one external id
    pub fn br_set_external_id(&self, bridge: &str, key: &str, value: &str) -> CommandLine {
        self.vsctl_cmd()
            .args(["br-set-external-id", bridge, key, value])
    }

    /// Build command removing one external id
    ///
    /// `br-set-external-id` without a value deletes the key.
    pub fn br_remove_external_id(&self, bridge: &str, key: &str) -> CommandLine {
        self.vsctl_cmd().args(["br-set-external-id", bridge, key])
    }

    /// Build command reading the whole other-config column
    pub fn get_other_config(&self, bridge: &str) -> CommandLine {
        self.vsctl_cmd()
            .args(["get", BRIDGE_TABLE, bridge, OTHER_CONFIG_COLUMN])
    }

    /// Build command setting a single other-config key
    pub fn set_other_config(&self, bridge: &str, key: &str, value: &str) -> CommandLine {
        let assignment = format!("{}:{}={}", OTHER_CONFIG_COLUMN, key, value);
        self.vsctl_cmd()
            .args(["set", BRIDGE_TABLE, bridge, assignment.as_str()])
    }
}
