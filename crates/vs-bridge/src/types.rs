//! Type definitions for the bridge provider

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vswitch_common::{Ensure, ProviderError, ProviderResult};

/// Bridge external_ids: key -> value
pub type ExternalIds = BTreeMap<String, String>;

/// Longest usable Linux interface name (IFNAMSIZ minus the NUL)
pub const MAX_BRIDGE_NAME_LEN: usize = 15;

/// Declared desired state of one bridge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeResource {
    /// Bridge name, also the OS link name
    pub name: String,
    /// Whether the bridge must exist
    #[serde(default)]
    pub ensure: Ensure,
    /// Desired external ids; `None` leaves them unmanaged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<ExternalIds>,
    /// Desired MAC learning table limit; `None` leaves it unmanaged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_table_size: Option<u32>,
}

impl BridgeResource {
    /// Declare a bridge that must exist, with no managed properties
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Declare a bridge that must not exist
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ensure: Ensure::Absent,
            ..Default::default()
        }
    }

    /// Manage external ids, adding one entry
    pub fn with_external_id(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.external_ids
            .get_or_insert_with(ExternalIds::new)
            .insert(key.into(), value.into());
        self
    }

    /// Manage external ids, replacing the desired map
    pub fn with_external_ids<I, K, V>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.external_ids = Some(ids.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Manage the MAC table size
    pub fn with_mac_table_size(mut self, size: u32) -> Self {
        self.mac_table_size = Some(size);
        self
    }

    /// Check the declaration can be expressed on the switch
    pub fn validate(&self) -> ProviderResult<()> {
        validate_bridge_name(&self.name)?;
        if let Some(ids) = &self.external_ids {
            validate_external_ids(ids)?;
        }
        Ok(())
    }
}

/// Check a bridge name is usable as an OS link name
pub fn validate_bridge_name(name: &str) -> ProviderResult<()> {
    if name.is_empty() {
        return Err(ProviderError::invalid_config("name", "must not be empty"));
    }
    if name.len() > MAX_BRIDGE_NAME_LEN {
        return Err(ProviderError::invalid_config(
            "name",
            format!(
                "'{}' is longer than {} bytes",
                name, MAX_BRIDGE_NAME_LEN
            ),
        ));
    }
    if name.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ProviderError::invalid_config(
            "name",
            format!("'{}' contains whitespace or '/'", name),
        ));
    }
    Ok(())
}

/// Check external ids survive the `key=value` line format
pub fn validate_external_ids(ids: &ExternalIds) -> ProviderResult<()> {
    for (key, value) in ids {
        if key.is_empty() {
            return Err(ProviderError::invalid_config(
                "external_ids",
                "keys must not be empty",
            ));
        }
        if key.contains('=') || key.contains('\n') {
            return Err(ProviderError::invalid_config(
                "external_ids",
                format!("key {:?} contains '=' or a newline", key),
            ));
        }
        if value.contains('\n') {
            return Err(ProviderError::invalid_config(
                "external_ids",
                format!("value for {:?} contains a newline", key),
            ));
        }
    }
    Ok(())
}

/// Live state of one bridge, as read from the switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeState {
    /// Bridge name
    pub name: String,
    /// Whether the bridge exists
    pub exists: bool,
    /// Current external ids (empty when absent)
    pub external_ids: ExternalIds,
    /// Current MAC table limit, `None` when unset or absent
    pub mac_table_size: Option<u32>,
}

impl BridgeState {
    /// State of a bridge that does not exist
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: false,
            external_ids: ExternalIds::new(),
            mac_table_size: None,
        }
    }
}
