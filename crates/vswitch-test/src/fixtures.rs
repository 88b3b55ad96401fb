//! Test fixtures for common bridge states
//!
//! Provides reusable starting points for provider tests

use std::collections::BTreeMap;

use crate::fake_switch::FakeBridge;

/// Pre-existing bridge to load into a [`FakeSwitch`](crate::FakeSwitch)
#[derive(Debug, Clone)]
pub struct SeedBridge {
    name: String,
    bridge: FakeBridge,
}

impl SeedBridge {
    /// Bare bridge with no external ids, no other_config, link down
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bridge: FakeBridge::default(),
        }
    }

    /// Add an external id
    pub fn with_external_id(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.bridge.external_ids.insert(key.into(), value.into());
        self
    }

    /// Add multiple external ids
    pub fn with_external_ids<I, K, V>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in ids {
            self.bridge.external_ids.insert(k.into(), v.into());
        }
        self
    }

    /// Add an other_config entry
    pub fn with_other_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.bridge.other_config.insert(key.into(), value.into());
        self
    }

    /// Mark the OS link administratively up
    pub fn link_up(mut self) -> Self {
        self.bridge.link_up = true;
        self
    }

    pub(crate) fn into_parts(self) -> (String, FakeBridge) {
        (self.name, self.bridge)
    }
}

/// Build a string map from literal pairs
pub fn string_map<I, K, V>(pairs: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Common bridge fixtures
pub mod bridge_fixtures {
    use super::*;

    /// Bridge owned by another team with a leftover tag
    pub fn stale_tagged_bridge(name: &str) -> SeedBridge {
        SeedBridge::new(name)
            .with_external_ids([("owner", "infra"), ("stale", "x")])
            .link_up()
    }

    /// Bridge with a MAC table limit already configured
    pub fn sized_bridge(name: &str, mac_table_size: u32) -> SeedBridge {
        SeedBridge::new(name)
            .with_other_config("mac-table-size", mac_table_size.to_string())
            .with_other_config("mac-aging-time", "300")
            .link_up()
    }

    /// Bridge as left behind by a typical OpenStack deployment
    pub fn neutron_external_bridge(name: &str) -> SeedBridge {
        SeedBridge::new(name)
            .with_external_id("bridge-id", name)
            .with_other_config("disable-in-band", "true")
            .link_up()
    }
}

/// Raw `ovs-vsctl get Bridge <br> other-config` outputs
pub mod other_config_fixtures {
    /// Quoted keys and values, no spaces
    pub const QUOTED_WITH_SIZE: &str = r#"{"mac-table-size"="2048","other-field"="x"}"#;

    /// Quoted keys and values, no table size
    pub const QUOTED_WITHOUT_SIZE: &str = r#"{"other-field"="x"}"#;

    /// Typical `ovs-vsctl` rendering
    pub const VSCTL_STYLE: &str = r#"{mac-aging-time="300", mac-table-size="50000"}"#;

    /// Empty column
    pub const EMPTY: &str = "{}";

    /// Table size that is not a number
    pub const NON_NUMERIC_SIZE: &str = r#"{mac-table-size="lots"}"#;

    /// Escaped quote closing a neighbouring value
    pub const ESCAPED_QUOTE: &str = r#"{note="x\"", mac-table-size="8"}"#;

    /// Escaped quote followed by a comma inside the same value
    pub const ESCAPED_QUOTE_AND_COMMA: &str = r#"{note="a\"b,c", mac-table-size="8"}"#;
}
