//! Bridge existence and lifecycle for the ovs provider

use std::sync::Arc;

use tracing::{debug, info, instrument};
use vswitch_common::{CommandLine, CommandRunner, ProviderResult, ResourceProvider};

use crate::commands::{CommandSet, LinkState};
use crate::types::{BridgeResource, BridgeState, ExternalIds};

/// Resource type served by this provider
pub const RESOURCE_TYPE: &str = "vs_bridge";

/// Provider name
pub const PROVIDER_NAME: &str = "ovs";

/// Open vSwitch bridge provider
///
/// Stateless: every getter re-queries the switch through the injected
/// [`CommandRunner`]. Property getters and setters are defined alongside
/// their parsers in `external_ids` and `other_config`.
#[derive(Clone)]
pub struct OvsBridge {
    runner: Arc<dyn CommandRunner>,
    commands: CommandSet,
}

impl OvsBridge {
    /// Create a provider using the default `ovs-vsctl` and `ip` binaries
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_commands(runner, CommandSet::default())
    }

    /// Create a provider using specific binaries
    pub fn with_commands(runner: Arc<dyn CommandRunner>, commands: CommandSet) -> Self {
        Self { runner, commands }
    }

    /// Command builders in use
    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    /// Run a command, failing on non-zero exit
    pub(crate) fn run(&self, cmd: &CommandLine) -> ProviderResult<String> {
        self.runner.exec_or_throw(cmd)
    }

    /// Check if a bridge exists
    ///
    /// A non-zero exit from `br-exists` means the bridge is absent. A failure
    /// to run `ovs-vsctl` at all is returned as an error.
    pub fn bridge_exists(&self, name: &str) -> ProviderResult<bool> {
        let result = self.runner.exec(&self.commands.br_exists(name))?;
        if result.success() {
            debug!(bridge = name, "Bridge exists");
            Ok(true)
        } else {
            debug!(
                bridge = name,
                exit_code = result.exit_code,
                "Bridge does not exist"
            );
            Ok(false)
        }
    }

    /// Create a bridge, bring its link up, then apply declared properties
    ///
    /// Any failing step aborts; nothing already done is rolled back.
    #[instrument(skip(self, external_ids))]
    pub fn create_bridge(
        &self,
        name: &str,
        external_ids: Option<&ExternalIds>,
        mac_table_size: Option<u32>,
    ) -> ProviderResult<()> {
        self.run(&self.commands.add_br(name))?;
        info!("Created bridge {}", name);

        // The link only appears once the bridge exists.
        self.run(&self.commands.link_set(name, LinkState::Up))?;
        info!("Brought link {} up", name);

        if let Some(desired) = external_ids {
            // A fresh bridge has no external ids; skip the read.
            self.apply_external_ids(name, &ExternalIds::new(), desired)?;
        }

        if let Some(size) = mac_table_size {
            self.set_mac_table_size(name, size)?;
        }

        Ok(())
    }

    /// Bring the link down, then delete the bridge
    #[instrument(skip(self))]
    pub fn destroy_bridge(&self, name: &str) -> ProviderResult<()> {
        self.run(&self.commands.link_set(name, LinkState::Down))?;
        info!("Brought link {} down", name);

        self.run(&self.commands.del_br(name))?;
        info!("Deleted bridge {}", name);

        Ok(())
    }

    /// Read everything the provider manages about a bridge
    pub fn state(&self, name: &str) -> ProviderResult<BridgeState> {
        if !self.bridge_exists(name)? {
            return Ok(BridgeState::absent(name));
        }
        Ok(BridgeState {
            name: name.to_string(),
            exists: true,
            external_ids: self.external_ids(name)?,
            mac_table_size: self.mac_table_size(name)?,
        })
    }
}

impl std::fmt::Debug for OvsBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OvsBridge")
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

impl ResourceProvider for OvsBridge {
    type Resource = BridgeResource;

    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn exists(&self, resource: &BridgeResource) -> ProviderResult<bool> {
        self.bridge_exists(&resource.name)
    }

    fn create(&self, resource: &BridgeResource) -> ProviderResult<()> {
        self.create_bridge(
            &resource.name,
            resource.external_ids.as_ref(),
            resource.mac_table_size,
        )
    }

    fn destroy(&self, resource: &BridgeResource) -> ProviderResult<()> {
        self.destroy_bridge(&resource.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vswitch_common::ProviderError;
    use vswitch_test::{string_map, CommandLogVerifier, FakeSwitch, SeedBridge};

    fn provider() -> (Arc<FakeSwitch>, OvsBridge) {
        let switch = Arc::new(FakeSwitch::new());
        let provider = OvsBridge::new(switch.clone());
        (switch, provider)
    }

    #[test]
    fn test_bridge_exists() {
        let (switch, provider) = provider();
        assert!(!provider.bridge_exists("br0").unwrap());

        switch.seed(SeedBridge::new("br0"));
        assert!(provider.bridge_exists("br0").unwrap());
    }

    #[test]
    fn test_bridge_exists_any_exit_code_is_absent() {
        let (switch, provider) = provider();
        switch.seed(SeedBridge::new("br0"));
        switch.fail_on("br-exists br0", 1, "ovs-vsctl: unix:/var/run/openvswitch/db.sock: database connection failed");
        assert!(!provider.bridge_exists("br0").unwrap());
    }

    #[test]
    fn test_bridge_exists_spawn_failure_propagates() {
        let (switch, provider) = provider();
        switch.fail_to_spawn("br-exists");
        let err = provider.bridge_exists("br0").unwrap_err();
        assert!(matches!(err, ProviderError::ShellExec { .. }));
    }

    #[test]
    fn test_create_bridge_order() {
        let (switch, provider) = provider();
        let ids = string_map([("owner", "net-team")]);

        provider.create_bridge("br-ex", Some(&ids), Some(2048)).unwrap();

        assert_eq!(
            switch.commands(),
            vec![
                "ovs-vsctl add-br br-ex",
                "ip link set dev br-ex up",
                "ovs-vsctl br-set-external-id br-ex owner net-team",
                "ovs-vsctl set Bridge br-ex other-config:mac-table-size=2048",
            ]
        );
        let bridge = switch.bridge("br-ex").unwrap();
        assert!(bridge.link_up);
        assert_eq!(bridge.external_ids, ids);
    }

    #[test]
    fn test_create_bridge_without_properties() {
        let (switch, provider) = provider();
        provider.create_bridge("br-int", None, None).unwrap();
        assert_eq!(
            switch.commands(),
            vec!["ovs-vsctl add-br br-int", "ip link set dev br-int up"]
        );
    }

    #[test]
    fn test_create_bridge_failure_aborts() {
        let (switch, provider) = provider();
        switch.fail_on("add-br", 1, "ovs-vsctl: database connection failed");

        let err = provider
            .create_bridge("br-ex", None, Some(2048))
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(switch.commands(), vec!["ovs-vsctl add-br br-ex"]);
    }

    #[test]
    fn test_create_bridge_link_failure_leaves_bridge() {
        let (switch, provider) = provider();
        switch.fail_on("ip link set", 2, "RTNETLINK answers: Operation not permitted");

        assert!(provider.create_bridge("br-ex", None, None).is_err());
        // No rollback: the next pass converges instead.
        CommandLogVerifier::new(&switch)
            .assert_bridge_exists("br-ex")
            .unwrap();
    }

    #[test]
    fn test_destroy_bridge_order() {
        let (switch, provider) = provider();
        switch.seed(SeedBridge::new("br-ex").link_up());

        provider.destroy_bridge("br-ex").unwrap();

        assert_eq!(
            switch.commands(),
            vec!["ip link set dev br-ex down", "ovs-vsctl del-br br-ex"]
        );
        assert!(!switch.has_bridge("br-ex"));
    }

    #[test]
    fn test_destroy_missing_bridge_fails() {
        let (_switch, provider) = provider();
        let err = provider.destroy_bridge("br-gone").unwrap_err();
        assert!(err.is_execution_failure());
    }

    #[test]
    fn test_exists_after_create_and_destroy() {
        let (_switch, provider) = provider();
        let resource = BridgeResource::new("br0");

        provider.create(&resource).unwrap();
        assert!(provider.exists(&resource).unwrap());

        provider.destroy(&resource).unwrap();
        assert!(!provider.exists(&resource).unwrap());
    }

    #[test]
    fn test_state_snapshot() {
        let (switch, provider) = provider();
        switch.seed(
            SeedBridge::new("br0")
                .with_external_id("owner", "infra")
                .with_other_config("mac-table-size", "4096"),
        );

        let state = provider.state("br0").unwrap();
        assert!(state.exists);
        assert_eq!(state.external_ids, string_map([("owner", "infra")]));
        assert_eq!(state.mac_table_size, Some(4096));

        assert_eq!(provider.state("br1").unwrap(), BridgeState::absent("br1"));
    }

    #[test]
    fn test_provider_identity() {
        let (_switch, provider) = provider();
        assert_eq!(provider.resource_type(), "vs_bridge");
        assert_eq!(provider.provider_name(), "ovs");
    }
}
