//! Catalog - converges declared bridges with the switch
//!
//! Apply flow per resource:
//! 1. Existence check
//! 2. Absent but wanted → create (properties applied during creation)
//! 3. Present but unwanted → destroy
//! 4. Present and wanted → for each declared property, compare the live value
//!    and call the setter only on mismatch
//!
//! Undeclared properties are never read or written.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, instrument, warn};
use vswitch_common::{Ensure, ProviderResult, ResourceProvider};

use crate::bridge::OvsBridge;
use crate::types::{BridgeResource, ExternalIds};

/// Name of the external ids property
pub const PROPERTY_EXTERNAL_IDS: &str = "external_ids";

/// Name of the MAC table size property
pub const PROPERTY_MAC_TABLE_SIZE: &str = "mac_table_size";

/// Value of a managed property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// external_ids map
    ExternalIds(ExternalIds),
    /// mac_table_size, `None` when unset
    MacTableSize(Option<u32>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::ExternalIds(ids) => {
                let pairs: Vec<String> = ids.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            PropertyValue::MacTableSize(Some(size)) => write!(f, "{}", size),
            PropertyValue::MacTableSize(None) => f.write_str("unset"),
        }
    }
}

/// One change made (or, in noop mode, that would be made)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Bridge was created
    Created,
    /// Bridge was removed
    Removed,
    /// A property was changed
    PropertyChanged {
        /// Property name
        property: String,
        /// Live value before the change
        from: PropertyValue,
        /// Desired value
        to: PropertyValue,
    },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Created => f.write_str("ensure changed 'absent' to 'present'"),
            Event::Removed => f.write_str("ensure changed 'present' to 'absent'"),
            Event::PropertyChanged { property, from, to } => {
                write!(f, "{} changed '{}' to '{}'", property, from, to)
            }
        }
    }
}

/// Outcome of applying one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Bridge name
    pub resource: String,
    /// Whether changes were only simulated
    pub noop: bool,
    /// Changes, in the order they were made
    pub events: Vec<Event>,
}

impl ApplyReport {
    fn new(resource: &str, noop: bool) -> Self {
        Self {
            resource: resource.to_string(),
            noop,
            events: Vec::new(),
        }
    }

    /// True if anything changed (or would change)
    pub fn changed(&self) -> bool {
        !self.events.is_empty()
    }
}

/// A resource whose apply failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceFailure {
    /// Bridge name
    pub resource: String,
    /// Error message
    pub error: String,
}

/// Outcome of applying a list of resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogReport {
    /// Resources that applied cleanly
    pub reports: Vec<ApplyReport>,
    /// Resources that failed
    pub failures: Vec<ResourceFailure>,
}

impl CatalogReport {
    /// True if no resource failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of resources that changed
    pub fn changed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.changed()).count()
    }
}

/// Applies bridge declarations through the ovs provider
pub struct Catalog<'a> {
    provider: &'a OvsBridge,
    noop: bool,
}

impl<'a> Catalog<'a> {
    /// Create a catalog that makes changes
    pub fn new(provider: &'a OvsBridge) -> Self {
        Self {
            provider,
            noop: false,
        }
    }

    /// Only report what would change; queries still run
    pub fn with_noop(mut self, noop: bool) -> Self {
        self.noop = noop;
        self
    }

    /// Converge one bridge with its declaration
    #[instrument(skip(self, resource), fields(bridge = %resource.name, ensure = %resource.ensure))]
    pub fn apply(&self, resource: &BridgeResource) -> ProviderResult<ApplyReport> {
        resource.validate()?;

        let mut report = ApplyReport::new(&resource.name, self.noop);
        let exists = self.provider.exists(resource)?;

        match (resource.ensure, exists) {
            (Ensure::Present, false) => {
                if !self.noop {
                    self.provider.create(resource)?;
                }
                info!("{}: created", resource.name);
                report.events.push(Event::Created);
            }
            (Ensure::Absent, true) => {
                if !self.noop {
                    self.provider.destroy(resource)?;
                }
                info!("{}: removed", resource.name);
                report.events.push(Event::Removed);
            }
            (Ensure::Absent, false) => {
                debug!("{} already absent", resource.name);
            }
            (Ensure::Present, true) => {
                self.sync_properties(resource, &mut report)?;
            }
        }

        Ok(report)
    }

    fn sync_properties(
        &self,
        resource: &BridgeResource,
        report: &mut ApplyReport,
    ) -> ProviderResult<()> {
        let name = resource.name.as_str();

        if let Some(desired) = &resource.external_ids {
            let current = self.provider.external_ids(name)?;
            if &current != desired {
                if !self.noop {
                    self.provider.set_external_ids(name, desired)?;
                }
                report.events.push(Event::PropertyChanged {
                    property: PROPERTY_EXTERNAL_IDS.to_string(),
                    from: PropertyValue::ExternalIds(current),
                    to: PropertyValue::ExternalIds(desired.clone()),
                });
            } else {
                debug!("{}: {} in sync", name, PROPERTY_EXTERNAL_IDS);
            }
        }

        if let Some(desired) = resource.mac_table_size {
            let current = self.provider.mac_table_size(name)?;
            if current != Some(desired) {
                if !self.noop {
                    self.provider.set_mac_table_size(name, desired)?;
                }
                report.events.push(Event::PropertyChanged {
                    property: PROPERTY_MAC_TABLE_SIZE.to_string(),
                    from: PropertyValue::MacTableSize(current),
                    to: PropertyValue::MacTableSize(Some(desired)),
                });
            } else {
                debug!("{}: {} in sync", name, PROPERTY_MAC_TABLE_SIZE);
            }
        }

        Ok(())
    }

    /// Converge every bridge in order
    ///
    /// A failing resource is recorded and the rest are still applied.
    pub fn apply_all(&self, resources: &[BridgeResource]) -> CatalogReport {
        let mut catalog_report = CatalogReport::default();
        for resource in resources {
            match self.apply(resource) {
                Ok(report) => catalog_report.reports.push(report),
                Err(e) => {
                    warn!("Failed to apply {}: {}", resource.name, e);
                    catalog_report.failures.push(ResourceFailure {
                        resource: resource.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        catalog_report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use vswitch_test::{
        bridge_fixtures, string_map, CommandLogVerifier, FakeSwitch, SeedBridge,
    };

    fn setup() -> (Arc<FakeSwitch>, OvsBridge) {
        let switch = Arc::new(FakeSwitch::new());
        let provider = OvsBridge::new(switch.clone());
        (switch, provider)
    }

    #[test]
    fn test_apply_creates_missing_bridge() {
        let (switch, provider) = setup();
        let resource = BridgeResource::new("br-ex")
            .with_external_id("owner", "net-team")
            .with_mac_table_size(2048);

        let report = Catalog::new(&provider).apply(&resource).unwrap();

        assert_eq!(report.events, vec![Event::Created]);
        let verifier = CommandLogVerifier::new(&switch);
        verifier
            .assert_external_ids("br-ex", &string_map([("owner", "net-team")]))
            .unwrap();
        verifier
            .assert_other_config("br-ex", "mac-table-size", Some("2048"))
            .unwrap();
    }

    #[test]
    fn test_apply_removes_unwanted_bridge() {
        let (switch, provider) = setup();
        switch.seed(SeedBridge::new("br-old").link_up());

        let report = Catalog::new(&provider)
            .apply(&BridgeResource::absent("br-old"))
            .unwrap();

        assert_eq!(report.events, vec![Event::Removed]);
        assert!(!switch.has_bridge("br-old"));
    }

    #[test]
    fn test_apply_absent_and_missing_is_noop() {
        let (switch, provider) = setup();
        let report = Catalog::new(&provider)
            .apply(&BridgeResource::absent("br-old"))
            .unwrap();
        assert!(!report.changed());
        assert_eq!(switch.commands(), vec!["ovs-vsctl br-exists br-old"]);
    }

    #[test]
    fn test_apply_syncs_properties() {
        let (switch, provider) = setup();
        switch.seed(bridge_fixtures::stale_tagged_bridge("br0"));
        let resource = BridgeResource::new("br0")
            .with_external_ids([("owner", "net-team")])
            .with_mac_table_size(4096);

        let report = Catalog::new(&provider).apply(&resource).unwrap();

        assert_eq!(
            report.events,
            vec![
                Event::PropertyChanged {
                    property: "external_ids".to_string(),
                    from: PropertyValue::ExternalIds(string_map([
                        ("owner", "infra"),
                        ("stale", "x")
                    ])),
                    to: PropertyValue::ExternalIds(string_map([("owner", "net-team")])),
                },
                Event::PropertyChanged {
                    property: "mac_table_size".to_string(),
                    from: PropertyValue::MacTableSize(None),
                    to: PropertyValue::MacTableSize(Some(4096)),
                },
            ]
        );
        CommandLogVerifier::new(&switch)
            .assert_mutation_count(3)
            .unwrap();
    }

    #[test]
    fn test_apply_twice_converges() {
        let (switch, provider) = setup();
        let resource = BridgeResource::new("br0")
            .with_external_ids([("owner", "net-team"), ("env", "prod")])
            .with_mac_table_size(2048);
        let catalog = Catalog::new(&provider);

        assert!(catalog.apply(&resource).unwrap().changed());
        switch.clear_log();

        let report = catalog.apply(&resource).unwrap();
        assert!(!report.changed());
        CommandLogVerifier::new(&switch)
            .assert_no_mutations()
            .unwrap();
    }

    #[test]
    fn test_apply_leaves_undeclared_properties_alone() {
        let (switch, provider) = setup();
        switch.seed(bridge_fixtures::stale_tagged_bridge("br0"));

        let report = Catalog::new(&provider)
            .apply(&BridgeResource::new("br0"))
            .unwrap();

        assert!(!report.changed());
        assert_eq!(switch.commands(), vec!["ovs-vsctl br-exists br0"]);
    }

    #[test]
    fn test_noop_reports_without_mutating() {
        let (switch, provider) = setup();
        switch.seed(bridge_fixtures::sized_bridge("br0", 1024));
        let catalog = Catalog::new(&provider).with_noop(true);

        let report = catalog
            .apply(&BridgeResource::new("br0").with_mac_table_size(4096))
            .unwrap();
        assert!(report.noop);
        assert!(report.changed());

        let report = catalog.apply(&BridgeResource::new("br-new")).unwrap();
        assert_eq!(report.events, vec![Event::Created]);

        CommandLogVerifier::new(&switch)
            .assert_no_mutations()
            .unwrap();
        assert!(!switch.has_bridge("br-new"));
    }

    #[test]
    fn test_apply_rejects_invalid_resource() {
        let (switch, provider) = setup();
        let err = Catalog::new(&provider)
            .apply(&BridgeResource::new(""))
            .unwrap_err();
        assert!(matches!(
            err,
            vswitch_common::ProviderError::InvalidConfig { .. }
        ));
        assert!(switch.commands().is_empty());
    }

    #[test]
    fn test_apply_all_continues_after_failure() {
        let (switch, provider) = setup();
        switch.fail_on("add-br br-bad", 1, "ovs-vsctl: database connection failed");

        let report = Catalog::new(&provider).apply_all(&[
            BridgeResource::new("br-bad"),
            BridgeResource::new("br-good"),
        ]);

        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].resource, "br-bad");
        assert_eq!(report.changed_count(), 1);
        assert!(switch.has_bridge("br-good"));
    }

    #[test]
    fn test_event_display() {
        assert_eq!(
            Event::Created.to_string(),
            "ensure changed 'absent' to 'present'"
        );
        let event = Event::PropertyChanged {
            property: "mac_table_size".to_string(),
            from: PropertyValue::MacTableSize(None),
            to: PropertyValue::MacTableSize(Some(2048)),
        };
        assert_eq!(
            event.to_string(),
            "mac_table_size changed 'unset' to '2048'"
        );
        let ids = PropertyValue::ExternalIds(string_map([("a", "1"), ("b", "2")]));
        assert_eq!(ids.to_string(), "{a=1, b=2}");
    }

    #[test]
    fn test_report_serialization() {
        let report = ApplyReport {
            resource: "br0".to_string(),
            noop: false,
            events: vec![Event::PropertyChanged {
                property: "mac_table_size".to_string(),
                from: PropertyValue::MacTableSize(None),
                to: PropertyValue::MacTableSize(Some(2048)),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["events"][0]["event"], "property_changed");
        assert_eq!(json["events"][0]["from"], serde_json::Value::Null);
        assert_eq!(json["events"][0]["to"], 2048);
    }
}
