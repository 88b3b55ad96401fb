//! Resource provider trait and common abstractions.
//!
//! A provider makes one kind of declared resource converge with the live
//! system. The catalog asks the provider whether the resource exists, then
//! creates or destroys it, or hands individual properties to the provider's
//! getter/setter pairs. Providers keep no state between calls; every answer
//! comes from querying the system again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProviderError, ProviderResult};

/// Desired existence of a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    /// The resource must exist.
    #[default]
    Present,
    /// The resource must not exist.
    Absent,
}

impl Ensure {
    /// Returns the value as written in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Ensure::Present => "present",
            Ensure::Absent => "absent",
        }
    }
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ensure {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Ensure::Present),
            "absent" => Ok(Ensure::Absent),
            other => Err(ProviderError::invalid_config(
                "ensure",
                format!("expected 'present' or 'absent', got '{}'", other),
            )),
        }
    }
}

/// Catalog-facing entry points shared by every provider.
///
/// Property getters and setters are specific to each resource type and live
/// on the implementing type itself.
///
/// # Example
///
/// ```ignore
/// use vswitch_common::{ProviderResult, ResourceProvider};
///
/// impl ResourceProvider for MyProvider {
///     type Resource = MyResource;
///
///     fn resource_type(&self) -> &str { "my_resource" }
///     fn provider_name(&self) -> &str { "cli" }
///
///     fn exists(&self, resource: &MyResource) -> ProviderResult<bool> { /* ... */ }
///     fn create(&self, resource: &MyResource) -> ProviderResult<()> { /* ... */ }
///     fn destroy(&self, resource: &MyResource) -> ProviderResult<()> { /* ... */ }
/// }
/// ```
pub trait ResourceProvider {
    /// The declared resource this provider manages.
    type Resource;

    /// Returns the resource type name (e.g., "vs_bridge").
    fn resource_type(&self) -> &str;

    /// Returns the provider name (e.g., "ovs").
    ///
    /// This is used for logging.
    fn provider_name(&self) -> &str;

    /// Returns true if the resource currently exists on the system.
    fn exists(&self, resource: &Self::Resource) -> ProviderResult<bool>;

    /// Creates the resource, applying any declared properties.
    fn create(&self, resource: &Self::Resource) -> ProviderResult<()>;

    /// Removes the resource.
    fn destroy(&self, resource: &Self::Resource) -> ProviderResult<()>;
}
