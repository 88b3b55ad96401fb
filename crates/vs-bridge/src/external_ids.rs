//! external_ids reconciliation
//!
//! The live map is read with `br-get-external-id`, which prints one
//! `key=value` per line. Converging on a desired map issues one
//! `br-set-external-id` per key that is missing or different, then one
//! value-less `br-set-external-id` per key that should go away.

use tracing::{debug, info, instrument};
use vswitch_common::{ProviderError, ProviderResult};

use crate::bridge::OvsBridge;
use crate::types::ExternalIds;

/// Parse `br-get-external-id` output
///
/// Lines are trimmed and blank lines ignored. Each line is split on its first
/// `=`; a line with no `=` is a parse error.
pub fn parse_external_ids(command: &str, output: &str) -> ProviderResult<ExternalIds> {
    let mut ids = ExternalIds::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ProviderError::parse(command, line, "missing '=' separator"))?;
        ids.insert(key.to_string(), value.to_string());
    }
    Ok(ids)
}

/// Commands needed to turn one external_ids map into another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalIdsDiff {
    /// Keys to add or overwrite, with their new value
    pub to_set: Vec<(String, String)>,
    /// Keys to remove
    pub to_remove: Vec<String>,
}

impl ExternalIdsDiff {
    /// Compute the minimal diff from `current` to `desired`
    pub fn compute(current: &ExternalIds, desired: &ExternalIds) -> Self {
        let to_set = desired
            .iter()
            .filter(|(k, v)| current.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let to_remove = current
            .keys()
            .filter(|k| !desired.contains_key(*k))
            .cloned()
            .collect();
        Self { to_set, to_remove }
    }

    /// True when the maps already match
    pub fn is_empty(&self) -> bool {
        self.to_set.is_empty() && self.to_remove.is_empty()
    }

    /// Number of commands the diff needs
    pub fn len(&self) -> usize {
        self.to_set.len() + self.to_remove.len()
    }
}

impl OvsBridge {
    /// Get the bridge's current external ids
    pub fn external_ids(&self, name: &str) -> ProviderResult<ExternalIds> {
        let cmd = self.commands().br_get_external_ids(name);
        let output = self.run(&cmd)?;
        parse_external_ids(&cmd.to_string(), &output)
    }

    /// Make the bridge's external ids equal `desired`
    #[instrument(skip(self, desired))]
    pub fn set_external_ids(&self, name: &str, desired: &ExternalIds) -> ProviderResult<()> {
        let current = self.external_ids(name)?;
        self.apply_external_ids(name, &current, desired)?;
        Ok(())
    }

    /// Issue the commands turning `current` into `desired`
    ///
    /// All additions and updates are issued before any removal. Returns the
    /// number of commands issued.
    pub(crate) fn apply_external_ids(
        &self,
        name: &str,
        current: &ExternalIds,
        desired: &ExternalIds,
    ) -> ProviderResult<usize> {
        let diff = ExternalIdsDiff::compute(current, desired);
        if diff.is_empty() {
            debug!(bridge = name, "External ids already in sync");
            return Ok(0);
        }

        for (key, value) in &diff.to_set {
            self.run(&self.commands().br_set_external_id(name, key, value))?;
            debug!(bridge = name, key = %key, value = %value, "Set external id");
        }

        for key in &diff.to_remove {
            self.run(&self.commands().br_remove_external_id(name, key))?;
            debug!(bridge = name, key = %key, "Removed external id");
        }

        info!(
            "Updated external ids on {}: {} set, {} removed",
            name,
            diff.to_set.len(),
            diff.to_remove.len()
        );
        Ok(diff.len())
    }
}
