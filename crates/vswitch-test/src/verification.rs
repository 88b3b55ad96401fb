//! Verification helpers for testing providers
//!
//! Provides assertion helpers over the fake switch's command log and state

use std::collections::BTreeMap;
use thiserror::Error;
use vswitch_common::CommandLine;

use crate::FakeSwitch;

/// `ovs-vsctl` subcommands that only read state
const QUERY_SUBCOMMANDS: &[&str] = &["br-exists", "br-get-external-id", "get"];

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected command '{command}' was not issued; issued: {issued:?}")]
    CommandMissing {
        command: String,
        issued: Vec<String>,
    },

    #[error("Command '{command}' was issued but should not have been")]
    UnexpectedCommand { command: String },

    #[error("Expected '{first}' before '{second}'; issued: {issued:?}")]
    OrderMismatch {
        first: String,
        second: String,
        issued: Vec<String>,
    },

    #[error("Expected {expected} mutating commands, found {actual}: {issued:?}")]
    MutationCountMismatch {
        expected: usize,
        actual: usize,
        issued: Vec<String>,
    },

    #[error("Bridge '{bridge}' not found on the switch")]
    BridgeNotFound { bridge: String },

    #[error("Bridge '{bridge}' should not exist")]
    BridgeStillPresent { bridge: String },

    #[error("External ids mismatch for {bridge}: expected {expected:?}, got {actual:?}")]
    ExternalIdsMismatch {
        bridge: String,
        expected: BTreeMap<String, String>,
        actual: BTreeMap<String, String>,
    },

    #[error("other_config:{key} mismatch for {bridge}: expected {expected:?}, got {actual:?}")]
    OtherConfigMismatch {
        bridge: String,
        key: String,
        expected: Option<String>,
        actual: Option<String>,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Returns true if the command only reads switch state
pub fn is_query(cmd: &CommandLine) -> bool {
    cmd.args
        .first()
        .is_some_and(|sub| QUERY_SUBCOMMANDS.contains(&sub.as_str()))
}

/// Command log and state verification helper
pub struct CommandLogVerifier<'a> {
    switch: &'a FakeSwitch,
}

impl<'a> CommandLogVerifier<'a> {
    /// Create a new verifier
    pub fn new(switch: &'a FakeSwitch) -> Self {
        Self { switch }
    }

    /// Commands that changed (or tried to change) switch state
    pub fn mutating_commands(&self) -> Vec<String> {
        self.switch
            .command_lines()
            .iter()
            .filter(|cmd| !is_query(cmd))
            .map(ToString::to_string)
            .collect()
    }

    /// Verify a command was issued
    pub fn assert_issued(&self, command: &str) -> VerifyResult<()> {
        let issued = self.switch.commands();
        if issued.iter().any(|c| c == command) {
            Ok(())
        } else {
            Err(VerificationError::CommandMissing {
                command: command.to_string(),
                issued,
            })
        }
    }

    /// Verify a command was never issued
    pub fn assert_not_issued(&self, command: &str) -> VerifyResult<()> {
        if self.switch.commands().iter().any(|c| c == command) {
            Err(VerificationError::UnexpectedCommand {
                command: command.to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Verify the first occurrence of `first` precedes the first occurrence of `second`
    pub fn assert_issued_before(&self, first: &str, second: &str) -> VerifyResult<()> {
        let issued = self.switch.commands();
        let first_pos = issued.iter().position(|c| c == first);
        let second_pos = issued.iter().position(|c| c == second);
        match (first_pos, second_pos) {
            (Some(a), Some(b)) if a < b => Ok(()),
            _ => Err(VerificationError::OrderMismatch {
                first: first.to_string(),
                second: second.to_string(),
                issued,
            }),
        }
    }

    /// Verify exactly `expected` mutating commands were issued
    pub fn assert_mutation_count(&self, expected: usize) -> VerifyResult<()> {
        let issued = self.mutating_commands();
        if issued.len() == expected {
            Ok(())
        } else {
            Err(VerificationError::MutationCountMismatch {
                expected,
                actual: issued.len(),
                issued,
            })
        }
    }

    /// Verify nothing but queries were issued
    pub fn assert_no_mutations(&self) -> VerifyResult<()> {
        self.assert_mutation_count(0)
    }

    /// Verify a bridge exists
    pub fn assert_bridge_exists(&self, bridge: &str) -> VerifyResult<()> {
        if self.switch.has_bridge(bridge) {
            Ok(())
        } else {
            Err(VerificationError::BridgeNotFound {
                bridge: bridge.to_string(),
            })
        }
    }

    /// Verify a bridge does not exist
    pub fn assert_bridge_absent(&self, bridge: &str) -> VerifyResult<()> {
        if self.switch.has_bridge(bridge) {
            Err(VerificationError::BridgeStillPresent {
                bridge: bridge.to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Verify the bridge's external ids equal `expected` exactly
    pub fn assert_external_ids(
        &self,
        bridge: &str,
        expected: &BTreeMap<String, String>,
    ) -> VerifyResult<()> {
        let actual = self
            .switch
            .bridge(bridge)
            .ok_or_else(|| VerificationError::BridgeNotFound {
                bridge: bridge.to_string(),
            })?
            .external_ids;
        if &actual == expected {
            Ok(())
        } else {
            Err(VerificationError::ExternalIdsMismatch {
                bridge: bridge.to_string(),
                expected: expected.clone(),
                actual,
            })
        }
    }

    /// Verify one other_config entry
    pub fn assert_other_config(
        &self,
        bridge: &str,
        key: &str,
        expected: Option<&str>,
    ) -> VerifyResult<()> {
        let actual = self
            .switch
            .bridge(bridge)
            .ok_or_else(|| VerificationError::BridgeNotFound {
                bridge: bridge.to_string(),
            })?
            .other_config
            .get(key)
            .cloned();
        if actual.as_deref() == expected {
            Ok(())
        } else {
            Err(VerificationError::OtherConfigMismatch {
                bridge: bridge.to_string(),
                key: key.to_string(),
                expected: expected.map(str::to_string),
                actual,
            })
        }
    }
}
