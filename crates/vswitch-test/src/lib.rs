//! Test infrastructure for virtual switch providers
//!
//! Provides:
//! - An in-memory fake of `ovs-vsctl` and `ip` implementing `CommandRunner`
//! - Test fixtures for common bridge states
//! - Command log and switch state verification helpers

mod fake_switch;
pub mod fixtures;
mod verification;

pub use fake_switch::{format_map_column, FakeBridge, FakeSwitch};
pub use fixtures::*;
pub use verification::*;
