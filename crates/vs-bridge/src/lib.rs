//! vs-bridge - Open vSwitch bridge provider
//!
//! Converges declared `vs_bridge` resources (existence, external ids and the
//! MAC learning table size) with the live switch by running `ovs-vsctl` and
//! `ip` and diffing their output against the declaration.

mod bridge;
mod catalog;
mod commands;
mod config;
mod external_ids;
mod other_config;
mod types;

pub use bridge::*;
pub use catalog::*;
pub use commands::*;
pub use config::*;
pub use external_ids::*;
pub use other_config::*;
pub use types::*;
