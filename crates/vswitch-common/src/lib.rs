//! Common infrastructure for virtual switch resource providers.
//!
//! This crate provides the pieces every provider shares:
//!
//! - [`shell`]: command execution through an injectable [`CommandRunner`]
//! - [`ResourceProvider`]: catalog-facing exists/create/destroy trait
//! - [`error`]: error types separating execution failures from parse failures
//!
//! # Architecture
//!
//! Providers follow this pattern:
//!
//! 1. Receive a declared resource from the catalog
//! 2. Query the live system with external commands (`ovs-vsctl`, `ip`)
//! 3. Diff the parsed output against the declaration
//! 4. Issue the minimal set of commands needed to converge
//!
//! Nothing is cached between calls. Re-running a provider after a failure is
//! how the system recovers.
//!
//! # Example
//!
//! ```ignore
//! use vswitch_common::{
//!     shell::{CommandLine, CommandRunner, VSCTL_CMD},
//!     ProviderResult,
//! };
//!
//! fn add_bridge(runner: &dyn CommandRunner, name: &str) -> ProviderResult<()> {
//!     let cmd = CommandLine::new(VSCTL_CMD).arg("add-br").arg(name);
//!     runner.exec_or_throw(&cmd)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod provider;
pub mod shell;

// Re-export commonly used items at crate root
pub use error::{ProviderError, ProviderResult};
pub use provider::{Ensure, ResourceProvider};
pub use shell::{CommandLine, CommandRunner, ExecResult, SystemRunner};
