//! In-memory stand-in for `ovs-vsctl` and `ip`
//!
//! `FakeSwitch` implements [`CommandRunner`] by interpreting the subset of
//! `ovs-vsctl` and `ip link` the bridge provider uses against an in-memory
//! bridge table. Every invocation is recorded so tests can assert on the
//! exact commands issued.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Mutex, MutexGuard};

use vswitch_common::shell::{IP_CMD, VSCTL_CMD};
use vswitch_common::{CommandLine, CommandRunner, ExecResult, ProviderError, ProviderResult};

use crate::fixtures::SeedBridge;

/// Live state of one emulated bridge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeBridge {
    /// Bridge external_ids column
    pub external_ids: BTreeMap<String, String>,
    /// Bridge other_config column
    pub other_config: BTreeMap<String, String>,
    /// Administrative state of the bridge's OS link
    pub link_up: bool,
}

#[derive(Debug, Clone)]
enum Injection {
    /// Command runs and exits with the given code
    Exit { exit_code: i32, stderr: String },
    /// Command cannot be spawned at all
    Spawn,
    /// Command succeeds and prints the given stdout
    Output(String),
}

#[derive(Debug, Default)]
struct SwitchState {
    bridges: BTreeMap<String, FakeBridge>,
    log: Vec<CommandLine>,
    injections: Vec<(String, Injection)>,
}

/// Emulated virtual switch host
#[derive(Debug)]
pub struct FakeSwitch {
    vsctl: String,
    ip: String,
    state: Mutex<SwitchState>,
}

impl FakeSwitch {
    /// Create an empty switch answering to the default binary names
    pub fn new() -> Self {
        Self::with_commands(VSCTL_CMD, IP_CMD)
    }

    /// Create an empty switch answering to custom binary paths
    pub fn with_commands(vsctl: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            vsctl: vsctl.into(),
            ip: ip.into(),
            state: Mutex::new(SwitchState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SwitchState> {
        self.state.lock().expect("fake switch state poisoned")
    }

    /// Add a pre-existing bridge
    pub fn seed(&self, seed: SeedBridge) -> &Self {
        let (name, bridge) = seed.into_parts();
        self.state().bridges.insert(name, bridge);
        self
    }

    /// Snapshot of a bridge, if it exists
    pub fn bridge(&self, name: &str) -> Option<FakeBridge> {
        self.state().bridges.get(name).cloned()
    }

    /// Check whether a bridge exists
    pub fn has_bridge(&self, name: &str) -> bool {
        self.state().bridges.contains_key(name)
    }

    /// Names of all bridges
    pub fn bridge_names(&self) -> Vec<String> {
        self.state().bridges.keys().cloned().collect()
    }

    /// Every command issued so far, in order
    pub fn command_lines(&self) -> Vec<CommandLine> {
        self.state().log.clone()
    }

    /// Every command issued so far, rendered as shell text
    pub fn commands(&self) -> Vec<String> {
        self.state().log.iter().map(ToString::to_string).collect()
    }

    /// Forget recorded commands (state is kept)
    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    /// Make any command whose rendered text contains `pattern` exit non-zero
    pub fn fail_on(&self, pattern: impl Into<String>, exit_code: i32, stderr: impl Into<String>) {
        self.state().injections.push((
            pattern.into(),
            Injection::Exit {
                exit_code,
                stderr: stderr.into(),
            },
        ));
    }

    /// Make any command whose rendered text contains `pattern` fail to spawn
    pub fn fail_to_spawn(&self, pattern: impl Into<String>) {
        self.state()
            .injections
            .push((pattern.into(), Injection::Spawn));
    }

    /// Make any command whose rendered text contains `pattern` print `stdout`
    pub fn respond_with(&self, pattern: impl Into<String>, stdout: impl Into<String>) {
        self.state()
            .injections
            .push((pattern.into(), Injection::Output(stdout.into())));
    }

    /// Remove all injected failures and canned outputs
    pub fn clear_injections(&self) {
        self.state().injections.clear();
    }

    fn run_vsctl(state: &mut SwitchState, args: &[&str]) -> ExecResult {
        match args {
            ["br-exists", name] => {
                if state.bridges.contains_key(*name) {
                    ExecResult::ok("")
                } else {
                    ExecResult::failed(2, "")
                }
            }
            ["add-br", name] => {
                if state.bridges.contains_key(*name) {
                    return ExecResult::failed(
                        1,
                        format!(
                            "ovs-vsctl: cannot create a bridge named {} because a bridge named {} already exists",
                            name, name
                        ),
                    );
                }
                state.bridges.insert(name.to_string(), FakeBridge::default());
                ExecResult::ok("")
            }
            ["del-br", name] => match state.bridges.remove(*name) {
                Some(_) => ExecResult::ok(""),
                None => no_bridge(name),
            },
            ["br-get-external-id", name] => match state.bridges.get(*name) {
                Some(bridge) => ExecResult::ok(
                    bridge
                        .external_ids
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
                None => no_bridge(name),
            },
            ["br-set-external-id", name, key] => match state.bridges.get_mut(*name) {
                Some(bridge) => {
                    bridge.external_ids.remove(*key);
                    ExecResult::ok("")
                }
                None => no_bridge(name),
            },
            ["br-set-external-id", name, key, value] => match state.bridges.get_mut(*name) {
                Some(bridge) => {
                    bridge
                        .external_ids
                        .insert(key.to_string(), value.to_string());
                    ExecResult::ok("")
                }
                None => no_bridge(name),
            },
            ["get", "Bridge", name, "other-config" | "other_config"] => {
                match state.bridges.get(*name) {
                    Some(bridge) => ExecResult::ok(format_map_column(&bridge.other_config)),
                    None => no_row(name),
                }
            }
            ["set", "Bridge", name, assignment] => {
                let Some(bridge) = state.bridges.get_mut(*name) else {
                    return no_row(name);
                };
                let column_key = assignment
                    .strip_prefix("other-config:")
                    .or_else(|| assignment.strip_prefix("other_config:"));
                match column_key.and_then(|kv| kv.split_once('=')) {
                    Some((key, value)) => {
                        bridge
                            .other_config
                            .insert(key.to_string(), value.trim_matches('"').to_string());
                        ExecResult::ok("")
                    }
                    None => ExecResult::failed(
                        1,
                        format!("ovs-vsctl: unsupported assignment {}", assignment),
                    ),
                }
            }
            _ => ExecResult::failed(1, format!("ovs-vsctl: unknown command '{}'", args.join(" "))),
        }
    }

    fn run_ip(state: &mut SwitchState, args: &[&str]) -> ExecResult {
        match args {
            ["link", "set", "dev", name, admin @ ("up" | "down")] => {
                match state.bridges.get_mut(*name) {
                    Some(bridge) => {
                        bridge.link_up = *admin == "up";
                        ExecResult::ok("")
                    }
                    None => ExecResult::failed(1, format!("Cannot find device \"{}\"", name)),
                }
            }
            _ => ExecResult::failed(255, format!("Command \"{}\" is unknown", args.join(" "))),
        }
    }
}

impl Default for FakeSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for FakeSwitch {
    fn exec(&self, cmd: &CommandLine) -> ProviderResult<ExecResult> {
        let mut state = self.state();
        state.log.push(cmd.clone());

        let rendered = cmd.to_string();
        let injection = state
            .injections
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, injection)| injection.clone());
        match injection {
            Some(Injection::Exit { exit_code, stderr }) => {
                return Ok(ExecResult::failed(exit_code, stderr))
            }
            Some(Injection::Spawn) => {
                return Err(ProviderError::ShellExec {
                    command: rendered,
                    source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
                })
            }
            Some(Injection::Output(stdout)) => return Ok(ExecResult::ok(stdout)),
            None => {}
        }

        let args: Vec<&str> = cmd.args.iter().map(String::as_str).collect();
        let result = if cmd.program == self.vsctl {
            Self::run_vsctl(&mut state, &args)
        } else if cmd.program == self.ip {
            Self::run_ip(&mut state, &args)
        } else {
            ExecResult::failed(127, format!("{}: command not found", cmd.program))
        };
        Ok(result)
    }
}

fn no_bridge(name: &str) -> ExecResult {
    ExecResult::failed(1, format!("ovs-vsctl: no bridge named {}", name))
}

fn no_row(name: &str) -> ExecResult {
    ExecResult::failed(
        1,
        format!("ovs-vsctl: no row \"{}\" in table Bridge", name),
    )
}

/// Escape `\` and `"` as `ovs-vsctl` does inside a quoted string
fn escape_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render a map column the way `ovs-vsctl get` prints it
pub fn format_map_column(map: &BTreeMap<String, String>) -> String {
    let body = map
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_quoted(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vsctl(args: &[&str]) -> CommandLine {
        CommandLine::new(VSCTL_CMD).args(args.iter().copied())
    }

    #[test]
    fn test_add_and_delete_bridge() {
        let switch = FakeSwitch::new();
        assert!(!switch.exec(&vsctl(&["br-exists", "br0"])).unwrap().success());

        switch.exec_or_throw(&vsctl(&["add-br", "br0"])).unwrap();
        assert!(switch.has_bridge("br0"));
        assert!(switch.exec(&vsctl(&["br-exists", "br0"])).unwrap().success());

        switch.exec_or_throw(&vsctl(&["del-br", "br0"])).unwrap();
        assert!(!switch.has_bridge("br0"));
        assert_eq!(switch.commands().len(), 4);
    }

    #[test]
    fn test_duplicate_add_fails() {
        let switch = FakeSwitch::new();
        switch.seed(SeedBridge::new("br0"));
        let result = switch.exec(&vsctl(&["add-br", "br0"])).unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("already exists"));
    }

    #[test]
    fn test_external_ids() {
        let switch = FakeSwitch::new();
        switch.seed(SeedBridge::new("br0").with_external_id("owner", "infra"));

        switch
            .exec_or_throw(&vsctl(&["br-set-external-id", "br0", "env", "prod"]))
            .unwrap();
        switch
            .exec_or_throw(&vsctl(&["br-set-external-id", "br0", "owner"]))
            .unwrap();

        let output = switch
            .exec_or_throw(&vsctl(&["br-get-external-id", "br0"]))
            .unwrap();
        assert_eq!(output, "env=prod");
    }

    #[test]
    fn test_other_config_format() {
        let switch = FakeSwitch::new();
        switch.seed(SeedBridge::new("br0").with_other_config("mac-aging-time", "300"));
        switch
            .exec_or_throw(&vsctl(&[
                "set",
                "Bridge",
                "br0",
                "other-config:mac-table-size=2048",
            ]))
            .unwrap();

        let output = switch
            .exec_or_throw(&vsctl(&["get", "Bridge", "br0", "other-config"]))
            .unwrap();
        assert_eq!(output, "{mac-aging-time=\"300\", mac-table-size=\"2048\"}");

        let empty = FakeSwitch::new();
        empty.seed(SeedBridge::new("br1"));
        let output = empty
            .exec_or_throw(&vsctl(&["get", "Bridge", "br1", "other-config"]))
            .unwrap();
        assert_eq!(output, "{}");
    }

    #[test]
    fn test_other_config_escapes_quotes() {
        let switch = FakeSwitch::new();
        switch.seed(
            SeedBridge::new("br0")
                .with_other_config("note", "a\"b\\c")
                .with_other_config("mac-table-size", "8"),
        );
        let output = switch
            .exec_or_throw(&vsctl(&["get", "Bridge", "br0", "other-config"]))
            .unwrap();
        assert_eq!(output, r#"{mac-table-size="8", note="a\"b\\c"}"#);
    }

    #[test]
    fn test_ip_link_requires_device() {
        let switch = FakeSwitch::new();
        let cmd = CommandLine::new(IP_CMD).args(["link", "set", "dev", "br0", "up"]);
        assert_eq!(switch.exec(&cmd).unwrap().exit_code, 1);

        switch.seed(SeedBridge::new("br0"));
        switch.exec_or_throw(&cmd).unwrap();
        assert!(switch.bridge("br0").unwrap().link_up);
    }

    #[test]
    fn test_injections() {
        let switch = FakeSwitch::new();
        switch.fail_on("add-br", 1, "database connection failed");
        switch.respond_with("br-get-external-id", "garbage");
        switch.fail_to_spawn("del-br");

        assert_eq!(switch.exec(&vsctl(&["add-br", "br0"])).unwrap().exit_code, 1);
        assert!(!switch.has_bridge("br0"));
        assert_eq!(
            switch
                .exec(&vsctl(&["br-get-external-id", "br0"]))
                .unwrap()
                .stdout,
            "garbage"
        );
        assert!(switch.exec(&vsctl(&["del-br", "br0"])).is_err());

        switch.clear_injections();
        assert!(switch.exec(&vsctl(&["add-br", "br0"])).unwrap().success());
    }

    #[test]
    fn test_custom_binary_paths() {
        let switch = FakeSwitch::with_commands("/usr/bin/ovs-vsctl", "/sbin/ip");
        let default_name = switch.exec(&vsctl(&["add-br", "br0"])).unwrap();
        assert_eq!(default_name.exit_code, 127);

        let cmd = CommandLine::new("/usr/bin/ovs-vsctl").args(["add-br", "br0"]);
        assert!(switch.exec(&cmd).unwrap().success());
    }
}
