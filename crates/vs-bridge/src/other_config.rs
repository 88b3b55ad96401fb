//! other-config parsing and the mac-table-size property
//!
//! `ovs-vsctl get Bridge <br> other-config` prints an OVSDB map such as
//! `{mac-aging-time="300", mac-table-size="2048"}`. Only `mac-table-size` is
//! managed; it is written back with a single-key `set` so the rest of the
//! column is never touched.

use std::collections::BTreeMap;

use tracing::{info, instrument};
use vswitch_common::{ProviderError, ProviderResult};

use crate::bridge::OvsBridge;
use crate::commands::MAC_TABLE_SIZE_KEY;

/// Byte offset of each unquoted `sep` in `s`
///
/// Inside double quotes a backslash escapes the next character, so `\"`
/// neither closes the string nor counts as a separator.
fn unquoted_positions(s: &str, sep: char) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut in_quotes = false;
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if in_quotes => {
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => positions.push(i),
            _ => {}
        }
    }
    positions
}

/// Split `s` on `sep`, ignoring separators inside double quotes
fn split_outside_quotes(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for i in unquoted_positions(s, sep) {
        parts.push(&s[start..i]);
        start = i + sep.len_utf8();
    }
    parts.push(&s[start..]);
    parts
}

/// Split on the first `=` that is not inside double quotes
fn split_pair(fragment: &str) -> Option<(&str, &str)> {
    unquoted_positions(fragment, '=')
        .first()
        .map(|&i| (&fragment[..i], &fragment[i + 1..]))
}

/// Strip one wrapping pair of double quotes and undo `\"` and `\\` escapes
///
/// Bare tokens are returned as they are.
fn unquote(s: &str) -> String {
    let Some(inner) = s
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return s.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            c => out.push(c),
        }
    }
    out
}

/// Parse an OVSDB map column as printed by `ovs-vsctl get`
///
/// Strips the surrounding braces, splits on commas, trims each fragment and
/// splits it on the first `=`. Separators inside quoted strings are ignored.
/// Keys and values lose their wrapping quotes and escapes. A fragment without
/// `=` is a parse error.
pub fn parse_map_column(command: &str, output: &str) -> ProviderResult<BTreeMap<String, String>> {
    let trimmed = output.trim();
    let body = trimmed.strip_prefix('{').unwrap_or(trimmed);
    let body = body.strip_suffix('}').unwrap_or(body);

    let mut map = BTreeMap::new();
    for fragment in split_outside_quotes(body, ',')
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
    {
        let (key, value) = split_pair(fragment)
            .ok_or_else(|| ProviderError::parse(command, fragment, "missing '=' separator"))?;
        map.insert(unquote(key.trim()), unquote(value.trim()));
    }
    Ok(map)
}

/// Extract mac-table-size from a parsed other-config map
///
/// Absent key is `None`, not zero.
pub fn parse_mac_table_size(
    command: &str,
    other_config: &BTreeMap<String, String>,
) -> ProviderResult<Option<u32>> {
    other_config
        .get(MAC_TABLE_SIZE_KEY)
        .map(|raw| {
            raw.parse::<u32>().map_err(|e| {
                ProviderError::parse(
                    command,
                    raw.as_str(),
                    format!("{} is not a non-negative integer: {}", MAC_TABLE_SIZE_KEY, e),
                )
            })
        })
        .transpose()
}

impl OvsBridge {
    /// Get the bridge's whole other-config column
    pub fn other_config(&self, name: &str) -> ProviderResult<BTreeMap<String, String>> {
        let cmd = self.commands().get_other_config(name);
        let output = self.run(&cmd)?;
        parse_map_column(&cmd.to_string(), &output)
    }

    /// Get the bridge's MAC table limit, `None` when unset
    pub fn mac_table_size(&self, name: &str) -> ProviderResult<Option<u32>> {
        let other_config = self.other_config(name)?;
        parse_mac_table_size(
            &self.commands().get_other_config(name).to_string(),
            &other_config,
        )
    }

    /// Set the bridge's MAC table limit
    #[instrument(skip(self))]
    pub fn set_mac_table_size(&self, name: &str, size: u32) -> ProviderResult<()> {
        self.run(
            &self
                .commands()
                .set_other_config(name, MAC_TABLE_SIZE_KEY, &size.to_string()),
        )?;
        info!("Set {} on {} to {}", MAC_TABLE_SIZE_KEY, name, size);
        Ok(())
    }
}
