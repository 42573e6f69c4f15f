//! In-memory configuration data model.
//!
//! - [`ConfigNode`]: one configuration subtree (a BGP neighbor, an RPD, an
//!   interface), an insertion-ordered mapping from field name to [`Value`]
//! - [`KeyedList`]: an ordered list of nodes identified by one key field
//! - [`Tristate`]: explicit unset / clear / set
//! - [`CommandLine`]: the literal command sequence of one device exchange
//!
//! Nodes are built with consuming builder methods and are never mutated once
//! handed to the planner.

mod value;

pub use value::{Tristate, Value};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

// ============================================================================
// ConfigNode
// ============================================================================

/// A named, ordered mapping from field name to value.
///
/// Field order is preserved for display and iteration; equality ignores it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigNode {
    fields: IndexMap<String, Value>,
}

impl ConfigNode {
    /// Create an empty node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this node with `name` set to `value`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Return a copy of this node with `name` set when `value` is `Some`.
    pub fn with_opt<V: Into<Value>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(name, v),
            None => self,
        }
    }

    /// Return a copy of this node without `name`.
    pub fn without(mut self, name: &str) -> Self {
        self.fields.shift_remove(name);
        self
    }

    /// Look up a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up a dotted path through nested nodes (`a.b.c`).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_node()?.get(segment)?;
        }
        Some(current)
    }

    /// True when the field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Field names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the node has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge `other` into a copy of this node; fields of `other` win.
    pub fn merged(mut self, other: &ConfigNode) -> Self {
        for (name, value) in other.iter() {
            self.fields.insert(name.clone(), value.clone());
        }
        self
    }

    /// Check the keyed-list invariants of this node and every nested node.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in &self.fields {
            match value {
                Value::Keyed(list) => {
                    list.validate().map_err(|e| match e {
                        Error::InvalidData(msg) => {
                            Error::InvalidData(format!("field '{}': {}", name, msg))
                        }
                        other => other,
                    })?;
                    for entry in list.entries() {
                        entry.validate()?;
                    }
                }
                Value::Node(node) => node.validate()?,
                _ => {}
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, Value)> for ConfigNode {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// KeyedList
// ============================================================================

/// Ordered list of nodes identified by the value of one key field.
///
/// Invariant: every entry carries the key field and key values are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawKeyedList", into = "RawKeyedList")]
pub struct KeyedList {
    key: String,
    entries: Vec<ConfigNode>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKeyedList {
    #[serde(rename = "$key")]
    key: String,
    #[serde(default)]
    entries: Vec<ConfigNode>,
}

impl TryFrom<RawKeyedList> for KeyedList {
    type Error = Error;

    fn try_from(raw: RawKeyedList) -> Result<Self> {
        let list = KeyedList {
            key: raw.key,
            entries: raw.entries,
        };
        list.validate()?;
        Ok(list)
    }
}

impl From<KeyedList> for RawKeyedList {
    fn from(list: KeyedList) -> Self {
        RawKeyedList {
            key: list.key,
            entries: list.entries,
        }
    }
}

impl KeyedList {
    /// Create an empty list keyed by `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entries: Vec::new(),
        }
    }

    /// Return a copy of this list with `entry` appended.
    ///
    /// Fails when the entry lacks the key field or duplicates an existing key.
    pub fn with_entry(mut self, entry: ConfigNode) -> Result<Self> {
        let key = entry.get(&self.key).ok_or_else(|| {
            Error::InvalidData(format!("entry is missing key field '{}'", self.key))
        })?;
        if self.get(key).is_some() {
            return Err(Error::InvalidData(format!(
                "duplicate key {}={}",
                self.key, key
            )));
        }
        self.entries.push(entry);
        Ok(self)
    }

    /// Build a list from entries, validating the key invariants.
    pub fn from_entries(key: impl Into<String>, entries: Vec<ConfigNode>) -> Result<Self> {
        let list = Self {
            key: key.into(),
            entries,
        };
        list.validate()?;
        Ok(list)
    }

    /// Name of the identity field.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Entries in declared order.
    pub fn entries(&self) -> &[ConfigNode] {
        &self.entries
    }

    /// Identity value of an entry.
    pub fn key_of<'a>(&self, entry: &'a ConfigNode) -> Option<&'a Value> {
        entry.get(&self.key)
    }

    /// Entry with the given identity value.
    pub fn get(&self, key: &Value) -> Option<&ConfigNode> {
        self.entries.iter().find(|e| e.get(&self.key) == Some(key))
    }

    /// Identity values in declared order.
    pub fn keys(&self) -> Vec<&Value> {
        self.entries
            .iter()
            .filter_map(|e| e.get(&self.key))
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every entry has a unique key.
    pub fn validate(&self) -> Result<()> {
        let mut seen: Vec<&Value> = Vec::with_capacity(self.entries.len());
        for (i, entry) in self.entries.iter().enumerate() {
            let key = entry.get(&self.key).ok_or_else(|| {
                Error::InvalidData(format!(
                    "entry #{} is missing key field '{}'",
                    i, self.key
                ))
            })?;
            if seen.contains(&key) {
                return Err(Error::InvalidData(format!(
                    "duplicate key {}={}",
                    self.key, key
                )));
            }
            seen.push(key);
        }
        Ok(())
    }
}

// ============================================================================
// CommandLine
// ============================================================================

/// Ordered literal command strings for one exchange with a device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandLine {
    commands: Vec<String>,
}

impl CommandLine {
    /// Create from individual commands.
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    /// Split rendered template text into commands, one per non-blank line.
    ///
    /// Leading indentation is kept; trailing whitespace and `\r` are dropped.
    pub fn from_rendered(text: &str) -> Self {
        Self {
            commands: text
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.trim().is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// Commands in order.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Iterate over the commands.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(String::as_str)
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True when there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Return a copy with `other` appended.
    pub fn concat(mut self, other: CommandLine) -> Self {
        self.commands.extend(other.commands);
        self
    }

    /// Newline-terminated text form.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for command in &self.commands {
            text.push_str(command);
            text.push('\n');
        }
        text
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl<S: Into<String>> FromIterator<S> for CommandLine {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
