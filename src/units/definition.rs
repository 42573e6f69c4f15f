//! YAML/JSON definition format of a [`TemplateUnit`](super::TemplateUnit).
//!
//! ```yaml
//! name: ios_hostname
//! platform: cisco_ios
//! read: "show running-config | include ^hostname"
//! fields:
//!   - name: hostname
//!     pattern: '^hostname (?P<value>\S+)$'
//! templates:
//!   write: |-
//!     {if ($hostname is set)}hostname {$hostname}
//!     {endif}
//! ```

use serde::{Deserialize, Serialize};

use crate::model::Value;
use crate::planner::{ChangeStrategy, DeletePolicy, EntryPolicy, ListOrder, PreconditionSpec};
use crate::session::Platform;

/// How a captured string becomes a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Captured text as is
    #[default]
    String,
    /// Captured text parsed as a signed integer
    Integer,
    /// Captured text compared with `true_value` / `false_value`
    Boolean,
    /// `true` when the pattern matches, absent otherwise
    Presence,
    /// Every match, as a leaf-list of strings
    List,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::String => write!(f, "string"),
            FieldKind::Integer => write!(f, "integer"),
            FieldKind::Boolean => write!(f, "boolean"),
            FieldKind::Presence => write!(f, "presence"),
            FieldKind::List => write!(f, "list"),
        }
    }
}

/// One parsed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    /// Field name in the configuration node
    pub name: String,
    /// Line pattern, anchored by the author
    pub pattern: String,
    /// Conversion
    #[serde(default)]
    pub kind: FieldKind,
    /// Capture group holding the value (default `value`, else the first group)
    #[serde(default)]
    pub group: Option<String>,
    /// Text meaning `true` for boolean fields
    #[serde(default)]
    pub true_value: Option<String>,
    /// Text meaning `false` for boolean fields
    #[serde(default)]
    pub false_value: Option<String>,
    /// Value used when the pattern does not match
    #[serde(default)]
    pub default: Option<Value>,
}

/// A keyed list parsed from indented blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListSpec {
    /// Field name of the list
    pub name: String,
    /// Identity field of each entry
    pub key: String,
    /// Conversion of the identity value
    #[serde(default)]
    pub key_kind: FieldKind,
    /// Pattern of an entry's header line; its value group is the key
    pub header: String,
    /// Fields parsed from an entry's body
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Whether entry order is behavioral
    #[serde(default)]
    pub order: ListOrder,
    /// How changed entries are updated
    #[serde(default, alias = "entry")]
    pub entry_policy: EntryPolicy,
}

/// Command templates by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSpec {
    /// Create (and update, unless `update` is given)
    pub write: String,
    /// Update
    #[serde(default)]
    pub update: Option<String>,
    /// One-shot delete
    #[serde(default)]
    pub delete: Option<String>,
}

/// Planner policy section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicySpec {
    pub change: ChangeStrategy,
    pub delete: DeletePolicy,
}

/// A complete unit definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitDefinition {
    /// Registry name
    pub name: String,
    /// Device dialect
    #[serde(default)]
    pub platform: Platform,
    /// One-line summary
    #[serde(default)]
    pub description: String,
    /// Fields identifying one instance (copied into parsed nodes)
    #[serde(default)]
    pub identity: Vec<String>,
    /// Template of the show command, rendered against the identity
    pub read: String,
    /// Template of the block header enclosing the instance
    #[serde(default)]
    pub block: Option<String>,
    /// Scalar fields
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Keyed lists
    #[serde(default)]
    pub lists: Vec<ListSpec>,
    /// Command templates
    pub templates: TemplateSpec,
    /// Context lines wrapped around write/update output
    #[serde(default)]
    pub parents: Vec<String>,
    /// Line leaving one parent context (platform default when absent)
    #[serde(default)]
    pub exit: Option<String>,
    /// Planner policy
    #[serde(default)]
    pub policy: PolicySpec,
    /// Invariants checked before planning
    #[serde(default)]
    pub preconditions: Vec<PreconditionSpec>,
}

impl UnitDefinition {
    /// Parse a YAML definition.
    pub fn from_yaml(text: &str) -> crate::error::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse a JSON definition.
    pub fn from_json(text: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_definition() {
        let def = UnitDefinition::from_yaml(
            r#"
name: ios_hostname
read: show running-config
fields:
  - name: hostname
    pattern: '^hostname (?P<value>\S+)$'
templates:
  write: "hostname {$hostname}"
"#,
        )
        .unwrap();
        assert_eq!(def.platform, Platform::CiscoIos);
        assert_eq!(def.fields[0].kind, FieldKind::String);
        assert_eq!(def.policy, PolicySpec::default());
        assert!(def.templates.delete.is_none());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = UnitDefinition::from_yaml(
            "name: x\nread: show\ntemplates:\n  write: x\nwritten: oops\n",
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_list_and_policy() {
        let def = UnitDefinition::from_yaml(
            r#"
name: ptp
platform: casa_cer
read: show running-config
lists:
  - name: ports
    key: index
    key_kind: integer
    header: '^port (?P<value>\d+)$'
    entry_policy: recreate
policy:
  change: negate_then_set
  delete: per_field
preconditions:
  - kind: immutable
    field: index
templates:
  write: ""
"#,
        )
        .unwrap();
        assert_eq!(def.lists[0].entry_policy, EntryPolicy::Recreate);
        assert_eq!(def.policy.change, ChangeStrategy::NegateThenSet);
        assert_eq!(def.policy.delete, DeletePolicy::PerField);
        assert_eq!(def.preconditions.len(), 1);
    }
}
