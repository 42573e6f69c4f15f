//! Grammar invariants checked before a plan is produced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{ConfigNode, Value};

/// Signature of a custom check: `(before, after)` to an optional violation
/// message.
pub type CheckFn =
    dyn Fn(Option<&ConfigNode>, Option<&ConfigNode>) -> std::result::Result<(), String> + Send + Sync;

#[derive(Clone)]
enum Check {
    Requires { field: String, dependency: String },
    Immutable { field: String },
    Custom(Arc<CheckFn>),
}

/// A named invariant, optionally scoped to the entries of a keyed list.
#[derive(Clone)]
pub struct Precondition {
    name: String,
    scope: Option<String>,
    check: Check,
}

impl Precondition {
    /// `field` may only be present when `dependency` is present too.
    pub fn requires(field: impl Into<String>, dependency: impl Into<String>) -> Self {
        let field = field.into();
        let dependency = dependency.into();
        Self {
            name: format!("{}-requires-{}", field, dependency),
            scope: None,
            check: Check::Requires { field, dependency },
        }
    }

    /// `field` cannot change once the node exists.
    pub fn immutable(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: format!("{}-immutable", field),
            scope: None,
            check: Check::Immutable { field },
        }
    }

    /// Arbitrary check over the before/after pair.
    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(Option<&ConfigNode>, Option<&ConfigNode>) -> std::result::Result<(), String>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            scope: None,
            check: Check::Custom(Arc::new(check)),
        }
    }

    /// Apply the check to each entry of the keyed list `list` instead of the
    /// node itself; entries are paired by identity.
    pub fn within(mut self, list: impl Into<String>) -> Self {
        self.scope = Some(list.into());
        self
    }

    /// Invariant name reported on violation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate a before/after pair.
    pub fn check(&self, before: Option<&ConfigNode>, after: Option<&ConfigNode>) -> Result<()> {
        match &self.scope {
            None => self.check_pair(before, after, ""),
            Some(list) => {
                let old = before.and_then(|n| n.get(list)).and_then(Value::as_keyed);
                let new = after.and_then(|n| n.get(list)).and_then(Value::as_keyed);
                if let Some(new) = new {
                    for entry in new.entries() {
                        let key = new.key_of(entry);
                        let prior = old.zip(key).and_then(|(o, k)| o.get(k));
                        let label = key.map(|k| format!("{}[{}]: ", list, k)).unwrap_or_default();
                        self.check_pair(prior, Some(entry), &label)?;
                    }
                }
                if let Some(old) = old {
                    for entry in old.entries() {
                        let key = old.key_of(entry);
                        let gone = match (new, key) {
                            (Some(n), Some(k)) => n.get(k).is_none(),
                            _ => true,
                        };
                        if gone {
                            let label = key.map(|k| format!("{}[{}]: ", list, k)).unwrap_or_default();
                            self.check_pair(Some(entry), None, &label)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn check_pair(&self, before: Option<&ConfigNode>, after: Option<&ConfigNode>, label: &str) -> Result<()> {
        let violation = match &self.check {
            Check::Requires { field, dependency } => match after {
                Some(node) if node.contains(field) && !node.contains(dependency) => Some(format!(
                    "'{}' is set but '{}' is not",
                    field, dependency
                )),
                _ => None,
            },
            Check::Immutable { field } => match (before, after) {
                (Some(b), Some(a)) if b.get(field) != a.get(field) => Some(format!(
                    "'{}' cannot change from {} to {}",
                    field,
                    display(b.get(field)),
                    display(a.get(field))
                )),
                _ => None,
            },
            Check::Custom(f) => f(before, after).err(),
        };
        match violation {
            Some(message) => Err(Error::precondition(&self.name, format!("{}{}", label, message))),
            None => Ok(()),
        }
    }
}

fn display(value: Option<&Value>) -> String {
    value.map_or_else(|| "<absent>".to_string(), ToString::to_string)
}

impl fmt::Debug for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Precondition")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Serializable form of the built-in preconditions, used by unit
/// definition files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreconditionSpec {
    /// See [`Precondition::requires`]
    Requires {
        /// Dependent field
        field: String,
        /// Field it depends on
        dependency: String,
        /// Optional keyed list scope
        #[serde(default)]
        within: Option<String>,
    },
    /// See [`Precondition::immutable`]
    Immutable {
        /// Field that cannot change
        field: String,
        /// Optional keyed list scope
        #[serde(default)]
        within: Option<String>,
    },
}

impl From<&PreconditionSpec> for Precondition {
    fn from(spec: &PreconditionSpec) -> Self {
        let (p, within) = match spec {
            PreconditionSpec::Requires {
                field,
                dependency,
                within,
            } => (Precondition::requires(field.clone(), dependency.clone()), within),
            PreconditionSpec::Immutable { field, within } => {
                (Precondition::immutable(field.clone()), within)
            }
        };
        match within {
            Some(list) => p.within(list.clone()),
            None => p,
        }
    }
}
