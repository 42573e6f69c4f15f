//! Structural diff of two configuration snapshots.

use indexmap::IndexMap;

use crate::model::{ConfigNode, KeyedList, Value};

use super::{EntryPolicy, ListOrder, PlanPolicy};

/// How one field differs between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDiff {
    /// Same value on both sides
    Unchanged(Value),
    /// Only present after
    Added(Value),
    /// Only present before
    Removed(Value),
    /// Present on both sides with different scalar or leaf-list values
    Modified {
        /// Old value
        before: Value,
        /// New value
        after: Value,
    },
    /// Nested node with changes inside
    Nested(NodeDiff),
    /// Keyed list with entry changes
    List(ListDiff),
}

impl FieldDiff {
    /// True when nothing changed.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, FieldDiff::Unchanged(_))
    }
}

/// Field-by-field diff of one node.
///
/// Fields are ordered as in the new snapshot, followed by fields that only
/// exist in the old one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeDiff {
    fields: IndexMap<String, FieldDiff>,
}

impl NodeDiff {
    /// Diff two nodes under `policy`.
    pub fn compute(before: &ConfigNode, after: &ConfigNode, policy: &PlanPolicy) -> Self {
        let mut fields = IndexMap::new();
        for (name, new) in after.iter() {
            let diff = match before.get(name) {
                None => FieldDiff::Added(new.clone()),
                Some(old) => diff_values(name, old, new, policy),
            };
            fields.insert(name.clone(), diff);
        }
        for (name, old) in before.iter() {
            if !after.contains(name) {
                fields.insert(name.clone(), FieldDiff::Removed(old.clone()));
            }
        }
        Self { fields }
    }

    /// True when no field changed.
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(FieldDiff::is_unchanged)
    }

    /// Diff of one field.
    pub fn get(&self, name: &str) -> Option<&FieldDiff> {
        self.fields.get(name)
    }

    /// Field diffs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldDiff)> {
        self.fields.iter()
    }
}

fn diff_values(name: &str, old: &Value, new: &Value, policy: &PlanPolicy) -> FieldDiff {
    if old == new {
        return FieldDiff::Unchanged(new.clone());
    }
    match (old, new) {
        (Value::Node(b), Value::Node(a)) => {
            let diff = NodeDiff::compute(b, a, policy);
            if diff.is_empty() {
                FieldDiff::Unchanged(new.clone())
            } else {
                FieldDiff::Nested(diff)
            }
        }
        (Value::Keyed(b), Value::Keyed(a)) if b.key() == a.key() => {
            let list = ListDiff::compute(name, b, a, policy);
            if list.is_empty() {
                FieldDiff::Unchanged(new.clone())
            } else {
                FieldDiff::List(list)
            }
        }
        _ => FieldDiff::Modified {
            before: old.clone(),
            after: new.clone(),
        },
    }
}

/// An entry present on both sides whose fields changed.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDiff {
    /// Identity value
    pub key: Value,
    /// Old entry
    pub before: ConfigNode,
    /// New entry
    pub after: ConfigNode,
    /// Field diff of the entry
    pub diff: NodeDiff,
}

/// Keyed-list diff by identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ListDiff {
    /// Identity field name
    pub key: String,
    /// Entries to remove, in old order
    pub removed: Vec<ConfigNode>,
    /// Entries to add, in new order
    pub added: Vec<ConfigNode>,
    /// Entries changed in place, in new order
    pub changed: Vec<EntryDiff>,
    /// True when an ordered list was rewritten because its order changed
    pub rewritten: bool,
    /// Identity values of the new list, in order
    pub order: Vec<Value>,
}

impl ListDiff {
    /// Diff two keyed lists under the policy registered for `field`.
    pub fn compute(field: &str, before: &KeyedList, after: &KeyedList, policy: &PlanPolicy) -> Self {
        let list_policy = policy.list(field);
        let key = after.key().to_string();
        let order: Vec<Value> = after.keys().into_iter().cloned().collect();

        if list_policy.order == ListOrder::Ordered && order_changed(before, after) {
            return Self {
                key,
                removed: before.entries().to_vec(),
                added: after.entries().to_vec(),
                changed: Vec::new(),
                rewritten: true,
                order,
            };
        }

        let recreate = list_policy.entry == EntryPolicy::Recreate;
        let mut removed = Vec::new();
        for old in before.entries() {
            match before.key_of(old).and_then(|k| after.get(k)) {
                None => removed.push(old.clone()),
                Some(new) if recreate && !NodeDiff::compute(old, new, policy).is_empty() => {
                    removed.push(old.clone())
                }
                Some(_) => {}
            }
        }

        let mut added = Vec::new();
        let mut changed = Vec::new();
        for new in after.entries() {
            let Some(k) = after.key_of(new) else {
                continue;
            };
            let Some(old) = before.get(k) else {
                added.push(new.clone());
                continue;
            };
            // Entries equal up to unordered nested lists are unchanged
            let diff = NodeDiff::compute(old, new, policy);
            if diff.is_empty() {
                continue;
            }
            if recreate {
                added.push(new.clone());
            } else {
                changed.push(EntryDiff {
                    key: k.clone(),
                    before: old.clone(),
                    after: new.clone(),
                    diff,
                });
            }
        }

        Self {
            key,
            removed,
            added,
            changed,
            rewritten: false,
            order,
        }
    }

    /// True when the lists are equivalent under the policy.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.changed.is_empty()
    }

    /// Identity value of an entry of this list.
    pub fn key_of<'a>(&self, entry: &'a ConfigNode) -> Option<&'a Value> {
        entry.get(&self.key)
    }
}

/// True when keys common to both lists appear in a different relative order.
fn order_changed(before: &KeyedList, after: &KeyedList) -> bool {
    let old: Vec<&Value> = before
        .keys()
        .into_iter()
        .filter(|k| after.get(k).is_some())
        .collect();
    let new: Vec<&Value> = after
        .keys()
        .into_iter()
        .filter(|k| before.get(k).is_some())
        .collect();
    old != new
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ListPolicy;

    fn entry(index: i64, priority: i64) -> ConfigNode {
        ConfigNode::new()
            .with("index", index)
            .with("priority", priority)
    }

    fn list(entries: Vec<ConfigNode>) -> KeyedList {
        KeyedList::from_entries("index", entries).unwrap()
    }

    #[test]
    fn test_field_classification() {
        let before = ConfigNode::new().with("a", 1).with("b", 2).with("c", 3);
        let after = ConfigNode::new().with("a", 1).with("b", 5).with("d", 4);
        let diff = NodeDiff::compute(&before, &after, &PlanPolicy::default());
        assert!(matches!(diff.get("a"), Some(FieldDiff::Unchanged(_))));
        assert!(matches!(diff.get("b"), Some(FieldDiff::Modified { .. })));
        assert!(matches!(diff.get("c"), Some(FieldDiff::Removed(_))));
        assert!(matches!(diff.get("d"), Some(FieldDiff::Added(_))));
        let names: Vec<&String> = diff.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn test_unordered_reorder_is_unchanged() {
        let before = ConfigNode::new().with("ports", list(vec![entry(1, 5), entry(2, 6)]));
        let after = ConfigNode::new().with("ports", list(vec![entry(2, 6), entry(1, 5)]));
        assert!(NodeDiff::compute(&before, &after, &PlanPolicy::default()).is_empty());
    }

    #[test]
    fn test_ordered_reorder_rewrites() {
        let policy = PlanPolicy::default().with_list("ports", ListPolicy::ordered());
        let b = list(vec![entry(1, 5), entry(2, 6)]);
        let a = list(vec![entry(2, 6), entry(1, 5)]);
        let diff = ListDiff::compute("ports", &b, &a, &policy);
        assert!(diff.rewritten);
        assert_eq!(diff.removed.len(), 2);
        assert_eq!(diff.added.len(), 2);
    }

    #[test]
    fn test_nested_reorder_is_unchanged() {
        let subs = |keys: &[i64]| {
            KeyedList::from_entries(
                "id",
                keys.iter().map(|k| ConfigNode::new().with("id", *k)).collect(),
            )
            .unwrap()
        };
        let before = ConfigNode::new().with("cfg", ConfigNode::new().with("subs", subs(&[1, 2])));
        let after = ConfigNode::new().with("cfg", ConfigNode::new().with("subs", subs(&[2, 1])));
        let diff = NodeDiff::compute(&before, &after, &PlanPolicy::default());
        assert!(diff.is_empty());
        assert!(matches!(diff.get("cfg"), Some(FieldDiff::Unchanged(_))));

        let policy = PlanPolicy::default().with_list("ports", ListPolicy::recreate());
        let b = list(vec![entry(1, 5).with("subs", subs(&[1, 2]))]);
        let a = list(vec![entry(1, 5).with("subs", subs(&[2, 1]))]);
        assert!(ListDiff::compute("ports", &b, &a, &policy).is_empty());
    }

    #[test]
    fn test_recursive_and_recreate_entries() {
        let b = list(vec![entry(1, 5), entry(2, 6)]);
        let a = list(vec![entry(1, 7), entry(3, 1)]);

        let diff = ListDiff::compute("ports", &b, &a, &PlanPolicy::default());
        assert_eq!(diff.removed, vec![entry(2, 6)]);
        assert_eq!(diff.added, vec![entry(3, 1)]);
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].key, Value::Int(1));

        let policy = PlanPolicy::default().with_list("ports", ListPolicy::recreate());
        let diff = ListDiff::compute("ports", &b, &a, &policy);
        assert_eq!(diff.removed, vec![entry(1, 5), entry(2, 6)]);
        assert_eq!(diff.added, vec![entry(1, 7), entry(3, 1)]);
        assert!(diff.changed.is_empty());
    }
}
