//! Diff to render bindings, one context per pass.

use crate::model::{ConfigNode, Value};
use crate::template::{Binding, RenderContext};

use super::diff::{EntryDiff, FieldDiff, ListDiff, NodeDiff};
use super::Phase;

/// Bindings for creating `node`: every field `Set`.
pub(crate) fn create(node: &ConfigNode) -> RenderContext {
    node.iter()
        .map(|(name, value)| (name.clone(), set_binding(value)))
        .collect()
}

/// Bindings for deleting `node`: every field `Clear`. A nested node is
/// cleared as a whole.
pub(crate) fn delete(node: &ConfigNode) -> RenderContext {
    node.iter()
        .map(|(name, value)| (name.clone(), clear_binding(value)))
        .collect()
}

/// Bindings for an update pass.
pub(crate) fn update(diff: &NodeDiff, phase: Phase) -> RenderContext {
    diff.iter()
        .map(|(name, field)| (name.clone(), field_binding(field, phase)))
        .collect()
}

/// Nested nodes become scopes so keyed lists inside them bind the same way
/// on create as on update.
fn set_binding(value: &Value) -> Binding {
    match value {
        Value::Keyed(list) => list_scope(&[], list.entries(), list.key()),
        Value::Node(node) => Binding::Scope(create(node)),
        other => Binding::Set(other.clone()),
    }
}

fn clear_binding(value: &Value) -> Binding {
    match value {
        Value::Keyed(list) => list_scope(list.entries(), &[], list.key()),
        _ => Binding::Clear,
    }
}

fn field_binding(field: &FieldDiff, phase: Phase) -> Binding {
    match field {
        FieldDiff::Unchanged(_) => Binding::Unset,
        FieldDiff::Added(v) => match phase {
            Phase::Negate => Binding::Unset,
            Phase::Apply | Phase::All => set_binding(v),
        },
        FieldDiff::Removed(v) => match phase {
            Phase::Apply => Binding::Unset,
            Phase::Negate | Phase::All => clear_binding(v),
        },
        FieldDiff::Modified { after, .. } => match phase {
            Phase::Negate => Binding::Clear,
            Phase::Apply | Phase::All => set_binding(after),
        },
        FieldDiff::Nested(diff) => Binding::Scope(update(diff, phase)),
        FieldDiff::List(list) => list_binding(list, phase),
    }
}

/// True when the pass for `phase` would bind anything but `Unset`.
pub(crate) fn has_effect(diff: &NodeDiff, phase: Phase) -> bool {
    diff.iter().any(|(_, field)| field_has_effect(field, phase))
}

fn field_has_effect(field: &FieldDiff, phase: Phase) -> bool {
    match field {
        FieldDiff::Unchanged(_) => false,
        FieldDiff::Added(_) => phase != Phase::Negate,
        FieldDiff::Removed(_) => phase != Phase::Apply,
        FieldDiff::Modified { .. } => true,
        FieldDiff::Nested(diff) => has_effect(diff, phase),
        FieldDiff::List(list) => list_has_effect(list, phase),
    }
}

fn list_has_effect(list: &ListDiff, phase: Phase) -> bool {
    let removals = phase != Phase::Apply && !list.removed.is_empty();
    let additions = phase != Phase::Negate && !list.added.is_empty();
    removals || additions || list.changed.iter().any(|c| has_effect(&c.diff, phase))
}

fn list_binding(list: &ListDiff, phase: Phase) -> Binding {
    let removed: &[ConfigNode] = if phase == Phase::Apply { &[] } else { &list.removed };
    let added: &[ConfigNode] = if phase == Phase::Negate { &[] } else { &list.added };
    let changed: Vec<&EntryDiff> = list
        .changed
        .iter()
        .filter(|c| has_effect(&c.diff, phase))
        .collect();

    let mut removed_seq = Vec::new();
    for entry in removed {
        removed_seq.push(entry_scope(
            "remove",
            entry_key(entry, &list.key),
            Some(entry),
            None,
            delete(entry),
        ));
    }
    let mut added_seq = Vec::new();
    let mut changed_seq = Vec::new();
    let mut entries: Vec<Binding> = removed_seq.clone();
    for key in &list.order {
        if let Some(entry) = added.iter().find(|e| e.get(&list.key) == Some(key)) {
            let scope = entry_scope("add", key.clone(), None, Some(entry), create(entry));
            added_seq.push(scope.clone());
            entries.push(scope);
        } else if let Some(change) = changed.iter().find(|c| &c.key == key) {
            let scope = entry_scope(
                "change",
                key.clone(),
                Some(&change.before),
                Some(&change.after),
                update(&change.diff, phase),
            );
            changed_seq.push(scope.clone());
            entries.push(scope);
        }
    }

    Binding::Scope(
        RenderContext::new()
            .with("removed", removed_seq)
            .with("added", added_seq)
            .with("changed", changed_seq)
            .with("entries", entries)
            .with("rewritten", list.rewritten),
    )
}

/// Scope for a whole list being created or deleted.
fn list_scope(removed: &[ConfigNode], added: &[ConfigNode], key: &str) -> Binding {
    let removed_seq: Vec<Binding> = removed
        .iter()
        .map(|e| entry_scope("remove", entry_key(e, key), Some(e), None, delete(e)))
        .collect();
    let added_seq: Vec<Binding> = added
        .iter()
        .map(|e| entry_scope("add", entry_key(e, key), None, Some(e), create(e)))
        .collect();
    let mut entries = removed_seq.clone();
    entries.extend(added_seq.iter().cloned());
    Binding::Scope(
        RenderContext::new()
            .with("removed", removed_seq)
            .with("added", added_seq)
            .with("changed", Vec::<Binding>::new())
            .with("entries", entries)
            .with("rewritten", false),
    )
}

fn entry_key(entry: &ConfigNode, key: &str) -> Value {
    entry.get(key).cloned().unwrap_or(Value::Str(String::new()))
}

fn entry_scope(
    op: &str,
    key: Value,
    before: Option<&ConfigNode>,
    after: Option<&ConfigNode>,
    fields: RenderContext,
) -> Binding {
    let mut scope = fields;
    scope.bind("key", key);
    scope.bind("op", op);
    scope.bind("before", node_binding(before));
    scope.bind("after", node_binding(after));
    scope.bind("this", node_binding(after.or(before)));
    Binding::Scope(scope)
}

pub(crate) fn node_binding(node: Option<&ConfigNode>) -> Binding {
    node.map_or(Binding::Unset, |n| Binding::Set(Value::Node(n.clone())))
}
