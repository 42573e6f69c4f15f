//! Before/after diff to ordered render passes.
//!
//! [`Planner::plan`] compares two snapshots of one configuration subtree and
//! produces a [`Plan`]: the operation (create, update, delete), one or more
//! render passes whose contexts bind every field as `Set`, `Clear` or
//! `Unset`, and a flat list of [`Change`]s.
//!
//! Removals always come first: a negate pass precedes an apply pass, and list
//! scopes list removed entries before added ones.

mod bind;
mod diff;
mod precondition;

pub use diff::{EntryDiff, FieldDiff, ListDiff, NodeDiff};
pub use precondition::{CheckFn, Precondition, PreconditionSpec};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{CommandLine, ConfigNode, Value};
use crate::template::{RenderContext, Template};

/// Names every pass context binds; they take precedence over fields.
pub const CONTEXT_NAMES: &[&str] = &["before", "after", "this", "operation", "phase"];

/// Names every list entry scope binds; they take precedence over entry fields.
pub const ENTRY_NAMES: &[&str] = &["key", "op", "before", "after", "this"];

// ============================================================================
// Policy
// ============================================================================

/// How a changed field is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStrategy {
    /// Emit the new value only; the device overwrites.
    #[default]
    Overwrite,
    /// Negate the old value in one pass, then set the new one in another.
    NegateThenSet,
}

/// How a whole subtree is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// One removal line from the delete template.
    #[default]
    OneShot,
    /// Negate each field through the update template.
    PerField,
}

/// Whether entry order in a keyed list is behavioral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Order is irrelevant; reordering alone is no change.
    #[default]
    Unordered,
    /// Statement-ordered; an order change rewrites the list.
    Ordered,
}

/// How an entry whose sub-fields changed is updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPolicy {
    /// Diff sub-fields in place.
    #[default]
    Recursive,
    /// Remove the old entry and add the new one.
    Recreate,
}

/// Per-list policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListPolicy {
    /// Order handling
    pub order: ListOrder,
    /// Changed-entry handling
    #[serde(alias = "entry_policy")]
    pub entry: EntryPolicy,
}

impl ListPolicy {
    /// Ordered list with in-place entry updates.
    pub fn ordered() -> Self {
        Self {
            order: ListOrder::Ordered,
            entry: EntryPolicy::Recursive,
        }
    }

    /// Unordered list whose changed entries are recreated.
    pub fn recreate() -> Self {
        Self {
            order: ListOrder::Unordered,
            entry: EntryPolicy::Recreate,
        }
    }
}

/// Planning policy of one translation unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanPolicy {
    /// Changed-field strategy
    pub change: ChangeStrategy,
    /// Delete strategy
    pub delete: DeletePolicy,
    /// List policies by field name
    pub lists: IndexMap<String, ListPolicy>,
}

impl PlanPolicy {
    /// Set the change strategy.
    pub fn with_change(mut self, change: ChangeStrategy) -> Self {
        self.change = change;
        self
    }

    /// Set the delete policy.
    pub fn with_delete(mut self, delete: DeletePolicy) -> Self {
        self.delete = delete;
        self
    }

    /// Register the policy of the keyed list stored under `field`.
    pub fn with_list(mut self, field: impl Into<String>, policy: ListPolicy) -> Self {
        self.lists.insert(field.into(), policy);
        self
    }

    /// Policy of the keyed list stored under `field`.
    pub fn list(&self, field: &str) -> ListPolicy {
        self.lists.get(field).copied().unwrap_or_default()
    }
}

// ============================================================================
// Plan
// ============================================================================

/// What the plan does to the subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Subtree absent before
    Create,
    /// Subtree present on both sides
    Update,
    /// Subtree absent after
    Delete,
}

impl Operation {
    /// Lowercase name bound as `operation`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of the change a pass renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Removals and negations only
    Negate,
    /// Additions and new values only
    Apply,
    /// Everything in one pass
    All,
}

impl Phase {
    /// Lowercase name bound as `phase`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Negate => "negate",
            Phase::Apply => "apply",
            Phase::All => "all",
        }
    }
}

/// Template a plan renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateRole {
    /// Creation
    Write,
    /// Update, and per-field deletion
    Update,
    /// One-shot deletion
    Delete,
}

impl TemplateRole {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateRole::Write => "write",
            TemplateRole::Update => "update",
            TemplateRole::Delete => "delete",
        }
    }
}

impl fmt::Display for TemplateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One render of a template against a context.
#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    /// Phase rendered
    pub phase: Phase,
    /// Bindings
    pub context: RenderContext,
}

/// One entry of the flat change list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    /// Field newly set
    Set {
        /// Dotted path
        path: String,
        /// New value
        value: Value,
    },
    /// Field value changed
    Modify {
        /// Dotted path
        path: String,
        /// Old value
        before: Value,
        /// New value
        after: Value,
    },
    /// Field removed
    Clear {
        /// Dotted path
        path: String,
        /// Old value
        value: Value,
    },
    /// List entry added
    AddEntry {
        /// Path of the list
        path: String,
        /// Identity value
        key: Value,
    },
    /// List entry removed
    RemoveEntry {
        /// Path of the list
        path: String,
        /// Identity value
        key: Value,
    },
}

impl Change {
    /// True for clears and entry removals.
    pub fn is_removal(&self) -> bool {
        matches!(self, Change::Clear { .. } | Change::RemoveEntry { .. })
    }

    /// Path of the change.
    pub fn path(&self) -> &str {
        match self {
            Change::Set { path, .. }
            | Change::Modify { path, .. }
            | Change::Clear { path, .. }
            | Change::AddEntry { path, .. }
            | Change::RemoveEntry { path, .. } => path,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Set { path, value } => write!(f, "+ {} = {}", path, value),
            Change::Modify {
                path,
                before,
                after,
            } => write!(f, "~ {}: {} -> {}", path, before, after),
            Change::Clear { path, value } => write!(f, "- {} (was {})", path, value),
            Change::AddEntry { path, key } => write!(f, "+ {}[{}]", path, key),
            Change::RemoveEntry { path, key } => write!(f, "- {}[{}]", path, key),
        }
    }
}

/// Templates of one translation unit.
#[derive(Debug, Clone)]
pub struct PlanTemplates {
    unit: String,
    write: Template,
    update: Option<Template>,
    delete: Option<Template>,
}

impl PlanTemplates {
    /// Templates with only a write template; updates fall back to it.
    pub fn new(unit: impl Into<String>, write: Template) -> Self {
        Self {
            unit: unit.into(),
            write,
            update: None,
            delete: None,
        }
    }

    /// Add an update template.
    pub fn with_update(mut self, update: Template) -> Self {
        self.update = Some(update);
        self
    }

    /// Add a delete template.
    pub fn with_delete(mut self, delete: Template) -> Self {
        self.delete = Some(delete);
        self
    }

    /// Template for `role`.
    pub fn get(&self, role: TemplateRole) -> Result<&Template> {
        match role {
            TemplateRole::Write => Ok(&self.write),
            TemplateRole::Update => Ok(self.update.as_ref().unwrap_or(&self.write)),
            TemplateRole::Delete => self.delete.as_ref().ok_or_else(|| Error::MissingTemplate {
                unit: self.unit.clone(),
                role: role.to_string(),
            }),
        }
    }
}

/// Result of planning one subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    operation: Operation,
    delete: DeletePolicy,
    passes: Vec<Pass>,
    changes: Vec<Change>,
}

impl Plan {
    /// What the plan does.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Render passes in execution order.
    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Flat change list, removals first.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// True when there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Template to render the passes with.
    pub fn template_role(&self) -> TemplateRole {
        match (self.operation, self.delete) {
            (Operation::Create, _) => TemplateRole::Write,
            (Operation::Update, _) | (Operation::Delete, DeletePolicy::PerField) => {
                TemplateRole::Update
            }
            (Operation::Delete, DeletePolicy::OneShot) => TemplateRole::Delete,
        }
    }

    /// Render every pass and concatenate the text.
    pub fn render(&self, templates: &PlanTemplates) -> Result<String> {
        if self.is_empty() {
            return Ok(String::new());
        }
        let template = templates.get(self.template_role())?;
        let mut out = String::new();
        for pass in &self.passes {
            out.push_str(&template.render(&pass.context)?);
        }
        Ok(out)
    }

    /// Render and split into commands.
    pub fn render_commands(&self, templates: &PlanTemplates) -> Result<CommandLine> {
        self.render(templates).map(|text| CommandLine::from_rendered(&text))
    }
}

// ============================================================================
// Planner
// ============================================================================

/// Computes plans under one policy and a set of preconditions.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    policy: PlanPolicy,
    preconditions: Vec<Precondition>,
}

impl Planner {
    /// Planner with the given policy and no preconditions.
    pub fn new(policy: PlanPolicy) -> Self {
        Self {
            policy,
            preconditions: Vec::new(),
        }
    }

    /// Add a precondition.
    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    /// The policy in effect.
    pub fn policy(&self) -> &PlanPolicy {
        &self.policy
    }

    /// Plan the transition from `before` to `after`.
    pub fn plan(&self, before: Option<&ConfigNode>, after: Option<&ConfigNode>) -> Result<Plan> {
        for node in before.iter().chain(after.iter()) {
            node.validate().map_err(|e| match e {
                Error::InvalidData(message) => Error::precondition("unique-keys", message),
                other => other,
            })?;
        }
        for precondition in &self.preconditions {
            precondition.check(before, after)?;
        }

        let plan = match (before, after) {
            (None, None) => self.empty(Operation::Update),
            (None, Some(after)) => self.create(after),
            (Some(before), None) => self.delete(before),
            (Some(before), Some(after)) => self.update(before, after),
        };
        debug!(
            operation = %plan.operation,
            passes = plan.passes.len(),
            changes = plan.changes.len(),
            "planned configuration change"
        );
        Ok(plan)
    }

    fn empty(&self, operation: Operation) -> Plan {
        Plan {
            operation,
            delete: self.policy.delete,
            passes: Vec::new(),
            changes: Vec::new(),
        }
    }

    fn frame(
        operation: Operation,
        phase: Phase,
        before: Option<&ConfigNode>,
        after: Option<&ConfigNode>,
        fields: RenderContext,
    ) -> RenderContext {
        let mut ctx = fields;
        ctx.bind("before", bind::node_binding(before));
        ctx.bind("after", bind::node_binding(after));
        ctx.bind("this", bind::node_binding(after.or(before)));
        ctx.bind("operation", operation.as_str());
        ctx.bind("phase", phase.as_str());
        ctx
    }

    fn create(&self, after: &ConfigNode) -> Plan {
        let mut plan = self.empty(Operation::Create);
        let context = Self::frame(
            Operation::Create,
            Phase::Apply,
            None,
            Some(after),
            bind::create(after),
        );
        plan.passes.push(Pass {
            phase: Phase::Apply,
            context,
        });
        let mut changes = Changes::default();
        for (name, value) in after.iter() {
            changes.added(name, value);
        }
        plan.changes = changes.finish();
        plan
    }

    fn delete(&self, before: &ConfigNode) -> Plan {
        let mut plan = self.empty(Operation::Delete);
        let context = Self::frame(
            Operation::Delete,
            Phase::Negate,
            Some(before),
            None,
            bind::delete(before),
        );
        plan.passes.push(Pass {
            phase: Phase::Negate,
            context,
        });
        let mut changes = Changes::default();
        for (name, value) in before.iter() {
            changes.removed(name, value);
        }
        plan.changes = changes.finish();
        plan
    }

    fn update(&self, before: &ConfigNode, after: &ConfigNode) -> Plan {
        let mut plan = self.empty(Operation::Update);
        let diff = NodeDiff::compute(before, after, &self.policy);
        if diff.is_empty() {
            return plan;
        }

        let phases: &[Phase] = match self.policy.change {
            ChangeStrategy::Overwrite => &[Phase::All],
            ChangeStrategy::NegateThenSet => &[Phase::Negate, Phase::Apply],
        };
        for &phase in phases {
            if !bind::has_effect(&diff, phase) {
                continue;
            }
            let context = Self::frame(
                Operation::Update,
                phase,
                Some(before),
                Some(after),
                bind::update(&diff, phase),
            );
            plan.passes.push(Pass { phase, context });
        }

        let mut changes = Changes::default();
        changes.diff("", &diff);
        plan.changes = changes.finish();
        plan
    }
}

/// Accumulates changes, keeping removals ahead of everything else.
#[derive(Default)]
struct Changes {
    removals: Vec<Change>,
    others: Vec<Change>,
}

impl Changes {
    fn finish(mut self) -> Vec<Change> {
        self.removals.append(&mut self.others);
        self.removals
    }

    fn added(&mut self, path: &str, value: &Value) {
        match value {
            Value::Keyed(list) => {
                for entry in list.entries() {
                    if let Some(key) = list.key_of(entry) {
                        self.others.push(Change::AddEntry {
                            path: path.to_string(),
                            key: key.clone(),
                        });
                    }
                }
            }
            _ => self.others.push(Change::Set {
                path: path.to_string(),
                value: value.clone(),
            }),
        }
    }

    fn removed(&mut self, path: &str, value: &Value) {
        match value {
            Value::Keyed(list) => {
                for entry in list.entries() {
                    if let Some(key) = list.key_of(entry) {
                        self.removals.push(Change::RemoveEntry {
                            path: path.to_string(),
                            key: key.clone(),
                        });
                    }
                }
            }
            _ => self.removals.push(Change::Clear {
                path: path.to_string(),
                value: value.clone(),
            }),
        }
    }

    fn diff(&mut self, prefix: &str, diff: &NodeDiff) {
        for (name, field) in diff.iter() {
            let path = format!("{}{}", prefix, name);
            match field {
                FieldDiff::Unchanged(_) => {}
                FieldDiff::Added(v) => self.added(&path, v),
                FieldDiff::Removed(v) => self.removed(&path, v),
                FieldDiff::Modified { before, after } => self.others.push(Change::Modify {
                    path,
                    before: before.clone(),
                    after: after.clone(),
                }),
                FieldDiff::Nested(nested) => self.diff(&format!("{}.", path), nested),
                FieldDiff::List(list) => {
                    for entry in &list.removed {
                        if let Some(key) = list.key_of(entry) {
                            self.removals.push(Change::RemoveEntry {
                                path: path.clone(),
                                key: key.clone(),
                            });
                        }
                    }
                    for entry in &list.added {
                        if let Some(key) = list.key_of(entry) {
                            self.others.push(Change::AddEntry {
                                path: path.clone(),
                                key: key.clone(),
                            });
                        }
                    }
                    for changed in &list.changed {
                        self.diff(&format!("{}[{}].", path, changed.key), &changed.diff);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyedList;
    use pretty_assertions::assert_eq;

    fn templates(write: &str) -> PlanTemplates {
        PlanTemplates::new("test", Template::compile("write", write).unwrap())
    }

    #[test]
    fn test_create_binds_every_field_set() {
        let after = ConfigNode::new().with("mtu", 9000).with("shutdown", false);
        let plan = Planner::default().plan(None, Some(&after)).unwrap();
        assert_eq!(plan.operation(), Operation::Create);
        assert_eq!(plan.template_role(), TemplateRole::Write);
        let out = plan
            .render(&templates("{if ($mtu is set)}mtu {$mtu}\n{endif}{$operation}\n"))
            .unwrap();
        assert_eq!(out, "mtu 9000\ncreate\n");
    }

    #[test]
    fn test_identical_snapshots_plan_nothing() {
        let node = ConfigNode::new().with("mtu", 9000);
        let plan = Planner::default().plan(Some(&node), Some(&node)).unwrap();
        assert!(plan.is_empty());
        assert!(plan.changes().is_empty());
        assert_eq!(plan.render(&templates("mtu {$mtu}\n")).unwrap(), "");
    }

    #[test]
    fn test_negate_then_set_passes() {
        let before = ConfigNode::new().with("description", "old").with("mtu", 1500);
        let after = ConfigNode::new().with("description", "new");
        let planner = Planner::new(PlanPolicy::default().with_change(ChangeStrategy::NegateThenSet));
        let plan = planner.plan(Some(&before), Some(&after)).unwrap();
        let phases: Vec<Phase> = plan.passes().iter().map(|p| p.phase).collect();
        assert_eq!(phases, vec![Phase::Negate, Phase::Apply]);

        let out = plan
            .render(&templates(
                "{if ($description is clear)}no description\n{endif}{if ($description is set)}description {$description}\n{endif}{if ($mtu is clear)}no mtu\n{endif}",
            ))
            .unwrap();
        assert_eq!(out, "no description\nno mtu\ndescription new\n");
    }

    #[test]
    fn test_delete_policies() {
        let before = ConfigNode::new().with("name", "node1");
        let plan = Planner::default().plan(Some(&before), None).unwrap();
        assert_eq!(plan.template_role(), TemplateRole::Delete);
        let err = plan.render(&templates("x")).unwrap_err();
        assert!(matches!(err, Error::MissingTemplate { .. }));

        let planner = Planner::new(PlanPolicy::default().with_delete(DeletePolicy::PerField));
        let plan = planner.plan(Some(&before), None).unwrap();
        assert_eq!(plan.template_role(), TemplateRole::Update);
        let out = plan
            .render(&templates("{if ($name is clear)}no name {$before.name}\n{endif}"))
            .unwrap();
        assert_eq!(out, "no name node1\n");
    }

    #[test]
    fn test_changes_removals_first() {
        let ports = |keys: &[i64]| {
            KeyedList::from_entries(
                "index",
                keys.iter().map(|k| ConfigNode::new().with("index", *k)).collect(),
            )
            .unwrap()
        };
        let before = ConfigNode::new().with("a", 1).with("ports", ports(&[1, 2]));
        let after = ConfigNode::new().with("b", 2).with("ports", ports(&[2, 3]));
        let plan = Planner::default().plan(Some(&before), Some(&after)).unwrap();
        let text: Vec<String> = plan.changes().iter().map(ToString::to_string).collect();
        assert_eq!(
            text,
            vec!["- ports[1]", "- a (was 1)", "+ b = 2", "+ ports[3]"]
        );
    }

    #[test]
    fn test_precondition_blocks_plan() {
        let planner = Planner::default().with_precondition(Precondition::immutable("rpdIndex"));
        let a = ConfigNode::new().with("rpdIndex", 12);
        let b = ConfigNode::new().with("rpdIndex", 11);
        let err = planner.plan(Some(&a), Some(&b)).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
