//! Property-based tests for cliconf using proptest.
//!
//! Random configuration trees and random device output drive the planner,
//! the template renderer and the line parser, looking for panics and for
//! violations of the properties a configuration engine relies on.

use cliconf::model::{ConfigNode, KeyedList, Value};
use cliconf::parser::{self, FieldPattern};
use cliconf::planner::{Change, Planner};
use cliconf::template::{RenderContext, Template};
use cliconf::units::{TranslationUnit, UnitRegistry};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use std::collections::BTreeSet;

// ============================================================================
// Strategies for generating test data
// ============================================================================

/// Strategy for scalar leaf values
fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        (-10_000i64..10_000).prop_map(Value::Int),
        "[a-zA-Z0-9 .:/-]{0,24}".prop_map(Value::Str),
    ]
}

/// Strategy for field names that never collide with built-in unit fields
fn field_name() -> impl Strategy<Value = String> {
    "f_[a-z][a-zA-Z0-9]{0,10}"
}

/// Strategy for a keyed list with unique integer keys
fn keyed_list(keys: BTreeSet<i64>) -> KeyedList {
    let entries = keys
        .into_iter()
        .map(|k| ConfigNode::new().with("index", k).with("weight", k * 2))
        .collect();
    KeyedList::from_entries("index", entries).unwrap()
}

/// Strategy for configuration nodes, optionally carrying a keyed list
fn config_node() -> impl Strategy<Value = ConfigNode> {
    (
        vec((field_name(), scalar()), 0..8),
        proptest::option::of(btree_set(0i64..50, 0..6)),
    )
        .prop_map(|(fields, list)| {
            let mut node = ConfigNode::new();
            for (name, value) in fields {
                node = node.with(name, value);
            }
            if let Some(keys) = list {
                node = node.with("ports", keyed_list(keys));
            }
            node
        })
}

fn change_count(node: &ConfigNode) -> usize {
    node.iter()
        .map(|(_, value)| match value {
            Value::Keyed(list) => list.len(),
            _ => 1,
        })
        .sum()
}

// ============================================================================
// PLANNER PROPERTIES
// ============================================================================

mod planning {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: planning a node against itself yields nothing to do
        #[test]
        fn identical_snapshots_plan_nothing(node in config_node()) {
            let plan = Planner::default().plan(Some(&node), Some(&node)).unwrap();
            prop_assert!(plan.is_empty());
            prop_assert!(plan.changes().is_empty());
        }

        /// Property: identical snapshots render no commands through a unit
        #[test]
        fn identical_snapshots_render_nothing(node in config_node()) {
            let registry = UnitRegistry::with_builtins().unwrap();
            let unit = registry.get("cer_rpd").unwrap();
            let node = node.with("name", "node1");
            let commands = unit.render(Some(&node), Some(&node)).unwrap();
            prop_assert!(commands.is_empty());
        }

        /// Property: create and delete report one change per field or entry
        #[test]
        fn create_and_delete_are_symmetric(node in config_node()) {
            let planner = Planner::default();
            let created = planner.plan(None, Some(&node)).unwrap();
            let deleted = planner.plan(Some(&node), None).unwrap();
            prop_assert_eq!(created.changes().len(), change_count(&node));
            prop_assert_eq!(deleted.changes().len(), change_count(&node));
            prop_assert!(deleted.changes().iter().all(Change::is_removal));
        }

        /// Property: a keyed list diff touches exactly the keys that differ,
        /// removals first
        #[test]
        fn list_diff_touches_only_changed_keys(
            before in btree_set(0i64..40, 0..10),
            after in btree_set(0i64..40, 0..10),
        ) {
            let old = ConfigNode::new().with("ports", keyed_list(before.clone()));
            let new = ConfigNode::new().with("ports", keyed_list(after.clone()));
            let plan = Planner::default().plan(Some(&old), Some(&new)).unwrap();

            let removed: BTreeSet<i64> = before.difference(&after).copied().collect();
            let added: BTreeSet<i64> = after.difference(&before).copied().collect();
            let mut seen_addition = false;
            let mut got_removed = BTreeSet::new();
            let mut got_added = BTreeSet::new();
            for change in plan.changes() {
                match change {
                    Change::RemoveEntry { key, .. } => {
                        prop_assert!(!seen_addition, "removal after addition");
                        got_removed.insert(key.as_int().unwrap());
                    }
                    Change::AddEntry { key, .. } => {
                        seen_addition = true;
                        got_added.insert(key.as_int().unwrap());
                    }
                    other => prop_assert!(false, "unexpected change {}", other),
                }
            }
            prop_assert_eq!(got_removed, removed);
            prop_assert_eq!(got_added, added);
        }
    }
}

// ============================================================================
// TEMPLATE PROPERTIES
// ============================================================================

mod templating {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        /// Property: compiling arbitrary text never panics
        #[test]
        fn compiling_random_text_never_panics(source in "\\PC{0,200}") {
            let _ = Template::compile("random", &source);
        }

        /// Property: text without tags renders unchanged
        #[test]
        fn literal_text_renders_verbatim(source in "[a-zA-Z0-9 ;{}\\n-]{0,120}") {
            if let Ok(template) = Template::compile("literal", &source) {
                let out = template.render(&RenderContext::new()).unwrap();
                prop_assert_eq!(out, source);
            }
        }

        /// Property: rendering the same template and context twice is identical
        #[test]
        fn rendering_is_deterministic(node in config_node()) {
            let template = Template::compile(
                "ports",
                "{loop in $ports as $p counter=$i,$n}{$i}:{$p.index}/{$p.weight}\n{onEmpty}none\n{endloop}",
            )
            .unwrap();
            let ctx = RenderContext::from_node(&node);
            let first = template.render(&ctx);
            let second = template.render(&ctx);
            prop_assert_eq!(first.is_ok(), second.is_ok());
            if let (Ok(a), Ok(b)) = (first, second) {
                prop_assert_eq!(a, b);
            }
        }
    }
}

// ============================================================================
// PARSER PROPERTIES
// ============================================================================

mod parsing {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        /// Property: extraction on random output never panics
        #[test]
        fn extraction_never_panics(output in "\\PC{0,500}") {
            let value = FieldPattern::line(r"^\s*(?P<value>\S+) (\d+)$").unwrap();
            let header = FieldPattern::line(r"^(?P<value>\S+)$").unwrap();
            let _ = parser::parse_field(&output, &value);
            let _ = parser::parse_fields(&output, &value);
            let _ = parser::parse_records(&output, &value);
            let _ = parser::sections(&output, &header);
            let _ = parser::section(&output, "interface Gi0/1");
        }

        /// Property: every extracted value is a substring of the output
        #[test]
        fn extracted_values_come_from_output(lines in vec("[a-z]{1,8} [0-9]{1,4}", 0..20)) {
            let output = lines.join("\n");
            let pattern = FieldPattern::line(r"^(?P<value>[a-z]+) \d+$").unwrap();
            let values = parser::parse_fields(&output, &pattern);
            prop_assert_eq!(values.len(), lines.len());
            for value in values {
                prop_assert!(output.contains(&value));
            }
        }
    }
}
