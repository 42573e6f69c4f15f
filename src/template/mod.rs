//! Command template rendering.
//!
//! Templates are plain CLI text with a small set of tags. Tags are only
//! recognized in the shapes below; any other `{` is literal text, so vendor
//! syntax that uses braces (Junos, for instance) needs no escaping.
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `{$a.b}` | stringified value, empty when unset or cleared |
//! | `{$seq\|join(", ")}` | scalar items joined with a separator |
//! | `{if (cond)}` `{else if (cond)}` `{else}` `{endif}` | conditional |
//! | `{loop in $seq as $item counter=$i,$n}` `{onEmpty}` `{endloop}` | repetition |
//!
//! Conditions: `$x` (truthy), `$x == "lit"`, `$x != 3`, `$x is set|clear|unset`,
//! `!`, `and`, `or`, parentheses. `and` binds tighter than `or`; `null`
//! equals only an unset or missing variable.
//!
//! Text, including newlines, is emitted verbatim, so identical inputs always
//! produce byte-identical output.
//!
//! ```
//! use cliconf::model::Tristate;
//! use cliconf::template::{render, RenderContext};
//!
//! let src = "{if ($shutdown)}shutdown\n{else if ($shutdown is clear)}no shutdown\n{endif}";
//! let ctx = RenderContext::new().with("shutdown", Tristate::<bool>::Clear);
//! assert_eq!(render("shutdown", src, &ctx).unwrap(), "no shutdown\n");
//! ```

mod context;
mod parse;
mod render;

pub use context::{Binding, RenderContext};

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::model::CommandLine;

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Arc<Vec<parse::Node>>,
}

impl Template {
    /// Parse `source`; structural errors are reported here, never at render
    /// time.
    pub fn compile(name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        let nodes = parse::parse(&name, source)?;
        Ok(Self {
            name,
            nodes: Arc::new(nodes),
        })
    }

    /// Template name used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Expand against `ctx`.
    pub fn render(&self, ctx: &RenderContext) -> Result<String> {
        let mut out = String::new();
        render::Renderer::new(&self.name, ctx).render(&self.nodes, &mut out)?;
        trace!(template = %self.name, bytes = out.len(), "rendered template");
        Ok(out)
    }

    /// Expand and split into commands.
    pub fn render_commands(&self, ctx: &RenderContext) -> Result<CommandLine> {
        self.render(ctx).map(|text| CommandLine::from_rendered(&text))
    }
}

/// Compile and render in one step.
pub fn render(name: &str, source: &str, ctx: &RenderContext) -> Result<String> {
    Template::compile(name, source)?.render(ctx)
}

/// Named collection of compiled templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: IndexMap<String, Template>,
}

impl TemplateSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and add a template under `name`.
    pub fn add(&mut self, name: impl Into<String>, source: &str) -> Result<()> {
        let name = name.into();
        let template = Template::compile(name.clone(), source)?;
        self.templates.insert(name, template);
        Ok(())
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, name: impl Into<String>, source: &str) -> Result<Self> {
        self.add(name, source)?;
        Ok(self)
    }

    /// Get a compiled template.
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Render the template called `name`.
    pub fn render(&self, name: &str, ctx: &RenderContext) -> Result<String> {
        self.get(name)
            .ok_or_else(|| Error::template_render(name, "no such template"))?
            .render(ctx)
    }

    /// Template names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfigNode, KeyedList, Tristate, Value};

    const SHUTDOWN: &str =
        "{if ($shutdown)}shutdown\n{else if ($shutdown is clear)}no shutdown\n{endif}";

    fn shutdown(binding: Binding) -> String {
        let ctx = RenderContext::new().with("shutdown", binding);
        render("shutdown", SHUTDOWN, &ctx).unwrap()
    }

    #[test]
    fn test_three_valued_rendering() {
        assert_eq!(shutdown(Binding::Unset), "");
        assert_eq!(shutdown(Binding::Clear), "no shutdown\n");
        assert_eq!(shutdown(Tristate::Set(true).into()), "shutdown\n");
        assert_eq!(shutdown(Tristate::Set(false).into()), "");
    }

    #[test]
    fn test_false_string_is_data() {
        let ctx = RenderContext::new().with("shutdown", "FALSE");
        assert_eq!(render("t", SHUTDOWN, &ctx).unwrap(), "shutdown\n");
    }

    #[test]
    fn test_substitution() {
        let ctx = RenderContext::new()
            .with("index", 12i64)
            .with("mac", "a870.5d28.b3c8")
            .with("adp", true)
            .with(
                "rpd",
                ConfigNode::new().with("ucam", 2).with("dcam", 11),
            );
        let out = render(
            "t",
            "rpd-index {$index}\nucam {$rpd.ucam} dcam {$rpd.dcam}\nmac-address {$mac} {$adp}{$missing}\n",
            &ctx,
        )
        .unwrap();
        assert_eq!(
            out,
            "rpd-index 12\nucam 2 dcam 11\nmac-address a870.5d28.b3c8 true\n"
        );
    }

    #[test]
    fn test_substituting_node_fails() {
        let ctx = RenderContext::new().with("rpd", ConfigNode::new().with("a", 1));
        let err = render("t", "{$rpd}", &ctx).unwrap_err();
        assert!(matches!(err, Error::TemplateRender { ref template, .. } if template == "t"));
    }

    #[test]
    fn test_join() {
        let ctx = RenderContext::new()
            .with("rts", Value::from(vec!["65000:1", "65000:2"]))
            .with(
                "mixed",
                vec![Binding::from("a"), Binding::Unset, Binding::Clear, Binding::from("b")],
            );
        let out = render("t", "{$rts|join(\" \")};{$mixed|join(,)}", &ctx).unwrap();
        assert_eq!(out, "65000:1 65000:2;a,b");
    }

    #[test]
    fn test_loop_with_counters_and_on_empty() {
        let src = "{loop in $ports as $p counter=$i,$n}{$i}/{$n}:{$p}\n{onEmpty}none\n{endloop}";
        let ctx = RenderContext::new().with("ports", Value::from(vec![5, 7]));
        assert_eq!(render("t", src, &ctx).unwrap(), "0/1:5\n1/2:7\n");

        let empty = RenderContext::new().with("ports", Binding::Unset);
        assert_eq!(render("t", src, &empty).unwrap(), "none\n");
    }

    #[test]
    fn test_loop_over_keyed_list() {
        let ports = KeyedList::new("index")
            .with_entry(ConfigNode::new().with("index", 1).with("prio", 5))
            .unwrap()
            .with_entry(ConfigNode::new().with("index", 2).with("prio", 6))
            .unwrap();
        let ctx = RenderContext::new().with("ports", Value::from(ports));
        let out = render(
            "t",
            "{loop in $ports as $p}ptp port {$p.index} priority {$p.prio}\n{endloop}",
            &ctx,
        )
        .unwrap();
        assert_eq!(out, "ptp port 1 priority 5\nptp port 2 priority 6\n");
    }

    #[test]
    fn test_undeclared_loop_source_fails() {
        let err = render("t", "{loop in $nothing as $x}{$x}{endloop}", &RenderContext::new())
            .unwrap_err();
        assert!(err.to_string().contains("not declared"));
    }

    #[test]
    fn test_nested_scopes_and_comparisons() {
        let neighbor = RenderContext::new()
            .with("address", "10.0.0.2")
            .with("asn", 65001i64)
            .with("password", Binding::Clear);
        let ctx = RenderContext::new()
            .with("neighbors", vec![Binding::Scope(neighbor)])
            .with("vrf", "default");
        let src = "{loop in $neighbors as $n}{if ($vrf == \"default\" and $n.asn != 65000)}neighbor {$n.address} remote-as {$n.asn}\n{endif}{if ($n.password is clear)}no neighbor {$n.address} password\n{endif}{if ($n.timers == null)}{else}x{endif}{endloop}";
        assert_eq!(
            render("t", src, &ctx).unwrap(),
            "neighbor 10.0.0.2 remote-as 65001\nno neighbor 10.0.0.2 password\n"
        );
    }

    #[test]
    fn test_deterministic_output() {
        let ctx = RenderContext::new().with("a", Value::from(vec!["x", "y", "z"]));
        let t = Template::compile("t", "{loop in $a as $v}{$v} {endloop}").unwrap();
        assert_eq!(t.render(&ctx).unwrap(), t.render(&ctx).unwrap());
    }

    #[test]
    fn test_template_set() {
        let set = TemplateSet::new()
            .with("write", "hostname {$name}\n")
            .unwrap();
        let ctx = RenderContext::new().with("name", "edge1");
        assert_eq!(set.render("write", &ctx).unwrap(), "hostname edge1\n");
        assert!(set.render("delete", &ctx).is_err());
    }
}
