//! Syntax tree evaluation.

use crate::error::{Error, Result};
use crate::model::{ConfigNode, Value};

use super::context::{Binding, RenderContext};
use super::parse::{Condition, Literal, Node, Path, State};

/// Result of resolving a dotted path.
enum Lookup<'a> {
    Missing,
    Unset,
    Clear,
    Value(&'a Value),
    Entry(&'a ConfigNode),
    Seq(&'a [Binding]),
    Scope(&'a RenderContext),
}

impl<'a> Lookup<'a> {
    fn of(binding: &'a Binding) -> Self {
        match binding {
            Binding::Unset => Lookup::Unset,
            Binding::Clear => Lookup::Clear,
            Binding::Set(v) => Lookup::Value(v),
            Binding::Seq(items) => Lookup::Seq(items),
            Binding::Scope(ctx) => Lookup::Scope(ctx),
        }
    }

    fn descend(self, segment: &str) -> Self {
        let index = segment.parse::<usize>().ok();
        match self {
            Lookup::Scope(ctx) => ctx.get(segment).map_or(Lookup::Missing, Lookup::of),
            Lookup::Seq(items) => index
                .and_then(|i| items.get(i))
                .map_or(Lookup::Missing, Lookup::of),
            Lookup::Value(Value::Node(node)) | Lookup::Entry(node) => {
                node.get(segment).map_or(Lookup::Missing, Lookup::Value)
            }
            Lookup::Value(Value::List(items)) => index
                .and_then(|i| items.get(i))
                .map_or(Lookup::Missing, Lookup::Value),
            Lookup::Value(Value::Keyed(list)) => index
                .and_then(|i| list.entries().get(i))
                .map_or(Lookup::Missing, Lookup::Entry),
            _ => Lookup::Missing,
        }
    }
}

pub(crate) struct Renderer<'a> {
    name: &'a str,
    root: &'a RenderContext,
    frames: Vec<RenderContext>,
}

impl<'a> Renderer<'a> {
    pub fn new(name: &'a str, root: &'a RenderContext) -> Self {
        Self {
            name,
            root,
            frames: Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::template_render(self.name, message)
    }

    fn declared(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.contains(name)) || self.root.contains(name)
    }

    fn lookup(&self, path: &Path) -> Lookup<'_> {
        let root = path.root();
        let binding = self
            .frames
            .iter()
            .rev()
            .find_map(|f| f.get(root))
            .or_else(|| self.root.get(root));
        let mut current = binding.map_or(Lookup::Missing, Lookup::of);
        for segment in path.segments.iter().skip(1) {
            current = current.descend(segment);
        }
        current
    }

    pub fn render(&mut self, nodes: &[Node], out: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Var { path, join } => {
                    let text = self.substitute(path, join.as_deref())?;
                    out.push_str(&text);
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = false;
                    for (cond, body) in branches {
                        if self.eval(cond) {
                            self.render(body, out)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        if let Some(body) = otherwise {
                            self.render(body, out)?;
                        }
                    }
                }
                Node::Loop {
                    source,
                    item,
                    index,
                    ordinal,
                    body,
                    on_empty,
                } => {
                    let items = self.sequence(source)?;
                    if items.is_empty() {
                        if let Some(body) = on_empty {
                            self.render(body, out)?;
                        }
                        continue;
                    }
                    for (i, element) in items.into_iter().enumerate() {
                        let mut frame = RenderContext::new().with(item.clone(), element);
                        if let Some(name) = index {
                            frame.bind(name.clone(), i as i64);
                        }
                        if let Some(name) = ordinal {
                            frame.bind(name.clone(), i as i64 + 1);
                        }
                        self.frames.push(frame);
                        let result = self.render(body, out);
                        self.frames.pop();
                        result?;
                    }
                }
            }
        }
        Ok(())
    }

    fn substitute(&self, path: &Path, join: Option<&str>) -> Result<String> {
        match (self.lookup(path), join) {
            (Lookup::Missing | Lookup::Unset | Lookup::Clear, _) => Ok(String::new()),
            (Lookup::Value(v), None) => v
                .as_scalar_string()
                .ok_or_else(|| self.error(format!("cannot substitute {} {}", v.kind(), path))),
            (Lookup::Value(Value::List(items)), Some(sep)) => {
                let parts = items
                    .iter()
                    .map(|v| {
                        v.as_scalar_string().ok_or_else(|| {
                            self.error(format!("cannot join {} item of {}", v.kind(), path))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(parts.join(sep))
            }
            (Lookup::Value(v), Some(_)) => v
                .as_scalar_string()
                .ok_or_else(|| self.error(format!("cannot join {} {}", v.kind(), path))),
            (Lookup::Seq(items), Some(sep)) => {
                let mut parts = Vec::new();
                for item in items {
                    match item {
                        Binding::Unset | Binding::Clear => {}
                        Binding::Set(v) => parts.push(v.as_scalar_string().ok_or_else(|| {
                            self.error(format!("cannot join {} item of {}", v.kind(), path))
                        })?),
                        _ => return Err(self.error(format!("cannot join nested item of {}", path))),
                    }
                }
                Ok(parts.join(sep))
            }
            (Lookup::Seq(_), None) => Err(self.error(format!("cannot substitute sequence {}", path))),
            (Lookup::Entry(_), _) => Err(self.error(format!("cannot substitute node {}", path))),
            (Lookup::Scope(_), _) => Err(self.error(format!("cannot substitute scope {}", path))),
        }
    }

    fn sequence(&self, path: &Path) -> Result<Vec<Binding>> {
        if !self.declared(path.root()) {
            return Err(self.error(format!(
                "loop source {} is not declared in context",
                path
            )));
        }
        match self.lookup(path) {
            Lookup::Missing | Lookup::Unset | Lookup::Clear => Ok(Vec::new()),
            Lookup::Seq(items) => Ok(items.to_vec()),
            Lookup::Value(Value::List(items)) => Ok(items.iter().cloned().map(Binding::Set).collect()),
            Lookup::Value(Value::Keyed(list)) => Ok(list
                .entries()
                .iter()
                .cloned()
                .map(|entry| Binding::Set(Value::Node(entry)))
                .collect()),
            Lookup::Value(v) => Err(self.error(format!(
                "loop source {} is a {}, not a sequence",
                path,
                v.kind()
            ))),
            Lookup::Scope(_) | Lookup::Entry(_) => Err(self.error(format!(
                "loop source {} is not a sequence",
                path
            ))),
        }
    }

    fn eval(&self, cond: &Condition) -> bool {
        match cond {
            Condition::Or(terms) => terms.iter().any(|t| self.eval(t)),
            Condition::And(terms) => terms.iter().all(|t| self.eval(t)),
            Condition::Not(inner) => !self.eval(inner),
            Condition::Truthy(path) => match self.lookup(path) {
                Lookup::Value(v) => v.is_truthy(),
                Lookup::Seq(items) => !items.is_empty(),
                Lookup::Scope(ctx) => !ctx.is_empty(),
                Lookup::Entry(node) => !node.is_empty(),
                Lookup::Missing | Lookup::Unset | Lookup::Clear => false,
            },
            Condition::Compare {
                path,
                equal,
                literal,
            } => compare(&self.lookup(path), literal) == *equal,
            Condition::Is { path, state } => {
                let found = self.lookup(path);
                match state {
                    State::Set => matches!(
                        found,
                        Lookup::Value(_) | Lookup::Entry(_) | Lookup::Seq(_) | Lookup::Scope(_)
                    ),
                    State::Clear => matches!(found, Lookup::Clear),
                    State::Unset => matches!(found, Lookup::Missing | Lookup::Unset),
                }
            }
        }
    }
}

fn compare(found: &Lookup<'_>, literal: &Literal) -> bool {
    match (found, literal) {
        (Lookup::Missing | Lookup::Unset, Literal::Null) => true,
        (_, Literal::Null) => false,
        (Lookup::Value(Value::Str(s)), Literal::Str(l)) => s == l,
        (Lookup::Value(Value::Int(i)), Literal::Int(l)) => i == l,
        (Lookup::Value(Value::Bool(b)), Literal::Bool(l)) => b == l,
        (Lookup::Value(v), lit) => match (v.as_scalar_string(), lit) {
            (Some(s), Literal::Str(l)) => &s == l,
            (Some(s), Literal::Int(l)) => s == l.to_string(),
            (Some(s), Literal::Bool(l)) => s == l.to_string(),
            _ => false,
        },
        _ => false,
    }
}
