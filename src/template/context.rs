//! Named bindings a template is rendered against.

use indexmap::IndexMap;

use crate::model::{ConfigNode, Tristate, Value};

/// What a template variable is bound to.
///
/// `Unset` and `Clear` are distinct: a template can test `$x is clear` to
/// emit a negation, while an unset variable emits nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Binding {
    /// Leave unspecified
    #[default]
    Unset,
    /// Explicitly clear/negate
    Clear,
    /// Bound to a value
    Set(Value),
    /// Sequence of bindings (loop source)
    Seq(Vec<Binding>),
    /// Nested scope, addressed with dotted paths
    Scope(RenderContext),
}

impl Binding {
    /// True for anything other than `Unset`.
    pub fn is_present(&self) -> bool {
        !matches!(self, Binding::Unset)
    }

    /// The bound value, if this is `Set`.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Binding::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Set(value)
    }
}

impl<T: Into<Value>> From<Tristate<T>> for Binding {
    fn from(t: Tristate<T>) -> Self {
        match t {
            Tristate::Unset => Binding::Unset,
            Tristate::Clear => Binding::Clear,
            Tristate::Set(v) => Binding::Set(v.into()),
        }
    }
}

impl From<RenderContext> for Binding {
    fn from(ctx: RenderContext) -> Self {
        Binding::Scope(ctx)
    }
}

impl From<Vec<Binding>> for Binding {
    fn from(items: Vec<Binding>) -> Self {
        Binding::Seq(items)
    }
}

impl From<ConfigNode> for Binding {
    fn from(node: ConfigNode) -> Self {
        Binding::Set(Value::Node(node))
    }
}

impl From<bool> for Binding {
    fn from(b: bool) -> Self {
        Binding::Set(Value::Bool(b))
    }
}

impl From<i64> for Binding {
    fn from(i: i64) -> Self {
        Binding::Set(Value::Int(i))
    }
}

impl From<&str> for Binding {
    fn from(s: &str) -> Self {
        Binding::Set(Value::from(s))
    }
}

impl From<String> for Binding {
    fn from(s: String) -> Self {
        Binding::Set(Value::Str(s))
    }
}

/// Mapping from variable name to [`Binding`], scoped to one render call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderContext {
    bindings: IndexMap<String, Binding>,
}

impl RenderContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every field of `node` as `Set`.
    pub fn from_node(node: &ConfigNode) -> Self {
        node.iter()
            .map(|(name, value)| (name.clone(), Binding::Set(value.clone())))
            .collect()
    }

    /// Bind `name`, replacing any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, binding: impl Into<Binding>) {
        self.bindings.insert(name.into(), binding.into());
    }

    /// Builder form of [`bind`](Self::bind).
    pub fn with(mut self, name: impl Into<String>, binding: impl Into<Binding>) -> Self {
        self.bind(name, binding);
        self
    }

    /// Look up a binding.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// True when `name` is declared, even if bound to `Unset`.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.bindings.iter()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl FromIterator<(String, Binding)> for RenderContext {
    fn from_iter<I: IntoIterator<Item = (String, Binding)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}
