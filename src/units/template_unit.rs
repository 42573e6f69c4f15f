//! Translation unit driven entirely by patterns and templates.

use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use super::definition::{FieldKind, FieldSpec, ListSpec, UnitDefinition};
use super::TranslationUnit;
use crate::error::{Error, ErrorContext, Result};
use crate::model::{CommandLine, ConfigNode, KeyedList, Value};
use crate::parser::{self, FieldPattern};
use crate::planner::{
    ListPolicy, Plan, PlanPolicy, PlanTemplates, Planner, Precondition, TemplateRole,
    CONTEXT_NAMES, ENTRY_NAMES,
};
use crate::session::Platform;
use crate::template::{Binding, RenderContext, Template};

#[derive(Debug, Clone)]
struct Field {
    name: String,
    kind: FieldKind,
    group: Option<String>,
    pattern: FieldPattern,
    true_value: String,
    false_value: String,
    default: Option<Value>,
}

impl Field {
    fn compile(spec: &FieldSpec) -> Result<Self> {
        let pattern = FieldPattern::line(&spec.pattern)?;
        if let Some(group) = &spec.group {
            if !pattern.group_names().any(|g| g == group) {
                return Err(Error::pattern(
                    &spec.pattern,
                    format!("no capture group named '{}'", group),
                ));
            }
        }
        Ok(Self {
            name: spec.name.clone(),
            kind: spec.kind,
            group: spec.group.clone(),
            pattern,
            true_value: spec.true_value.clone().unwrap_or_else(|| "true".to_string()),
            false_value: spec.false_value.clone().unwrap_or_else(|| "false".to_string()),
            default: spec.default.clone(),
        })
    }

    fn captured(&self, text: &str) -> Vec<String> {
        match &self.group {
            None => parser::parse_fields(text, &self.pattern),
            Some(group) => parser::parse_records(text, &self.pattern)
                .into_iter()
                .filter_map(|mut record| record.swap_remove(group))
                .collect(),
        }
    }

    fn extract(&self, text: &str) -> Result<Option<Value>> {
        let value = match self.kind {
            FieldKind::Presence => {
                parser::contains(text, &self.pattern).then_some(Value::Bool(true))
            }
            FieldKind::List => {
                let items = self.captured(text);
                (!items.is_empty()).then(|| Value::List(items.into_iter().map(Value::Str).collect()))
            }
            kind => match self.captured(text).into_iter().next() {
                Some(raw) => Some(convert(&self.name, kind, raw, &self.true_value, &self.false_value)?),
                None => None,
            },
        };
        Ok(value.or_else(|| self.default.clone()))
    }
}

fn convert(field: &str, kind: FieldKind, raw: String, truthy: &str, falsy: &str) -> Result<Value> {
    let conversion = |message: String| Error::FieldConversion {
        field: field.to_string(),
        value: raw.clone(),
        message,
    };
    match kind {
        FieldKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| conversion(e.to_string())),
        FieldKind::Boolean => {
            let text = raw.trim();
            if text == truthy {
                Ok(Value::Bool(true))
            } else if text == falsy {
                Ok(Value::Bool(false))
            } else {
                Err(conversion(format!("expected '{}' or '{}'", truthy, falsy)))
            }
        }
        _ => Ok(Value::Str(raw)),
    }
}

#[derive(Debug, Clone)]
struct List {
    name: String,
    key: String,
    key_kind: FieldKind,
    header: FieldPattern,
    fields: Vec<Field>,
}

impl List {
    fn compile(spec: &ListSpec) -> Result<Self> {
        if !matches!(spec.key_kind, FieldKind::String | FieldKind::Integer) {
            return Err(Error::invalid_unit(
                &spec.name,
                format!("list key kind must be string or integer, not {}", spec.key_kind),
            ));
        }
        Ok(Self {
            name: spec.name.clone(),
            key: spec.key.clone(),
            key_kind: spec.key_kind,
            header: FieldPattern::line(&spec.header)?,
            fields: spec.fields.iter().map(Field::compile).collect::<Result<_>>()?,
        })
    }

    fn extract(&self, body: &str) -> Result<Option<KeyedList>> {
        let mut entries = Vec::new();
        for section in parser::sections(body, &self.header) {
            let key = convert(&self.key, self.key_kind, section.value.clone(), "", "")?;
            let inner = top_level(&section.body);
            let mut entry = ConfigNode::new().with(self.key.clone(), key);
            for field in &self.fields {
                entry = entry.with_opt(field.name.clone(), field.extract(&inner)?);
            }
            entries.push(entry);
        }
        if entries.is_empty() {
            return Ok(None);
        }
        KeyedList::from_entries(self.key.clone(), entries).map(Some)
    }
}

/// Lines at the shallowest indentation of `text`, unindented.
fn top_level(text: &str) -> String {
    let depth = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut out = String::new();
    for line in text.lines() {
        if line.trim().is_empty() || line.len() - line.trim_start().len() != depth {
            continue;
        }
        out.push_str(line.trim());
        out.push('\n');
    }
    out
}

/// `text` with its common indentation removed; relative nesting is kept.
fn dedent(text: &str) -> String {
    let depth = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut out = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        out.push_str(line.get(depth..).unwrap_or(line).trim_end());
        out.push('\n');
    }
    out
}

/// A translation unit compiled from a [`UnitDefinition`].
///
/// Parsing reads scalar fields from the top level of the instance's block
/// and keyed lists from nested blocks; rendering runs the planner and the
/// unit's templates, wrapping write and update output in the parent context
/// lines.
#[derive(Debug, Clone)]
pub struct TemplateUnit {
    name: String,
    description: String,
    platform: Platform,
    identity: Vec<String>,
    read: Template,
    block: Option<Template>,
    fields: Vec<Field>,
    lists: Vec<List>,
    templates: PlanTemplates,
    parents: Vec<Template>,
    exit: String,
    planner: Planner,
}

impl TemplateUnit {
    /// Compile a definition; patterns and templates are checked here.
    pub fn from_definition(def: UnitDefinition) -> Result<Self> {
        let name = def.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::invalid_unit("<unnamed>", "name must not be empty"));
        }

        let mut seen = HashSet::new();
        for field in def
            .fields
            .iter()
            .map(|f| &f.name)
            .chain(def.lists.iter().map(|l| &l.name))
        {
            if !seen.insert(field.as_str()) {
                return Err(Error::invalid_unit(&name, format!("field '{}' declared twice", field)));
            }
        }
        for id in &def.identity {
            if seen.contains(id.as_str()) {
                return Err(Error::invalid_unit(
                    &name,
                    format!("identity field '{}' is also a parsed field", id),
                ));
            }
        }

        for field in seen.iter().copied().chain(def.identity.iter().map(String::as_str)) {
            if CONTEXT_NAMES.contains(&field) {
                return Err(Error::invalid_unit(
                    &name,
                    format!("field '{}' collides with a reserved template name", field),
                ));
            }
        }
        for list in &def.lists {
            if let Some(field) = list
                .fields
                .iter()
                .find(|f| f.name != list.key && ENTRY_NAMES.contains(&f.name.as_str()))
            {
                return Err(Error::invalid_unit(
                    &name,
                    format!(
                        "field '{}' of list '{}' collides with a reserved template name",
                        field.name, list.name
                    ),
                ));
            }
        }

        let compile = |role: &str, source: &str| Template::compile(format!("{}.{}", name, role), source);
        let mut templates = PlanTemplates::new(name.clone(), compile("write", &def.templates.write)?);
        if let Some(update) = &def.templates.update {
            templates = templates.with_update(compile("update", update)?);
        }
        if let Some(delete) = &def.templates.delete {
            templates = templates.with_delete(compile("delete", delete)?);
        }

        let mut policy = PlanPolicy::default()
            .with_change(def.policy.change)
            .with_delete(def.policy.delete);
        for list in &def.lists {
            policy = policy.with_list(
                list.name.clone(),
                ListPolicy {
                    order: list.order,
                    entry: list.entry_policy,
                },
            );
        }
        let mut planner = Planner::new(policy);
        for id in &def.identity {
            planner = planner.with_precondition(Precondition::immutable(id.clone()));
        }
        for spec in &def.preconditions {
            planner = planner.with_precondition(Precondition::from(spec));
        }

        let unit = Self {
            description: def.description,
            platform: def.platform,
            identity: def.identity,
            read: compile("read", &def.read)?,
            block: def.block.as_deref().map(|b| compile("block", b)).transpose()?,
            fields: def.fields.iter().map(Field::compile).collect::<Result<_>>()?,
            lists: def.lists.iter().map(List::compile).collect::<Result<_>>()?,
            templates,
            parents: def
                .parents
                .iter()
                .enumerate()
                .map(|(i, p)| compile(&format!("parent{}", i), p))
                .collect::<Result<_>>()?,
            exit: def
                .exit
                .unwrap_or_else(|| def.platform.context_exit().to_string()),
            planner,
            name,
        };
        debug!(unit = %unit.name, fields = unit.fields.len(), lists = unit.lists.len(), "compiled unit");
        Ok(unit)
    }

    /// Compile a YAML definition.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Self::from_definition(UnitDefinition::from_yaml(text)?)
    }

    /// Load a definition file (`.yaml`, `.yml` or `.json`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read unit definition {}", path.display()))?;
        let def = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => UnitDefinition::from_json(&text)?,
            _ => UnitDefinition::from_yaml(&text)?,
        };
        Self::from_definition(def)
    }

    /// Names of every parsed field and list.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.lists.iter().map(|l| l.name.as_str()))
    }

    /// The planner in use.
    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// The unit's templates.
    pub fn templates(&self) -> &PlanTemplates {
        &self.templates
    }

    fn id_context(&self, id: &ConfigNode) -> Result<RenderContext> {
        for field in &self.identity {
            if !id.contains(field) {
                return Err(Error::InvalidData(format!(
                    "{}: identity field '{}' is missing",
                    self.name, field
                )));
            }
        }
        Ok(RenderContext::from_node(id))
    }

    /// Bind every declared field the pass leaves undeclared, so templates
    /// can test and loop over fields absent on both sides.
    fn declared(&self, ctx: &RenderContext) -> RenderContext {
        let mut ctx = ctx.clone();
        for name in self.field_names().chain(self.identity.iter().map(String::as_str)) {
            if !ctx.contains(name) {
                ctx.bind(name, Binding::Unset);
            }
        }
        ctx
    }
}

impl TranslationUnit for TemplateUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn identity(&self) -> &[String] {
        &self.identity
    }

    fn read_command(&self, id: &ConfigNode) -> Result<String> {
        let ctx = self.id_context(id)?;
        Ok(self.read.render(&ctx)?.trim().to_string())
    }

    fn parse(&self, id: &ConfigNode, output: &str) -> Result<Option<ConfigNode>> {
        let ctx = self.id_context(id)?;
        let body = match &self.block {
            Some(block) => {
                let header = block.render(&ctx)?;
                match parser::section(output, header.trim()) {
                    Some(body) => dedent(&body),
                    None => return Ok(None),
                }
            }
            None => dedent(output),
        };

        let top = top_level(&body);
        let mut node = ConfigNode::new();
        let mut found = self.block.is_some();
        for field in &self.fields {
            if let Some(value) = field.extract(&top)? {
                found = true;
                node = node.with(field.name.clone(), value);
            }
        }
        for list in &self.lists {
            if let Some(entries) = list.extract(&body)? {
                found = true;
                node = node.with(list.name.clone(), entries);
            }
        }
        if !found {
            return Ok(None);
        }

        let mut result = ConfigNode::new();
        for field in &self.identity {
            result = result.with_opt(field.clone(), id.get(field).cloned());
        }
        Ok(Some(result.merged(&node)))
    }

    fn plan(&self, before: Option<&ConfigNode>, after: Option<&ConfigNode>) -> Result<Plan> {
        self.planner.plan(before, after)
    }

    fn render_plan(&self, plan: &Plan) -> Result<CommandLine> {
        if plan.is_empty() {
            return Ok(CommandLine::default());
        }
        let role = plan.template_role();
        let template = self.templates.get(role)?;
        let mut body = CommandLine::default();
        for pass in plan.passes() {
            let ctx = self.declared(&pass.context);
            body = body.concat(template.render_commands(&ctx)?);
        }
        if body.is_empty() || role == TemplateRole::Delete || self.parents.is_empty() {
            return Ok(body);
        }

        let ctx = self.declared(&plan.passes()[0].context);
        let mut wrapped = CommandLine::default();
        for parent in &self.parents {
            wrapped = wrapped.concat(parent.render_commands(&ctx)?);
        }
        wrapped = wrapped.concat(body);
        let exits = std::iter::repeat(self.exit.as_str()).take(self.parents.len());
        Ok(wrapped.concat(CommandLine::new(exits)))
    }
}
