//! Translation units: one configuration area each, supplying the patterns,
//! templates and policy the engine needs.
//!
//! Units are strategies held in a [`UnitRegistry`]; the engine never
//! depends on a concrete unit type.

pub mod builtin;
pub mod definition;
mod template_unit;

pub use definition::{FieldKind, FieldSpec, ListSpec, PolicySpec, TemplateSpec, UnitDefinition};
pub use template_unit::TemplateUnit;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{CommandLine, ConfigNode};
use crate::planner::Plan;
use crate::session::Platform;

/// Reader/writer pair for one configuration area.
pub trait TranslationUnit: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// One-line summary.
    fn description(&self) -> &str;

    /// Dialect the unit's commands are written in.
    fn platform(&self) -> Platform;

    /// Fields identifying one instance.
    fn identity(&self) -> &[String];

    /// Show command reading the instance identified by `id`.
    fn read_command(&self, id: &ConfigNode) -> Result<String>;

    /// Parse the instance out of `output`; `None` when it is absent.
    fn parse(&self, id: &ConfigNode, output: &str) -> Result<Option<ConfigNode>>;

    /// Plan the transition between two snapshots.
    fn plan(&self, before: Option<&ConfigNode>, after: Option<&ConfigNode>) -> Result<Plan>;

    /// Render a plan into the commands to send.
    fn render_plan(&self, plan: &Plan) -> Result<CommandLine>;

    /// Plan and render in one step.
    fn render(&self, before: Option<&ConfigNode>, after: Option<&ConfigNode>) -> Result<CommandLine> {
        let plan = self.plan(before, after)?;
        self.render_plan(&plan)
    }

    /// The identity fields of `node`.
    fn id_of(&self, node: &ConfigNode) -> Result<ConfigNode> {
        let mut id = ConfigNode::new();
        for field in self.identity() {
            let value = node.get(field).ok_or_else(|| {
                Error::InvalidData(format!("{}: identity field '{}' is missing", self.name(), field))
            })?;
            id = id.with(field.clone(), value.clone());
        }
        Ok(id)
    }
}

/// Registry of translation units by name.
#[derive(Default, Clone)]
pub struct UnitRegistry {
    units: HashMap<String, Arc<dyn TranslationUnit>>,
}

impl std::fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitRegistry")
            .field("units", &self.names())
            .finish()
    }
}

impl UnitRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in units
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        for unit in builtin::units()? {
            registry.register(Arc::new(unit));
        }
        Ok(registry)
    }

    /// Register a unit, replacing any unit of the same name
    pub fn register(&mut self, unit: Arc<dyn TranslationUnit>) {
        if self.units.contains_key(unit.name()) {
            warn!(unit = %unit.name(), "replacing registered unit");
        }
        self.units.insert(unit.name().to_string(), unit);
    }

    /// Get a unit by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn TranslationUnit>> {
        self.units
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnitNotFound(name.to_string()))
    }

    /// Check if a unit exists
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// All unit names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.units.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Load one definition file and register it.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let unit = TemplateUnit::load(path)?;
        let name = unit.name().to_string();
        self.register(Arc::new(unit));
        Ok(name)
    }

    /// Load every `.yaml`, `.yml` and `.json` definition in `dir`, in file
    /// name order. Returns the number of units loaded.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::FileNotFound(dir.to_path_buf()));
        }
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml" | "yml" | "json")
                )
            })
            .collect();
        paths.sort();
        for path in &paths {
            let name = self.load_file(path)?;
            debug!(unit = %name, path = %path.display(), "loaded unit definition");
        }
        Ok(paths.len())
    }
}
