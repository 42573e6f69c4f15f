//! # cliconf - CLI Configuration Translation Engine
//!
//! cliconf translates between a vendor-neutral configuration tree and the
//! textual configuration dialect of network-device CLIs (Cisco IOS, IOS-XR,
//! Juniper Junos, Casa CER, Ciena SAOS). It parses CLI output into typed
//! fields and renders a before/after pair of configuration snapshots into the
//! minimal, correctly ordered command sequence that moves the device from one
//! state to the other.
//!
//! ## Core Concepts
//!
//! - **Line Parser**: anchored patterns extracting fields, lists, records and
//!   indentation-delimited sections from CLI output
//! - **Template Renderer**: a small command DSL with variables, conditionals,
//!   loops and joins, rendering three-valued bindings (set / clear / unset)
//! - **Diff Planner**: before/after snapshots to ordered render passes,
//!   removals first
//! - **CLI Session**: one blocking, serialized exchange at a time with
//!   timeout and rejection handling
//! - **Translation Units**: per configuration area patterns and templates,
//!   held in a registry
//!
//! ## Architecture Overview
//!
//! ```text
//!   desired state ─┐
//!                  ▼
//! ┌─────────────────────────┐     ┌─────────────────────────┐
//! │      Diff Planner       │────▶│   Template Renderer     │
//! └─────────────────────────┘     └─────────────────────────┘
//!                  ▲                          │ CommandLine
//!                  │                          ▼
//! ┌─────────────────────────┐     ┌─────────────────────────┐
//! │      Line Parser        │◀────│      CLI Session        │
//! └─────────────────────────┘     └─────────────────────────┘
//!      last known state                  Transport
//! ```
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use cliconf::prelude::*;
//!
//! # async fn demo() -> cliconf::error::Result<()> {
//! let registry = UnitRegistry::with_builtins()?;
//! let device = SimulatedDevice::new("cer1", Platform::CasaCer);
//! let device = Device::new(Session::new(device, Platform::CasaCer), registry);
//!
//! let rpd = ConfigNode::new()
//!     .with("name", "node1")
//!     .with("rpdIndex", 12)
//!     .with("ucam", 2)
//!     .with("dcam", 11);
//! device.apply("cer_rpd", None, Some(&rpd)).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod device;
pub mod error;
pub mod model;
pub mod parser;
pub mod planner;
pub mod session;
pub mod template;
pub mod units;

/// Version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::Config;
    pub use crate::device::{ApplyOutcome, Device, Transaction, UnitChange};
    pub use crate::error::{Error, ErrorContext, Result};
    pub use crate::model::{CommandLine, ConfigNode, KeyedList, Tristate, Value};
    pub use crate::parser::{FieldPattern, MatchMode};
    pub use crate::planner::{
        ChangeStrategy, DeletePolicy, EntryPolicy, ListOrder, ListPolicy, Plan, PlanPolicy,
        PlanTemplates, Planner, Precondition,
    };
    pub use crate::session::{
        Platform, ProcessTransport, Scheduling, Session, SessionError, SimulatedDevice, Transport,
    };
    pub use crate::template::{Binding, RenderContext, Template};
    pub use crate::units::{TemplateUnit, TranslationUnit, UnitRegistry};
}
