//! Hybrid-automaton intermediate representation.
//!
//! Components own their modes and transitions; transitions refer to modes by
//! name and are resolved through the owning component. Passes mutate a
//! [`Configuration`] in place and leave it [`Configuration::validate`]-clean.

pub mod automaton;
pub mod config;
pub mod dynamics;
pub mod error;
pub mod geometry;
pub mod rewrite;
pub mod util;
pub mod validate;

pub use automaton::{AutomatonMode, AutomatonTransition, BaseComponent, ExpressionInterval};
pub use config::{AutomatonSettings, Configuration};
pub use error::{ExportError, ValidationError};
pub use geometry::{HyperPoint, Interval, SymbolicStatePoint};
pub use rewrite::{
    and_identity, rewrite_component, rewrite_configuration, rewrite_expr, RewriteRule,
    Substituter,
};
