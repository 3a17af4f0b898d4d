//! Hybrid-automaton components, modes, and transitions.
//!
//! Modes are stored name-keyed in their owning component and transitions
//! refer to modes by name, resolved through the component. Expressions are
//! owned by the mode or transition that carries them and deep-copied on
//! structural copy.

use crate::error::ValidationError;
use crate::geometry::Interval;
use hybra_syntax::Expr;
use indexmap::{IndexMap, IndexSet};

/// A flow or reset value: an expression plus an optional uncertainty
/// interval added to the expression's value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionInterval {
    pub expression: Expr,
    pub interval: Option<Interval>,
}

impl ExpressionInterval {
    /// A plain expression with no uncertainty.
    pub fn new(expression: Expr) -> Self {
        Self {
            expression,
            interval: None,
        }
    }

    /// An expression with a nondeterministic offset interval.
    pub fn with_interval(expression: Expr, interval: Interval) -> Self {
        Self {
            expression,
            interval: Some(interval),
        }
    }
}

/// A discrete mode with an invariant and per-variable flow dynamics.
///
/// Urgent modes carry no flow dynamics (time does not pass in them).
#[derive(Debug, Clone, PartialEq)]
pub struct AutomatonMode {
    pub name: String,
    /// Boolean-valued expression constraining time spent in the mode.
    pub invariant: Expr,
    pub urgent: bool,
    /// Derivative per continuous variable, one entry per declared variable
    /// for non-urgent modes.
    pub flow: IndexMap<String, ExpressionInterval>,
}

impl AutomatonMode {
    fn new(name: String) -> Self {
        Self {
            name,
            invariant: Expr::truth(),
            urgent: false,
            flow: IndexMap::new(),
        }
    }
}

/// A guarded transition between two modes of the same component, referring
/// to the modes by name.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomatonTransition {
    pub from: String,
    pub to: String,
    /// Boolean-valued expression gating the transition; defaults to `true`.
    pub guard: Expr,
    /// Reset per variable; absent variables are implicitly unchanged.
    pub reset: IndexMap<String, ExpressionInterval>,
    /// Synchronization label; `Some` implies non-empty.
    pub label: Option<String>,
}

impl AutomatonTransition {
    fn new(from: String, to: String) -> Self {
        Self {
            from,
            to,
            guard: Expr::truth(),
            reset: IndexMap::new(),
            label: None,
        }
    }
}

/// A base component: named variable/constant/label sets plus the automaton
/// graph (modes and transitions).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseComponent {
    /// Declared continuous variables, in order. The order is semantic: it
    /// fixes the A-matrix row/column layout of linear extraction.
    pub variables: Vec<String>,
    /// Named constants.
    pub constants: IndexMap<String, f64>,
    /// Declared synchronization labels.
    pub labels: IndexSet<String>,
    /// Modes, keyed by name.
    pub modes: IndexMap<String, AutomatonMode>,
    /// Transitions, in creation order.
    pub transitions: Vec<AutomatonTransition>,
}

impl BaseComponent {
    /// Create an empty component.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a mode by name.
    pub fn mode(&self, name: &str) -> Option<&AutomatonMode> {
        self.modes.get(name)
    }

    /// Look up a mode by name, mutably.
    pub fn mode_mut(&mut self, name: &str) -> Option<&mut AutomatonMode> {
        self.modes.get_mut(name)
    }

    /// Insert a fresh mode with invariant `true` and no flows.
    pub fn create_mode(&mut self, name: &str) -> Result<&mut AutomatonMode, ValidationError> {
        if self.modes.contains_key(name) {
            return Err(ValidationError::DuplicateMode {
                name: name.to_string(),
            });
        }
        let mode = AutomatonMode::new(name.to_string());
        Ok(self.modes.entry(name.to_string()).or_insert(mode))
    }

    /// Insert a transition with guard `true`, empty reset, and no label.
    /// Both endpoint modes must already belong to this component.
    pub fn create_transition(
        &mut self,
        from: &str,
        to: &str,
    ) -> Result<&mut AutomatonTransition, ValidationError> {
        for endpoint in [from, to] {
            if !self.modes.contains_key(endpoint) {
                return Err(ValidationError::UnknownTransitionMode {
                    mode: endpoint.to_string(),
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
        let index = self.transitions.len();
        self.transitions
            .push(AutomatonTransition::new(from.to_string(), to.to_string()));
        Ok(&mut self.transitions[index])
    }

    /// Deep-copy a mode under a new name within this component.
    pub fn copy_mode_as(
        &mut self,
        source: &str,
        new_name: &str,
    ) -> Result<&mut AutomatonMode, ValidationError> {
        if self.modes.contains_key(new_name) {
            return Err(ValidationError::DuplicateMode {
                name: new_name.to_string(),
            });
        }
        let mut copy = self
            .mode(source)
            .ok_or_else(|| ValidationError::UnknownMode {
                name: source.to_string(),
            })?
            .clone();
        copy.name = new_name.to_string();
        Ok(self.modes.entry(new_name.to_string()).or_insert(copy))
    }

    /// Deep-copy a transition into this component, re-resolving the endpoint
    /// modes by name. Fails if either endpoint is absent here.
    pub fn copy_transition(
        &mut self,
        transition: &AutomatonTransition,
    ) -> Result<&mut AutomatonTransition, ValidationError> {
        for endpoint in [&transition.from, &transition.to] {
            if !self.modes.contains_key(endpoint.as_str()) {
                return Err(ValidationError::UnknownTransitionMode {
                    mode: endpoint.clone(),
                    from: transition.from.clone(),
                    to: transition.to.clone(),
                });
            }
        }
        let index = self.transitions.len();
        self.transitions.push(transition.clone());
        Ok(&mut self.transitions[index])
    }

    /// Find the first transition between two modes.
    pub fn find_transition(&self, from: &str, to: &str) -> Option<&AutomatonTransition> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.to == to)
    }

    /// The set of names expressions may reference: variables and constants.
    pub fn valid_names(&self) -> IndexSet<String> {
        let mut names: IndexSet<String> = self.variables.iter().cloned().collect();
        names.extend(self.constants.keys().cloned());
        names
    }
}
