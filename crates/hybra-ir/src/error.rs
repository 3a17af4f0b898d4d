//! Error types for the automaton IR.

use thiserror::Error;

/// A structural invariant of the automaton was violated. Always fatal: this
/// indicates a model-integrity bug, not a recoverable condition.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("mode '{name}' already exists in component")]
    DuplicateMode { name: String },

    #[error("mode '{name}' not found in component")]
    UnknownMode { name: String },

    #[error("mode '{mode}' in transition '{from}' -> '{to}' does not exist in component")]
    UnknownTransitionMode {
        mode: String,
        from: String,
        to: String,
    },

    #[error("mode map key '{key}' does not match mode name '{name}'")]
    ModeKeyMismatch { key: String, name: String },

    #[error("component declares a blank variable name")]
    BlankVariable,

    #[error("duplicate variable '{name}' in component")]
    DuplicateVariable { name: String },

    #[error("{context} uses variable '{var}' which is not declared in component")]
    UndeclaredVariable { var: String, context: String },

    #[error("mode '{mode}' defines flow for '{var}' which is not a declared variable")]
    FlowKeyUndeclared { mode: String, var: String },

    #[error("mode '{mode}' has no flow for variable '{var}'")]
    FlowMissing { mode: String, var: String },

    #[error("urgent mode '{mode}' must not define flow dynamics")]
    UrgentFlow { mode: String },

    #[error("transition '{from}' -> '{to}' resets variable '{var}' which is not a declared variable")]
    ResetKeyUndeclared {
        from: String,
        to: String,
        var: String,
    },

    #[error("label in transition '{from}' -> '{to}' is blank")]
    BlankLabel { from: String, to: String },

    #[error("transition '{from}' -> '{to}' uses label '{label}' which is not declared in component")]
    UndeclaredLabel {
        from: String,
        to: String,
        label: String,
    },

    #[error("component declares blank label")]
    BlankDeclaredLabel,

    #[error("{context} references mode '{mode}' which does not exist in component")]
    UnknownPredicateMode { mode: String, context: String },

    #[error("plot variable '{var}' is not declared in component")]
    PlotVariableUndeclared { var: String },
}

/// An expression shape a pass or printer cannot handle. Always fatal for the
/// operation that raised it; never silently approximated.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not delete variable '{var}' (used in non-boolean expression)")]
    NonBooleanDelete { var: String },

    #[error("unsupported variable-variable term in linear expression: '{expr}'")]
    VariableProduct { expr: String },

    #[error("unsupported term in linear expression: '{expr}'")]
    UnsupportedTerm { expr: String },

    #[error("unsupported operation in linear expression (expecting +/-/*): '{expr}'")]
    UnsupportedOperation { expr: String },

    #[error("variable '{var}' appears in multiple additive terms: '{expr}'")]
    AmbiguousCoefficient { var: String, expr: String },

    #[error("expression is not constant: '{expr}'")]
    NonConstant { expr: String },

    #[error("error extracting linear coefficient for variable '{var}' in expression '{expr}'")]
    LinearCoefficient {
        var: String,
        expr: String,
        #[source]
        source: Box<ExportError>,
    },

    #[error("unsupported top-level operator '{op}' in condition: '{expr}'")]
    UnsupportedConjunct { op: String, expr: String },

    #[error("unsupported non-operation condition: '{expr}'")]
    NonOperationCondition { expr: String },

    #[error("uncertainty interval in unsupported position: '{expr}'")]
    IntervalContext { expr: String },

    #[error("lookup table in unsupported position: '{expr}'")]
    NestedLut { expr: String },

    #[error("cannot evaluate expression with unbound variable '{var}'")]
    UnboundVariable { var: String },

    #[error("mode '{mode}' has no flow for variable '{var}'")]
    MissingFlow { mode: String, var: String },

    #[error("cannot evaluate expression: '{expr}'")]
    Unevaluable { expr: String },

    #[error("unsupported initial states (expecting conjunction of variable == constant): '{expr}'")]
    UnsupportedInitial { expr: String },

    #[error("initial states do not assign variable '{var}'")]
    InitialVariableUnassigned { var: String },
}
