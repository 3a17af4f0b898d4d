//! Structural validation of configurations.
//!
//! Enforces the global invariant: every variable referenced in any guard,
//! invariant, flow, or reset resolves to a declared variable or constant of
//! the owning component; transition endpoints exist; reset keys are declared
//! variables; labels are non-blank.

use crate::automaton::{AutomatonTransition, BaseComponent};
use crate::config::Configuration;
use crate::error::ValidationError;
use hybra_syntax::Expr;

/// Validate a full configuration.
pub fn validate_configuration(config: &Configuration) -> Result<(), ValidationError> {
    validate_component(&config.root)?;

    for (map, what) in [(&config.init, "initial states"), (&config.forbidden, "forbidden states")]
    {
        for (mode, expr) in map {
            if !config.root.modes.contains_key(mode) {
                return Err(ValidationError::UnknownPredicateMode {
                    mode: mode.clone(),
                    context: what.to_string(),
                });
            }
            check_references(&config.root, expr, &format!("{} of mode '{}'", what, mode))?;
        }
    }

    for var in &config.settings.plot_variables {
        if !var.is_empty() && !config.root.variables.contains(var) {
            return Err(ValidationError::PlotVariableUndeclared { var: var.clone() });
        }
    }

    Ok(())
}

/// Validate a single component.
pub fn validate_component(component: &BaseComponent) -> Result<(), ValidationError> {
    for (i, var) in component.variables.iter().enumerate() {
        if var.is_empty() {
            return Err(ValidationError::BlankVariable);
        }
        if component.variables[..i].contains(var) {
            return Err(ValidationError::DuplicateVariable { name: var.clone() });
        }
    }

    for label in &component.labels {
        if label.is_empty() {
            return Err(ValidationError::BlankDeclaredLabel);
        }
    }

    for (key, mode) in &component.modes {
        if *key != mode.name {
            return Err(ValidationError::ModeKeyMismatch {
                key: key.clone(),
                name: mode.name.clone(),
            });
        }

        check_references(
            component,
            &mode.invariant,
            &format!("invariant of mode '{}'", mode.name),
        )?;

        if mode.urgent {
            if !mode.flow.is_empty() {
                return Err(ValidationError::UrgentFlow {
                    mode: mode.name.clone(),
                });
            }
            continue;
        }

        for (var, value) in &mode.flow {
            if !component.variables.contains(var) {
                return Err(ValidationError::FlowKeyUndeclared {
                    mode: mode.name.clone(),
                    var: var.clone(),
                });
            }
            check_references(
                component,
                &value.expression,
                &format!("flow of '{}' in mode '{}'", var, mode.name),
            )?;
        }
        for var in &component.variables {
            if !mode.flow.contains_key(var) {
                return Err(ValidationError::FlowMissing {
                    mode: mode.name.clone(),
                    var: var.clone(),
                });
            }
        }
    }

    for transition in &component.transitions {
        validate_transition(component, transition)?;
    }

    Ok(())
}

fn validate_transition(
    component: &BaseComponent,
    transition: &AutomatonTransition,
) -> Result<(), ValidationError> {
    for endpoint in [&transition.from, &transition.to] {
        if !component.modes.contains_key(endpoint.as_str()) {
            return Err(ValidationError::UnknownTransitionMode {
                mode: endpoint.clone(),
                from: transition.from.clone(),
                to: transition.to.clone(),
            });
        }
    }

    check_references(
        component,
        &transition.guard,
        &format!("guard of transition '{}' -> '{}'", transition.from, transition.to),
    )?;

    if let Some(label) = &transition.label {
        if label.is_empty() {
            return Err(ValidationError::BlankLabel {
                from: transition.from.clone(),
                to: transition.to.clone(),
            });
        }
        if !component.labels.contains(label.as_str()) {
            return Err(ValidationError::UndeclaredLabel {
                from: transition.from.clone(),
                to: transition.to.clone(),
                label: label.clone(),
            });
        }
    }

    for (var, value) in &transition.reset {
        if !component.variables.contains(var) {
            return Err(ValidationError::ResetKeyUndeclared {
                from: transition.from.clone(),
                to: transition.to.clone(),
                var: var.clone(),
            });
        }
        check_references(
            component,
            &value.expression,
            &format!(
                "reset of '{}' in transition '{}' -> '{}'",
                var, transition.from, transition.to
            ),
        )?;
    }

    Ok(())
}

/// Check that every variable referenced in `expr` is a declared variable or
/// constant of the component.
fn check_references(
    component: &BaseComponent,
    expr: &Expr,
    context: &str,
) -> Result<(), ValidationError> {
    for var in expr.variables() {
        if !component.variables.contains(&var) && !component.constants.contains_key(&var) {
            return Err(ValidationError::UndeclaredVariable {
                var,
                context: context.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::ExpressionInterval;
    use hybra_syntax::parse_expression;

    fn valid_component() -> BaseComponent {
        let mut c = BaseComponent::new();
        c.variables.push("t".to_string());
        c.constants.insert("period".to_string(), 0.1);
        c.create_mode("on").unwrap();
        let mode = c.mode_mut("on").unwrap();
        mode.invariant = parse_expression("t <= period").unwrap();
        mode.flow.insert(
            "t".to_string(),
            ExpressionInterval::new(Expr::number(1.0)),
        );
        c
    }

    #[test]
    fn test_valid_component_passes() {
        assert!(validate_component(&valid_component()).is_ok());
    }

    #[test]
    fn test_undeclared_variable_in_guard_names_transition() {
        let mut c = valid_component();
        c.create_mode("off").unwrap();
        c.mode_mut("off")
            .unwrap()
            .flow
            .insert("t".to_string(), ExpressionInterval::new(Expr::number(0.0)));
        c.create_transition("on", "off").unwrap();
        c.transitions[0].guard = parse_expression("ghost >= 1").unwrap();

        let err = validate_component(&c).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ghost"));
        assert!(message.contains("'on' -> 'off'"));
    }

    #[test]
    fn test_reset_key_must_be_declared() {
        let mut c = valid_component();
        c.create_transition("on", "on").unwrap();
        c.transitions[0]
            .reset
            .insert("ghost".to_string(), ExpressionInterval::new(Expr::number(0.0)));

        assert!(matches!(
            validate_component(&c),
            Err(ValidationError::ResetKeyUndeclared { .. })
        ));
    }

    #[test]
    fn test_missing_flow_detected() {
        let mut c = valid_component();
        c.variables.push("y".to_string());
        assert!(matches!(
            validate_component(&c),
            Err(ValidationError::FlowMissing { .. })
        ));
    }

    #[test]
    fn test_urgent_mode_skips_flow_requirements() {
        let mut c = valid_component();
        c.create_mode("dispatch").unwrap();
        c.mode_mut("dispatch").unwrap().urgent = true;
        assert!(validate_component(&c).is_ok());
    }

    #[test]
    fn test_blank_label_rejected() {
        let mut c = valid_component();
        c.create_transition("on", "on").unwrap();
        c.transitions[0].label = Some(String::new());
        assert!(matches!(
            validate_component(&c),
            Err(ValidationError::BlankLabel { .. })
        ));
    }

    #[test]
    fn test_unknown_init_mode_rejected() {
        let config = {
            let mut cfg = Configuration::new(valid_component());
            cfg.init.insert("missing".to_string(), Expr::truth());
            cfg
        };
        assert!(matches!(
            validate_configuration(&config),
            Err(ValidationError::UnknownPredicateMode { .. })
        ));
    }

    #[test]
    fn test_undeclared_plot_variable_rejected() {
        let mut config = Configuration::new(valid_component());
        config.settings.plot_variables[0] = "ghost".to_string();
        assert!(matches!(
            validate_configuration(&config),
            Err(ValidationError::PlotVariableUndeclared { .. })
        ));
    }
}
