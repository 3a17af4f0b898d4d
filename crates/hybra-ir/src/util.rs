//! Automaton utilities: numeric expression evaluation, initial-point
//! extraction, and a debug-configuration builder for tests.

use crate::automaton::{BaseComponent, ExpressionInterval};
use crate::config::Configuration;
use crate::error::ExportError;
use crate::geometry::{HyperPoint, SymbolicStatePoint};
use hybra_syntax::{parse_expression, Expr, Operator};
use indexmap::IndexMap;

/// Evaluate an expression numerically under the given variable bindings.
/// Comparisons and connectives evaluate to 1 (true) or 0 (false).
pub fn evaluate(expr: &Expr, bindings: &IndexMap<String, f64>) -> Result<f64, ExportError> {
    match expr {
        Expr::Constant(value) => Ok(*value),
        Expr::Variable(name) => {
            bindings
                .get(name)
                .copied()
                .ok_or_else(|| ExportError::UnboundVariable { var: name.clone() })
        }
        Expr::Operation(Operator::Negative, children) => Ok(-evaluate(&children[0], bindings)?),
        Expr::Operation(Operator::Not, children) => {
            Ok(if evaluate(&children[0], bindings)? != 0.0 {
                0.0
            } else {
                1.0
            })
        }
        Expr::Operation(op, children) if children.len() == 2 => {
            let left = evaluate(&children[0], bindings)?;
            let right = evaluate(&children[1], bindings)?;
            let truth = |b: bool| if b { 1.0 } else { 0.0 };
            match op {
                Operator::Add => Ok(left + right),
                Operator::Subtract => Ok(left - right),
                Operator::Multiply => Ok(left * right),
                Operator::Divide => Ok(left / right),
                Operator::And => Ok(truth(left != 0.0 && right != 0.0)),
                Operator::Or => Ok(truth(left != 0.0 || right != 0.0)),
                Operator::Equal => Ok(truth(left == right)),
                Operator::NotEqual => Ok(truth(left != right)),
                Operator::Less => Ok(truth(left < right)),
                Operator::LessEqual => Ok(truth(left <= right)),
                Operator::GreaterEqual => Ok(truth(left >= right)),
                Operator::Greater => Ok(truth(left > right)),
                Operator::Negative | Operator::Not => Err(ExportError::Unevaluable {
                    expr: expr.to_string(),
                }),
            }
        }
        _ => Err(ExportError::Unevaluable {
            expr: expr.to_string(),
        }),
    }
}

/// Extract the initial state point from a configuration whose first init
/// predicate is a conjunction of `variable == constant` terms (`true`
/// conjuncts left over from deletions are skipped). Every declared variable
/// must be assigned.
pub fn initial_point(config: &Configuration) -> Result<SymbolicStatePoint, ExportError> {
    let Some((mode, predicate)) = config.init.first() else {
        return Err(ExportError::UnsupportedInitial {
            expr: "<no initial states>".to_string(),
        });
    };

    let mut assignments: IndexMap<String, f64> = IndexMap::new();
    collect_assignments(predicate, &mut assignments)?;

    let point = config
        .root
        .variables
        .iter()
        .map(|var| {
            assignments
                .get(var)
                .copied()
                .ok_or_else(|| ExportError::InitialVariableUnassigned { var: var.clone() })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SymbolicStatePoint {
        mode: mode.clone(),
        point: HyperPoint(point),
    })
}

fn collect_assignments(
    expr: &Expr,
    out: &mut IndexMap<String, f64>,
) -> Result<(), ExportError> {
    match expr {
        Expr::Operation(Operator::And, children) => {
            for child in children {
                collect_assignments(child, out)?;
            }
            Ok(())
        }
        Expr::Operation(Operator::Equal, children) => match (&children[0], &children[1]) {
            (Expr::Variable(name), Expr::Constant(value))
            | (Expr::Constant(value), Expr::Variable(name)) => {
                out.insert(name.clone(), *value);
                Ok(())
            }
            _ => Err(ExportError::UnsupportedInitial {
                expr: expr.to_string(),
            }),
        },
        _ if expr.is_true() => Ok(()),
        _ => Err(ExportError::UnsupportedInitial {
            expr: expr.to_string(),
        }),
    }
}

/// Build a one-mode debug configuration from `(variable, flow, initial)`
/// rows. The mode is named `on`; the init predicate is the conjunction of
/// `variable == initial` in row order, and the first two variables become
/// the plot variables.
///
/// # Panics
///
/// Panics if a flow or initial-value string does not parse, or if the
/// resulting configuration does not validate. Intended for tests.
pub fn make_debug_configuration(dynamics: &[(&str, &str, &str)]) -> Configuration {
    let mut component = BaseComponent::new();
    let mut init: Option<Expr> = None;

    for (var, flow, initial) in dynamics {
        component.variables.push(var.to_string());

        let flow_expr = match parse_expression(flow) {
            Ok(e) => e,
            Err(err) => panic!("bad debug flow '{}': {}", flow, err),
        };
        let initial_expr = match parse_expression(initial) {
            Ok(e) => e,
            Err(err) => panic!("bad debug initial value '{}': {}", initial, err),
        };

        let conjunct = Expr::binary(Operator::Equal, Expr::var(*var), initial_expr);
        init = Some(match init {
            Some(acc) => Expr::and(acc, conjunct),
            None => conjunct,
        });

        if component.modes.is_empty() {
            if let Err(err) = component.create_mode("on") {
                panic!("debug mode creation failed: {}", err);
            }
        }
        if let Some(mode) = component.mode_mut("on") {
            mode.flow
                .insert(var.to_string(), ExpressionInterval::new(flow_expr));
        }
    }

    let mut config = Configuration::new(component);
    if let Some(predicate) = init {
        config.init.insert("on".to_string(), predicate);
    }

    let first = config.root.variables.first().cloned().unwrap_or_default();
    let second = config.root.variables.get(1).cloned().unwrap_or_else(|| first.clone());
    config.settings.plot_variables = [first, second];

    if let Err(err) = config.validate() {
        panic!("debug configuration is invalid: {}", err);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_arithmetic_and_comparisons() {
        let mut bindings = IndexMap::new();
        bindings.insert("t".to_string(), 15.0);
        let expr = parse_expression("2 + -1 * (t - 10) / 20").unwrap();
        assert!((evaluate(&expr, &bindings).unwrap() - 1.75).abs() < 1e-9);

        let cond = parse_expression("t >= 10 & t <= 30").unwrap();
        assert_eq!(evaluate(&cond, &bindings).unwrap(), 1.0);
    }

    #[test]
    fn test_make_debug_configuration() {
        let config = make_debug_configuration(&[("t", "1", "0"), ("y", "t + 1", "15")]);
        assert_eq!(config.root.variables, vec!["t", "y"]);
        assert_eq!(config.root.modes.len(), 1);
        assert_eq!(
            config.init["on"].to_string(),
            "t == 0 & y == 15"
        );
        assert_eq!(config.settings.plot_variables, ["t", "y"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_initial_point() {
        let config = make_debug_configuration(&[("t", "1", "0"), ("y", "1", "15")]);
        let start = initial_point(&config).unwrap();
        assert_eq!(start.mode, "on");
        assert_eq!(start.point.0, vec![0.0, 15.0]);
    }

    #[test]
    fn test_initial_point_requires_assignment_shape() {
        let mut config = make_debug_configuration(&[("t", "1", "0")]);
        config.init.insert(
            "on".to_string(),
            parse_expression("t >= 0").unwrap(),
        );
        assert!(matches!(
            initial_point(&config),
            Err(ExportError::UnsupportedInitial { .. })
        ));
    }
}
