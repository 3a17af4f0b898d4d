//! Linear-dynamics extraction.
//!
//! Converts affine flow expressions (sums of `coefficient * variable` terms
//! plus a constant) into coefficient vectors against the declared-variable
//! order, for linear-system-consuming passes and printers.

use crate::automaton::{AutomatonMode, BaseComponent};
use crate::error::ExportError;
use hybra_syntax::{Expr, Operator};

/// Extract the A matrix of a mode's dynamics: one row per declared variable,
/// each row the linear coefficients of that variable's derivative.
pub fn extract_matrix_a(
    component: &BaseComponent,
    mode: &AutomatonMode,
) -> Result<Vec<Vec<f64>>, ExportError> {
    component
        .variables
        .iter()
        .map(|var| extract_linear_vector(flow_expr(mode, var)?, &component.variables))
        .collect()
}

/// Extract the B vector of a mode's dynamics: the constant term of each
/// variable's derivative, in declared-variable order.
pub fn extract_vector_b(
    component: &BaseComponent,
    mode: &AutomatonMode,
) -> Result<Vec<f64>, ExportError> {
    component
        .variables
        .iter()
        .map(|var| extract_linear_value(flow_expr(mode, var)?))
        .collect()
}

fn flow_expr<'a>(mode: &'a AutomatonMode, var: &str) -> Result<&'a Expr, ExportError> {
    mode.flow
        .get(var)
        .map(|value| &value.expression)
        .ok_or_else(|| ExportError::MissingFlow {
            mode: mode.name.clone(),
            var: var.to_string(),
        })
}

/// Extract the linear coefficient of each variable, in the given order.
/// A variable absent from the expression has coefficient 0.
pub fn extract_linear_vector(expr: &Expr, vars: &[String]) -> Result<Vec<f64>, ExportError> {
    vars.iter()
        .map(|var| {
            let multiplier = find_multiplier(Some(var), expr).map_err(|source| {
                ExportError::LinearCoefficient {
                    var: var.clone(),
                    expr: expr.to_string(),
                    source: Box::new(source),
                }
            })?;
            match multiplier {
                Some(m) => evaluate_constant(&m),
                None => Ok(0.0),
            }
        })
        .collect()
}

/// Extract the constant term of an affine expression (0 if absent).
pub fn extract_linear_value(expr: &Expr) -> Result<f64, ExportError> {
    match find_multiplier(None, expr)? {
        Some(constant) => evaluate_constant(&constant),
        None => Ok(0.0),
    }
}

/// Find the multiplier of `target` in a sum-of-multiples expression, or the
/// standalone constant term when `target` is `None`.
///
/// The target may appear multiplied by a constant sub-expression on either
/// side of a `*`, but never multiplied by another variable and never in more
/// than one additive term.
fn find_multiplier(target: Option<&str>, expr: &Expr) -> Result<Option<Expr>, ExportError> {
    match expr {
        Expr::Constant(_) => Ok(if target.is_none() {
            Some(expr.clone())
        } else {
            None
        }),

        Expr::Variable(name) => Ok(if Some(name.as_str()) == target {
            Some(Expr::number(1.0))
        } else {
            None
        }),

        Expr::Operation(Operator::Negative, children) => {
            Ok(find_multiplier(target, &children[0])?.map(Expr::negative))
        }

        Expr::Operation(Operator::Multiply, children) => {
            match (&children[0], &children[1]) {
                (Expr::Variable(_), Expr::Variable(_)) => Err(ExportError::VariableProduct {
                    expr: expr.to_string(),
                }),
                (Expr::Variable(name), multiplier) | (multiplier, Expr::Variable(name)) => {
                    Ok(if Some(name.as_str()) == target {
                        Some(multiplier.clone())
                    } else {
                        None
                    })
                }
                _ => Err(ExportError::UnsupportedTerm {
                    expr: expr.to_string(),
                }),
            }
        }

        Expr::Operation(op @ (Operator::Add | Operator::Subtract), children) => {
            let left = find_multiplier(target, &children[0])?;
            let right = find_multiplier(target, &children[1])?;
            match (left, right) {
                (Some(_), Some(_)) => Err(ExportError::AmbiguousCoefficient {
                    var: target.unwrap_or("<constant>").to_string(),
                    expr: expr.to_string(),
                }),
                (Some(found), None) => Ok(Some(found)),
                (None, Some(found)) => Ok(Some(if *op == Operator::Subtract {
                    Expr::negative(found)
                } else {
                    found
                })),
                (None, None) => Ok(None),
            }
        }

        Expr::Operation(_, _) => Err(ExportError::UnsupportedOperation {
            expr: expr.to_string(),
        }),

        Expr::Matrix(_) | Expr::Lut(_) => Err(ExportError::UnsupportedTerm {
            expr: expr.to_string(),
        }),
    }
}

/// Evaluate a constant expression (`+ - * /` and negation over constants).
pub fn evaluate_constant(expr: &Expr) -> Result<f64, ExportError> {
    match expr {
        Expr::Constant(value) => Ok(*value),
        Expr::Operation(Operator::Negative, children) => {
            Ok(-evaluate_constant(&children[0])?)
        }
        Expr::Operation(op, children) if children.len() == 2 => {
            let left = evaluate_constant(&children[0])?;
            let right = evaluate_constant(&children[1])?;
            match op {
                Operator::Add => Ok(left + right),
                Operator::Subtract => Ok(left - right),
                Operator::Multiply => Ok(left * right),
                Operator::Divide => Ok(left / right),
                _ => Err(ExportError::NonConstant {
                    expr: expr.to_string(),
                }),
            }
        }
        _ => Err(ExportError::NonConstant {
            expr: expr.to_string(),
        }),
    }
}

/// Split a conjunction into its non-AND conjuncts, recursing through nested
/// ANDs. OR and NOT at the top level are unsupported, as are non-operation
/// conditions.
pub fn split_conjunction(expr: &Expr) -> Result<Vec<&Expr>, ExportError> {
    let mut out = Vec::new();
    split_into(expr, &mut out)?;
    Ok(out)
}

fn split_into<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) -> Result<(), ExportError> {
    match expr {
        Expr::Operation(Operator::And, children) => {
            for child in children {
                split_into(child, out)?;
            }
            Ok(())
        }
        Expr::Operation(op @ (Operator::Or | Operator::Not), _) => {
            Err(ExportError::UnsupportedConjunct {
                op: op.symbol().to_string(),
                expr: expr.to_string(),
            })
        }
        Expr::Operation(_, _) => {
            out.push(expr);
            Ok(())
        }
        _ => Err(ExportError::NonOperationCondition {
            expr: expr.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybra_syntax::parse_expression;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_linear_vector() {
        let expr = parse_expression("2 * x - 3 * y + 5").unwrap();
        let coeffs = extract_linear_vector(&expr, &vars(&["x", "y"])).unwrap();
        assert_eq!(coeffs, vec![2.0, -3.0]);
        assert_eq!(extract_linear_value(&expr).unwrap(), 5.0);
    }

    #[test]
    fn test_extract_bare_variable_and_constant_sides() {
        // variable alone, variable on the right of *, negated term
        let expr = parse_expression("x + y * 4 - -2").unwrap();
        let coeffs = extract_linear_vector(&expr, &vars(&["x", "y"])).unwrap();
        assert_eq!(coeffs, vec![1.0, 4.0]);
        assert_eq!(extract_linear_value(&expr).unwrap(), 2.0);
    }

    #[test]
    fn test_extract_rejects_variable_product() {
        let expr = parse_expression("x * y").unwrap();
        let err = extract_linear_vector(&expr, &vars(&["x", "y"])).unwrap_err();
        assert!(matches!(err, ExportError::LinearCoefficient { .. }));
        assert!(err.to_string().contains("x * y"));
    }

    #[test]
    fn test_extract_rejects_repeated_variable() {
        let expr = parse_expression("x + 2 * x").unwrap();
        let err = extract_linear_vector(&expr, &vars(&["x"])).unwrap_err();
        let ExportError::LinearCoefficient { source, .. } = err else {
            panic!("expected coefficient-extraction context");
        };
        assert!(matches!(*source, ExportError::AmbiguousCoefficient { .. }));
    }

    #[test]
    fn test_extract_constant_only() {
        let expr = parse_expression("7").unwrap();
        assert_eq!(extract_linear_value(&expr).unwrap(), 7.0);
        assert_eq!(
            extract_linear_vector(&expr, &vars(&["x"])).unwrap(),
            vec![0.0]
        );
    }

    #[test]
    fn test_subtracted_constant_term() {
        let expr = parse_expression("2 * x - 5").unwrap();
        assert_eq!(extract_linear_value(&expr).unwrap(), -5.0);
    }

    #[test]
    fn test_evaluate_constant() {
        let expr = parse_expression("2 * (3 + 1) / 4 - -1").unwrap();
        assert_eq!(evaluate_constant(&expr).unwrap(), 3.0);
        assert!(evaluate_constant(&parse_expression("x + 1").unwrap()).is_err());
    }

    #[test]
    fn test_split_conjunction() {
        let expr = parse_expression("t >= 0 & t <= 10 & x == 1").unwrap();
        let parts = split_conjunction(&expr).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].to_string(), "t >= 0");
        assert_eq!(parts[2].to_string(), "x == 1");
    }

    #[test]
    fn test_split_conjunction_rejects_or() {
        let expr = parse_expression("t >= 0 | t <= 10").unwrap();
        assert!(matches!(
            split_conjunction(&expr),
            Err(ExportError::UnsupportedConjunct { .. })
        ));
    }
}
