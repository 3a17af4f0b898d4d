//! Generic bottom-up rewriting of expression trees and automaton slots.
//!
//! A [`RewriteRule`] is applied to every expression slot of a component:
//! each mode's invariant and flow values, each transition's guard and reset
//! values. Children are rewritten first, then the rule sees the rebuilt
//! node. A rule may also claim a subtree before descent via
//! [`RewriteRule::shortcut`], which is how comparison-level deletions avoid
//! visiting the doomed operand.

use crate::automaton::BaseComponent;
use crate::config::Configuration;
use crate::error::ExportError;
use hybra_syntax::{Expr, Operator};
use indexmap::IndexMap;

/// A rewrite rule over expression trees.
pub trait RewriteRule {
    /// Called on each node before its children are visited. Returning
    /// `Some(replacement)` substitutes the whole subtree without descending.
    fn shortcut(&mut self, _expr: &Expr) -> Result<Option<Expr>, ExportError> {
        Ok(None)
    }

    /// Called bottom-up on each node after its children were rewritten.
    fn rewrite(&mut self, expr: Expr) -> Result<Expr, ExportError>;
}

/// Rewrite an expression bottom-up under the given rule.
pub fn rewrite_expr(expr: &Expr, rule: &mut dyn RewriteRule) -> Result<Expr, ExportError> {
    if let Some(replacement) = rule.shortcut(expr)? {
        return Ok(replacement);
    }

    let rebuilt = match expr {
        Expr::Constant(_) | Expr::Variable(_) => expr.clone(),
        Expr::Operation(op, children) => {
            let children = children
                .iter()
                .map(|c| rewrite_expr(c, rule))
                .collect::<Result<Vec<_>, _>>()?;
            Expr::Operation(*op, children)
        }
        Expr::Matrix(m) => {
            let mut m = m.clone();
            for entry in &mut m.data {
                *entry = rewrite_expr(entry, rule)?;
            }
            Expr::Matrix(m)
        }
        Expr::Lut(lut) => {
            let mut lut = lut.clone();
            for input in &mut lut.inputs {
                *input = rewrite_expr(input, rule)?;
            }
            for entry in &mut lut.data.data {
                *entry = rewrite_expr(entry, rule)?;
            }
            Expr::Lut(lut)
        }
    };

    rule.rewrite(rebuilt)
}

/// Apply a rule to every expression slot of a component.
pub fn rewrite_component(
    component: &mut BaseComponent,
    rule: &mut dyn RewriteRule,
) -> Result<(), ExportError> {
    for mode in component.modes.values_mut() {
        mode.invariant = rewrite_expr(&mode.invariant, rule)?;
        for value in mode.flow.values_mut() {
            value.expression = rewrite_expr(&value.expression, rule)?;
        }
    }

    for transition in &mut component.transitions {
        transition.guard = rewrite_expr(&transition.guard, rule)?;
        for value in transition.reset.values_mut() {
            value.expression = rewrite_expr(&value.expression, rule)?;
        }
    }

    Ok(())
}

/// Apply a rule to every expression slot of a configuration, including the
/// init and forbidden state predicates.
pub fn rewrite_configuration(
    config: &mut Configuration,
    rule: &mut dyn RewriteRule,
) -> Result<(), ExportError> {
    rewrite_component(&mut config.root, rule)?;

    for map in [&mut config.init, &mut config.forbidden] {
        for expr in map.values_mut() {
            *expr = rewrite_expr(expr, rule)?;
        }
    }

    Ok(())
}

/// AND-identity simplification: `true & x -> x`, `x & true -> x`.
pub fn and_identity(expr: Expr) -> Expr {
    if let Expr::Operation(Operator::And, children) = &expr {
        if children[0].is_true() {
            return children[1].clone();
        }
        if children[1].is_true() {
            return children[0].clone();
        }
    }
    expr
}

/// A rule replacing variables by expressions, bottom-up.
pub struct Substituter {
    substitutions: IndexMap<String, Expr>,
}

impl Substituter {
    /// Create a substituter for a single variable.
    pub fn single(var: impl Into<String>, replacement: Expr) -> Self {
        let mut substitutions = IndexMap::new();
        substitutions.insert(var.into(), replacement);
        Self { substitutions }
    }

    /// Create a substituter from a variable-to-expression map.
    pub fn new(substitutions: IndexMap<String, Expr>) -> Self {
        Self { substitutions }
    }
}

impl RewriteRule for Substituter {
    fn rewrite(&mut self, expr: Expr) -> Result<Expr, ExportError> {
        if let Expr::Variable(name) = &expr {
            if let Some(replacement) = self.substitutions.get(name) {
                return Ok(replacement.clone());
            }
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybra_syntax::{parse_expression, print_expr};

    #[test]
    fn test_substituter_replaces_all_occurrences() {
        let expr = parse_expression("c + 2 * c").unwrap();
        let mut rule = Substituter::single("c", parse_expression("a - 1").unwrap());
        let result = rewrite_expr(&expr, &mut rule).unwrap();
        assert_eq!(print_expr(&result), "a - 1 + 2 * (a - 1)");
    }

    #[test]
    fn test_substituter_reaches_lut_inputs() {
        let expr = parse_expression("lut([c], [1, 2], [0, 10])").unwrap();
        let mut rule = Substituter::single("c", Expr::var("t"));
        let result = rewrite_expr(&expr, &mut rule).unwrap();
        assert_eq!(print_expr(&result), "lut([t], reshape([1, 2], 2), [0, 10])");
    }

    #[test]
    fn test_and_identity() {
        let expr = Expr::and(Expr::truth(), Expr::var("x"));
        assert_eq!(and_identity(expr), Expr::var("x"));

        let expr = Expr::and(Expr::var("x"), Expr::truth());
        assert_eq!(and_identity(expr), Expr::var("x"));

        let kept = Expr::and(Expr::var("x"), Expr::var("y"));
        assert_eq!(and_identity(kept.clone()), kept);
    }

    #[test]
    fn test_shortcut_skips_children() {
        // A rule that errors on every variable, but shortcuts comparisons:
        // the variable below the comparison must never be visited.
        struct CompToTrue;
        impl RewriteRule for CompToTrue {
            fn shortcut(&mut self, expr: &Expr) -> Result<Option<Expr>, ExportError> {
                match expr {
                    Expr::Operation(op, _) if op.is_comparison() => Ok(Some(Expr::truth())),
                    _ => Ok(None),
                }
            }
            fn rewrite(&mut self, expr: Expr) -> Result<Expr, ExportError> {
                match expr {
                    Expr::Variable(name) => Err(ExportError::NonBooleanDelete { var: name }),
                    other => Ok(and_identity(other)),
                }
            }
        }

        let expr = parse_expression("x >= 1 & y >= 2").unwrap();
        let result = rewrite_expr(&expr, &mut CompToTrue).unwrap();
        assert!(result.is_true());
    }

    #[test]
    fn test_rewrite_component_touches_every_slot() {
        let mut component = BaseComponent::new();
        component.variables.push("x".to_string());
        component.variables.push("c".to_string());
        component.create_mode("on").unwrap();
        {
            let mode = component.mode_mut("on").unwrap();
            mode.invariant = parse_expression("c <= 1").unwrap();
            mode.flow.insert(
                "x".to_string(),
                crate::automaton::ExpressionInterval::new(parse_expression("c + 1").unwrap()),
            );
            mode.flow.insert(
                "c".to_string(),
                crate::automaton::ExpressionInterval::new(Expr::number(0.0)),
            );
        }
        component.create_transition("on", "on").unwrap();
        component.transitions[0].guard = parse_expression("c >= 1").unwrap();
        component.transitions[0].reset.insert(
            "x".to_string(),
            crate::automaton::ExpressionInterval::new(parse_expression("c * 2").unwrap()),
        );

        let mut rule = Substituter::single("c", Expr::number(5.0));
        rewrite_component(&mut component, &mut rule).unwrap();

        let mode = component.mode("on").unwrap();
        assert_eq!(print_expr(&mode.invariant), "5 <= 1");
        assert_eq!(print_expr(&mode.flow["x"].expression), "5 + 1");
        assert_eq!(print_expr(&component.transitions[0].guard), "5 >= 1");
        assert_eq!(
            print_expr(&component.transitions[0].reset["x"].expression),
            "5 * 2"
        );
    }
}
