//! Parameter/variable deletion.
//!
//! Removes names from the automaton wholesale: declaration sets, expression
//! occurrences, flow and reset left-hand sides, transition labels, and plot
//! selections. A deleted name may only appear in boolean comparisons (the
//! comparison collapses to `true`); any use in an arithmetic position is an
//! export error.

use crate::error::PassResult;
use hybra_ir::rewrite::{and_identity, rewrite_expr, RewriteRule};
use hybra_ir::{rewrite_component, Configuration, ExportError};
use hybra_syntax::Expr;
use tracing::debug;

/// Delete the given names (variables, constants, or labels) from the
/// configuration.
pub fn run(config: &mut Configuration, names: &[&str]) -> PassResult<()> {
    for name in names {
        debug!(name, "deleting parameter");
        delete_name(config, name)?;
    }
    Ok(())
}

fn delete_name(config: &mut Configuration, name: &str) -> PassResult<()> {
    let component = &mut config.root;
    component.variables.retain(|v| v != name);
    component.constants.shift_remove(name);
    component.labels.shift_remove(name);

    // rewrite every expression slot, collapsing comparisons on the name
    let mut rule = DeleteRule { name };
    rewrite_component(component, &mut rule)?;

    // flow left-hand sides (urgent modes carry no flows)
    for mode in component.modes.values_mut() {
        if mode.urgent {
            continue;
        }
        mode.flow.shift_remove(name);
    }

    // reset left-hand sides and matching labels
    for transition in &mut component.transitions {
        transition.reset.shift_remove(name);
        if transition.label.as_deref() == Some(name) {
            transition.label = None;
        }
    }

    // initial / forbidden state predicates
    for map in [&mut config.init, &mut config.forbidden] {
        for expr in map.values_mut() {
            *expr = rewrite_expr(expr, &mut rule)?;
        }
    }

    // re-point plot selections at the first remaining variable
    if let Some(first) = config.root.variables.first().cloned() {
        for plot in &mut config.settings.plot_variables {
            if plot == name {
                *plot = first.clone();
            }
        }
    }

    Ok(())
}

/// Deletion rewrite rule: a comparison whose operand is the doomed variable
/// collapses to `true` before its children are visited; a surviving bare
/// occurrence of the variable is an export error; AND nodes simplify away
/// `true` children as rewriting proceeds upward.
struct DeleteRule<'a> {
    name: &'a str,
}

impl RewriteRule for DeleteRule<'_> {
    fn shortcut(&mut self, expr: &Expr) -> Result<Option<Expr>, ExportError> {
        if let Expr::Operation(op, children) = expr {
            if op.is_comparison() {
                let is_doomed =
                    |e: &Expr| matches!(e, Expr::Variable(name) if name == self.name);
                if is_doomed(&children[0]) || is_doomed(&children[1]) {
                    return Ok(Some(Expr::truth()));
                }
            }
        }
        Ok(None)
    }

    fn rewrite(&mut self, expr: Expr) -> Result<Expr, ExportError> {
        match &expr {
            Expr::Variable(name) if name == self.name => Err(ExportError::NonBooleanDelete {
                var: name.clone(),
            }),
            _ => Ok(and_identity(expr)),
        }
    }
}
