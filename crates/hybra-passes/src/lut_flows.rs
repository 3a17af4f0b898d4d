//! Lookup-table flow linearization.
//!
//! Replaces a mode whose flow is a lookup table with one mode per
//! hyper-rectangular cell of the breakpoint grid. Each cell mode restricts
//! its inputs to the cell's ranges, carries the n-linear interpolation of
//! the corner values as its flow, and connects bidirectionally to every
//! face-adjacent cell. The original mode survives as an urgent dispatch
//! mode routing to the cell that contains the entry point.

use crate::error::{PassError, PassResult};
use hybra_ir::{BaseComponent, Configuration, ExportError, ExpressionInterval};
use hybra_syntax::{Expr, LutExpr, Operator};
use tracing::debug;

/// Convert every lookup-table flow in the configuration, one mode at a time,
/// until none remain.
pub fn run(config: &mut Configuration) -> PassResult<()> {
    config.validate()?;
    let result = config.with_validation_disabled(convert_all);
    result?;
    config.validate()?;
    Ok(())
}

fn convert_all(config: &mut Configuration) -> PassResult<()> {
    while let Some((mode, var)) = find_lut_flow(&config.root)? {
        debug!(mode = %mode, variable = %var, "converting lookup-table flow");
        convert_flow(&mut config.root, &mode, &var)?;
    }
    Ok(())
}

/// Find a flow whose right-hand side is a lookup table. A lookup table
/// anywhere other than the top level of a flow is unsupported.
fn find_lut_flow(component: &BaseComponent) -> PassResult<Option<(String, String)>> {
    for (mode_name, mode) in &component.modes {
        for (var, value) in &mode.flow {
            match &value.expression {
                Expr::Lut(_) => return Ok(Some((mode_name.clone(), var.clone()))),
                other if contains_lut(other) => {
                    return Err(ExportError::NestedLut {
                        expr: other.to_string(),
                    }
                    .into());
                }
                _ => {}
            }
        }
    }
    Ok(None)
}

fn contains_lut(expr: &Expr) -> bool {
    match expr {
        Expr::Lut(_) => true,
        Expr::Constant(_) | Expr::Variable(_) => false,
        Expr::Operation(_, children) => children.iter().any(contains_lut),
        Expr::Matrix(m) => m.data.iter().any(contains_lut),
    }
}

fn convert_flow(component: &mut BaseComponent, mode_name: &str, var: &str) -> PassResult<()> {
    let original = component
        .mode(mode_name)
        .cloned()
        .ok_or_else(|| PassError::Precondition(format!("mode '{}' disappeared", mode_name)))?;
    let Some(flow_value) = original.flow.get(var) else {
        return Ok(());
    };
    let Expr::Lut(lut) = flow_value.expression.clone() else {
        return Ok(());
    };
    let uncertainty = flow_value.interval;

    let cells_per_dim: Vec<usize> = lut.breakpoints.iter().map(|bp| bp.len() - 1).collect();
    if cells_per_dim.iter().any(|&n| n == 0) {
        return Err(PassError::Precondition(format!(
            "lookup table in flow of '{}' needs at least two breakpoints per dimension",
            var
        )));
    }

    // pre-existing outgoing transitions move from the original mode onto
    // every cell; incoming transitions keep pointing at the dispatch mode
    let outgoing: Vec<_> = component
        .transitions
        .iter()
        .filter(|t| t.from == mode_name)
        .cloned()
        .collect();
    component.transitions.retain(|t| t.from != mode_name);

    let cells = grid_indices(&cells_per_dim);
    let cell_names: Vec<String> = cells
        .iter()
        .map(|cell| {
            let suffix: Vec<String> = cell.iter().map(|i| i.to_string()).collect();
            format!("{}_{}", mode_name, suffix.join("_"))
        })
        .collect();

    for (cell, name) in cells.iter().zip(&cell_names) {
        let condition = cell_condition(&lut, cell, &cells_per_dim);

        let mode = component.create_mode(name)?;
        mode.flow = original.flow.clone();
        mode.flow.insert(
            var.to_string(),
            ExpressionInterval {
                expression: n_linear_interpolation(&lut, cell),
                interval: uncertainty,
            },
        );
        mode.invariant = match (original.invariant.is_true(), &condition) {
            (true, Some(cond)) => cond.clone(),
            (false, Some(cond)) => Expr::and(original.invariant.clone(), cond.clone()),
            (_, None) => original.invariant.clone(),
        };

        // entry transition from the dispatch mode, guarded by the cell range
        let entry = component.create_transition(mode_name, name)?;
        entry.guard = condition.unwrap_or_else(Expr::truth);

        for transition in &outgoing {
            let mut copy = transition.clone();
            copy.from = name.clone();
            component.copy_transition(&copy)?;
        }
    }

    // bidirectional transitions across every shared boundary face
    for (cell, name) in cells.iter().zip(&cell_names) {
        for (dim, &count) in cells_per_dim.iter().enumerate() {
            if cell[dim] + 1 >= count {
                continue;
            }
            let mut neighbor = cell.clone();
            neighbor[dim] += 1;
            let neighbor_name = &cell_names[position_of(&cells, &neighbor)];
            let boundary = Expr::number(lut.breakpoints[dim][cell[dim] + 1]);
            let input = lut.inputs[dim].clone();

            let up = component.create_transition(name, neighbor_name)?;
            up.guard = Expr::binary(Operator::GreaterEqual, input.clone(), boundary.clone());

            let down = component.create_transition(neighbor_name, name)?;
            down.guard = Expr::binary(Operator::LessEqual, input, boundary);
        }
    }

    // the original mode becomes the urgent dispatch mode
    if let Some(dispatch) = component.mode_mut(mode_name) {
        dispatch.urgent = true;
        dispatch.flow.clear();
    }

    Ok(())
}

/// All multi-indices of a grid, in lexicographic order.
fn grid_indices(dims: &[usize]) -> Vec<Vec<usize>> {
    let mut out = vec![Vec::new()];
    for &count in dims {
        let mut next = Vec::with_capacity(out.len() * count);
        for prefix in &out {
            for i in 0..count {
                let mut index = prefix.clone();
                index.push(i);
                next.push(index);
            }
        }
        out = next;
    }
    out
}

fn position_of(cells: &[Vec<usize>], target: &[usize]) -> usize {
    cells
        .iter()
        .position(|c| c == target)
        .unwrap_or_default()
}

/// The range condition of a cell: per dimension, a lower bound when the cell
/// is not first (`input >= breakpoint`) and an upper bound when it is not
/// last (`input <= breakpoint`). Outermost cells extend to infinity on their
/// open side. `None` for a single-cell table with no bounds at all.
fn cell_condition(lut: &LutExpr, cell: &[usize], cells_per_dim: &[usize]) -> Option<Expr> {
    let mut condition: Option<Expr> = None;
    let mut push = |conjunct: Expr| {
        condition = Some(match condition.take() {
            Some(acc) => Expr::and(acc, conjunct),
            None => conjunct,
        });
    };

    for (dim, &index) in cell.iter().enumerate() {
        let input = &lut.inputs[dim];
        if index > 0 {
            push(Expr::binary(
                Operator::GreaterEqual,
                input.clone(),
                Expr::number(lut.breakpoints[dim][index]),
            ));
        }
        if index + 1 < cells_per_dim[dim] {
            push(Expr::binary(
                Operator::LessEqual,
                input.clone(),
                Expr::number(lut.breakpoints[dim][index + 1]),
            ));
        }
    }

    condition
}

/// The n-linear interpolation of a lookup table over one grid cell, as a
/// closed symbolic expression: nested blends
/// `v0 + (v1 - v0) * (x - lo) / (hi - lo)` composed across dimensions, the
/// outermost blend on the last dimension. Matches the surrounding cells
/// exactly on shared faces.
pub fn n_linear_interpolation(lut: &LutExpr, cell: &[usize]) -> Expr {
    let mut corner = vec![0usize; cell.len()];
    blend(lut, cell, &mut corner, cell.len())
}

fn blend(lut: &LutExpr, cell: &[usize], corner: &mut Vec<usize>, dims_left: usize) -> Expr {
    if dims_left == 0 {
        return lut.data.get(corner).clone();
    }
    let dim = dims_left - 1;
    let lo = lut.breakpoints[dim][cell[dim]];
    let hi = lut.breakpoints[dim][cell[dim] + 1];

    corner[dim] = cell[dim];
    let v0 = blend(lut, cell, corner, dim);
    corner[dim] = cell[dim] + 1;
    let v1 = blend(lut, cell, corner, dim);

    let delta = Expr::binary(Operator::Subtract, v1, v0.clone());
    let offset = Expr::binary(
        Operator::Subtract,
        lut.inputs[dim].clone(),
        Expr::number(lo),
    );
    let slope = Expr::binary(
        Operator::Divide,
        Expr::binary(Operator::Multiply, delta, offset),
        Expr::number(hi - lo),
    );
    Expr::binary(Operator::Add, v0, slope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybra_ir::util::evaluate;
    use hybra_syntax::parse_expression;
    use indexmap::IndexMap;

    fn lut_1d() -> LutExpr {
        let Expr::Lut(lut) = parse_expression("lut([t], [1, 2, 1, 2], [0, 10, 30, 40])").unwrap()
        else {
            panic!("expected lut");
        };
        *lut
    }

    fn expr_eq_on(a: &Expr, b: &Expr, samples: &[(&str, f64)]) -> bool {
        let bindings: IndexMap<String, f64> = samples
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        let (va, vb) = (
            evaluate(a, &bindings).unwrap(),
            evaluate(b, &bindings).unwrap(),
        );
        (va - vb).abs() < 1e-9
    }

    #[test]
    fn test_linear_interpolation_1d() {
        let lut = lut_1d();
        let expected = parse_expression("1 + 1 / 10 * (t - 0)").unwrap();
        let got = n_linear_interpolation(&lut, &[0]);
        for t in [0.0, 2.5, 5.0, 10.0] {
            assert!(expr_eq_on(&expected, &got, &[("t", t)]), "mismatch at t={}", t);
        }
    }

    #[test]
    fn test_linear_interpolation_1d_decreasing_segment() {
        let lut = lut_1d();
        let expected = parse_expression("2 + -1 * (t - 10) / 20").unwrap();
        let got = n_linear_interpolation(&lut, &[1]);
        for t in [10.0, 15.0, 30.0] {
            assert!(expr_eq_on(&expected, &got, &[("t", t)]), "mismatch at t={}", t);
        }
    }

    #[test]
    fn test_linear_interpolation_2d() {
        let Expr::Lut(lut) =
            parse_expression("lut([a, b], [1 2 4 ; 2 3 5 ; 3 5 10], [0, 1, 3], [0, 10, 30])")
                .unwrap()
        else {
            panic!("expected lut");
        };
        let expected =
            parse_expression("3 + (a - 1) * 1 + (b - 10) / 20 * (5 + (a - 1) * 2.5 - (3 + (a - 1) * 1))")
                .unwrap();
        let got = n_linear_interpolation(&lut, &[1, 1]);

        for (a, b) in [(1.0, 10.0), (3.0, 30.0), (2.0, 20.0), (1.5, 12.0)] {
            assert!(
                expr_eq_on(&expected, &got, &[("a", a), ("b", b)]),
                "mismatch at a={}, b={}",
                a,
                b
            );
        }
    }

    #[test]
    fn test_interpolation_continuous_across_shared_face() {
        // the defining correctness property: neighboring cells agree exactly
        // at the shared boundary
        let lut = lut_1d();
        let left = n_linear_interpolation(&lut, &[0]);
        let right = n_linear_interpolation(&lut, &[1]);
        assert!(expr_eq_on(&left, &right, &[("t", 10.0)]));

        let middle = n_linear_interpolation(&lut, &[1]);
        let last = n_linear_interpolation(&lut, &[2]);
        assert!(expr_eq_on(&middle, &last, &[("t", 30.0)]));
    }

    #[test]
    fn test_grid_indices() {
        assert_eq!(grid_indices(&[3]), vec![vec![0], vec![1], vec![2]]);
        assert_eq!(
            grid_indices(&[2, 2]),
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );
    }
}
