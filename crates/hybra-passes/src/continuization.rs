//! Time-triggered continuization.
//!
//! Approximates a single-mode periodically-sampled system by a purely
//! continuous one: the sampled-hold clock machinery is removed, the cyber
//! variable is replaced by its periodic-update expression plus an interval
//! error term, and the time horizon is partitioned into overlapping windows
//! whose error terms come from a numeric range oracle. Out-of-range
//! excursions become reachable error modes instead of silent unsoundness.

use crate::delete_params;
use crate::error::{PassError, PassResult};
use crate::oracle::RangeOracle;
use hybra_ir::dynamics::evaluate_constant;
use hybra_ir::util::initial_point;
use hybra_ir::{Configuration, ExportError, ExpressionInterval, Interval};
use hybra_syntax::{Expr, Operator};
use indexmap::IndexMap;
use tracing::debug;

/// The time-triggered continuization pass.
#[derive(Debug, Clone)]
pub struct ContinuizationPassTT {
    /// Step between successive window end times.
    pub time_step: f64,
    /// Symmetric widening applied to every simulated range.
    pub bloat: f64,
    /// Skip creating the out-of-range error modes.
    pub skip_error_modes: bool,
}

/// Shape parameters extracted from the periodically-sampled automaton.
struct Params {
    mode: String,
    clock_var: String,
    cyber_var: String,
    cyber_expression: Expr,
    time_var: String,
    period: f64,
}

/// One sliding time window and the mode covering it.
struct Domain {
    start_time: f64,
    end_time: f64,
    mode: String,
    range: Interval,
}

impl ContinuizationPassTT {
    /// Run the pass. Any shape mismatch is reported before mutation, leaving
    /// the configuration untouched.
    pub fn run(
        &self,
        config: &mut Configuration,
        oracle: &mut dyn RangeOracle,
    ) -> PassResult<()> {
        config.validate()?;
        self.check_preconditions(config)?;
        let params = extract_params(config)?;
        let mut domains = self.build_domains(&params, config.settings.time_horizon)?;

        // original dynamics of the physical variables, before substitution
        let original_dynamics: IndexMap<String, ExpressionInterval> = config
            .root
            .modes[&params.mode]
            .flow
            .iter()
            .filter(|(var, _)| **var != params.cyber_var && **var != params.clock_var)
            .map(|(var, value)| (var.clone(), value.clone()))
            .collect();

        self.make_continuized_approx(config, &params, &original_dynamics)?;
        self.estimate_ranges(config, &params, &mut domains, oracle)?;
        create_modes_with_time_conditions(config, &params, &mut domains)?;
        substitute_original_cyber_variables(config, &params, &domains, &original_dynamics)?;
        if !self.skip_error_modes {
            self.add_range_conditions_to_modes(config, &params, &domains)?;
        }

        config.settings.time_triggered = true;
        config.validate()?;
        Ok(())
    }

    fn check_preconditions(&self, config: &Configuration) -> PassResult<()> {
        if config.root.modes.len() != 1 || config.root.transitions.len() != 1 {
            return Err(PassError::Precondition(
                "automaton must be the periodically-sampled automaton \
                 (single mode with single transition)"
                    .to_string(),
            ));
        }
        if !(self.time_step > 0.0) {
            return Err(PassError::Precondition(
                "time step must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Partition the horizon into overlapping windows of width `period`,
    /// stepped by `time_step`.
    fn build_domains(&self, params: &Params, horizon: f64) -> PassResult<Vec<Domain>> {
        let mut domains = Vec::new();
        let tol = 1e-9;
        let mut last_time = 0.0;
        let mut t = self.time_step;

        while last_time + params.period + tol < horizon {
            domains.push(Domain {
                start_time: last_time,
                end_time: t,
                mode: params.mode.clone(),
                range: Interval::point(0.0),
            });
            last_time = (t - params.period).max(0.0);
            t += self.time_step;
        }

        if domains.is_empty() {
            return Err(PassError::Precondition(format!(
                "time horizon {} leaves no room for a window of period {}",
                horizon, params.period
            )));
        }
        Ok(domains)
    }

    /// Remove the sampled-hold structure: drop the clock transition,
    /// substitute the cyber variable's update expression into the remaining
    /// dynamics, and delete the clock and cyber variables.
    fn make_continuized_approx(
        &self,
        config: &mut Configuration,
        params: &Params,
        original_dynamics: &IndexMap<String, ExpressionInterval>,
    ) -> PassResult<()> {
        config.root.transitions.clear();

        set_substituted_dynamics(config, params, original_dynamics, None)?;
        delete_params::run(config, &[&params.clock_var, &params.cyber_var])?;

        config.validate()?;
        Ok(())
    }

    /// Query the oracle for the observed range of the update expression over
    /// each window, then bloat the ranges symmetrically.
    fn estimate_ranges(
        &self,
        config: &Configuration,
        params: &Params,
        domains: &mut [Domain],
        oracle: &mut dyn RangeOracle,
    ) -> PassResult<()> {
        let start = initial_point(config)?;
        debug!(mode = %start.mode, point = ?start.point, "simulating from initial state");

        let windows: Vec<Interval> = domains
            .iter()
            .map(|d| Interval::new(d.start_time, d.end_time))
            .collect();

        let ranges = oracle.simulate(config, &start, &windows, &params.cyber_expression)?;
        if ranges.len() != domains.len() {
            return Err(PassError::Oracle(
                "expected single range for each domain from simulation".to_string(),
            ));
        }

        for (domain, range) in domains.iter_mut().zip(ranges) {
            debug!(
                start = domain.start_time,
                end = domain.end_time,
                %range,
                "simulated range"
            );
            domain.range = range.bloat(self.bloat);
        }
        Ok(())
    }

    /// Guard each window mode with transitions into memoized error modes,
    /// taken when the continuized derivative leaves its bloated range.
    fn add_range_conditions_to_modes(
        &self,
        config: &mut Configuration,
        params: &Params,
        domains: &[Domain],
    ) -> PassResult<()> {
        let max_derivative = Expr::binary(
            Operator::Add,
            params.cyber_expression.clone(),
            Expr::number(self.bloat),
        );
        let min_derivative = Expr::binary(
            Operator::Subtract,
            params.cyber_expression.clone(),
            Expr::number(self.bloat),
        );

        for domain in domains {
            let above = get_error_mode(config, &format!("error_{}_above", domain.mode))?;
            let t1 = config.root.create_transition(&domain.mode, &above)?;
            t1.guard = Expr::binary(
                Operator::GreaterEqual,
                max_derivative.clone(),
                Expr::number(domain.range.max),
            );

            let below = get_error_mode(config, &format!("error_{}_below", domain.mode))?;
            let t2 = config.root.create_transition(&domain.mode, &below)?;
            t2.guard = Expr::binary(
                Operator::LessEqual,
                min_derivative.clone(),
                Expr::number(domain.range.min),
            );
        }
        Ok(())
    }
}

/// Extract the clock variable, period, cyber variable and its update
/// expression, and the time variable. Every mismatch is a precondition
/// error raised before any mutation.
fn extract_params(config: &Configuration) -> PassResult<Params> {
    let transition = &config.root.transitions[0];
    let Some((mode_name, mode)) = config.root.modes.first() else {
        return Err(PassError::Precondition("automaton has no mode".to_string()));
    };

    // guard must be `clock_var >= PERIOD`
    let (clock_var, period) = match &transition.guard {
        Expr::Operation(Operator::GreaterEqual, children) => match (&children[0], &children[1]) {
            (Expr::Variable(var), Expr::Constant(period)) => (var.clone(), *period),
            _ => {
                return Err(PassError::Precondition(format!(
                    "expected guard of form clock_var >= PERIOD, got: {}",
                    transition.guard
                )))
            }
        },
        _ => {
            return Err(PassError::Precondition(format!(
                "expected guard of form clock_var >= PERIOD, got: {}",
                transition.guard
            )))
        }
    };

    // reset must set the clock to zero and exactly one cyber variable
    let mut cyber: Option<(String, Expr)> = None;
    for (var, value) in &transition.reset {
        if value.interval.is_some() {
            return Err(PassError::Precondition(format!(
                "reset for '{}' cannot contain interval assignment",
                var
            )));
        }
        if *var == clock_var {
            if value.expression != Expr::Constant(0.0) {
                return Err(PassError::Precondition(format!(
                    "clock reset for '{}' must be to zero",
                    clock_var
                )));
            }
        } else if cyber.is_some() {
            return Err(PassError::Precondition(
                "reset assigns to more than one cyber variable".to_string(),
            ));
        } else {
            cyber = Some((var.clone(), value.expression.clone()));
        }
    }
    let Some((cyber_var, cyber_expression)) = cyber else {
        return Err(PassError::Precondition(
            "couldn't find cyber variable assignment in reset".to_string(),
        ));
    };

    // the invariant must contain `clock_var <= PERIOD` as an AND-conjunct
    if !clock_condition_in_invariant(&mode.invariant, &clock_var, period)? {
        return Err(PassError::Precondition(format!(
            "couldn't find clock condition in invariant: {}",
            mode.invariant
        )));
    }

    // the time variable has constant derivative 1
    let time_var = mode
        .flow
        .iter()
        .find(|(var, value)| {
            **var != cyber_var
                && **var != clock_var
                && value.interval.is_none()
                && value.expression == Expr::Constant(1.0)
        })
        .map(|(var, _)| var.clone())
        .ok_or_else(|| {
            PassError::Precondition("couldn't find time variable in automaton".to_string())
        })?;

    Ok(Params {
        mode: mode_name.clone(),
        clock_var,
        cyber_var,
        cyber_expression,
        time_var,
        period,
    })
}

/// Search the invariant for the conjunct `clock_var <= PERIOD`, recursing
/// through nested ANDs. A LESSEQUAL on the clock against a different bound
/// is a mismatch error.
fn clock_condition_in_invariant(
    invariant: &Expr,
    clock_var: &str,
    period: f64,
) -> PassResult<bool> {
    if let Expr::Operation(op, children) = invariant {
        if *op == Operator::And {
            let mut found = false;
            for child in children {
                found = clock_condition_in_invariant(child, clock_var, period)? || found;
            }
            return Ok(found);
        }
        if *op == Operator::LessEqual {
            if let Expr::Variable(var) = &children[0] {
                if var == clock_var {
                    if matches!(&children[1], Expr::Constant(bound) if *bound == period) {
                        return Ok(true);
                    }
                    return Err(PassError::Precondition(format!(
                        "clock guard and invariant do not match; expected {} <= {}, \
                         invariant contained {}",
                        clock_var, period, invariant
                    )));
                }
            }
        }
    }
    Ok(false)
}

/// Replace the continuized mode's flows by the original dynamics with the
/// cyber variable substituted by its update expression (plus `omega` when
/// given).
fn set_substituted_dynamics(
    config: &mut Configuration,
    params: &Params,
    original_dynamics: &IndexMap<String, ExpressionInterval>,
    omega: Option<Interval>,
) -> PassResult<()> {
    set_substituted_dynamics_in_mode(config, &params.mode.clone(), params, original_dynamics, omega)
}

fn set_substituted_dynamics_in_mode(
    config: &mut Configuration,
    mode_name: &str,
    params: &Params,
    original_dynamics: &IndexMap<String, ExpressionInterval>,
    omega: Option<Interval>,
) -> PassResult<()> {
    let mut flow = IndexMap::new();
    for (var, value) in original_dynamics {
        let (expression, interval) = substitute_with_interval(
            &value.expression,
            &params.cyber_var,
            &params.cyber_expression,
            omega,
        )?;
        let interval = match (value.interval, interval) {
            (Some(a), Some(b)) => Some(a.add(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        flow.insert(var.clone(), ExpressionInterval { expression, interval });
    }

    let Some(mode) = config.root.mode_mut(mode_name) else {
        return Err(PassError::Precondition(format!(
            "mode '{}' disappeared",
            mode_name
        )));
    };
    mode.flow = flow;
    Ok(())
}

/// Substitute `var` by `replacement + omega`, pulling the interval up
/// through additive, negated, and constant-multiplied contexts into the
/// returned uncertainty. Any other context for the interval is an export
/// error.
fn substitute_with_interval(
    expr: &Expr,
    var: &str,
    replacement: &Expr,
    omega: Option<Interval>,
) -> PassResult<(Expr, Option<Interval>)> {
    let interval_error = || {
        PassError::Export(ExportError::IntervalContext {
            expr: expr.to_string(),
        })
    };

    match expr {
        Expr::Variable(name) if name == var => Ok((replacement.clone(), omega)),
        Expr::Constant(_) | Expr::Variable(_) => Ok((expr.clone(), None)),

        Expr::Operation(Operator::Negative, children) => {
            let (inner, interval) = substitute_with_interval(&children[0], var, replacement, omega)?;
            Ok((Expr::negative(inner), interval.map(|i| i.negate())))
        }

        Expr::Operation(op @ (Operator::Add | Operator::Subtract), children) => {
            let (left, li) = substitute_with_interval(&children[0], var, replacement, omega)?;
            let (right, ri) = substitute_with_interval(&children[1], var, replacement, omega)?;
            let ri = if *op == Operator::Subtract {
                ri.map(|i| i.negate())
            } else {
                ri
            };
            let interval = match (li, ri) {
                (Some(a), Some(b)) => Some(a.add(b)),
                (Some(a), None) => Some(a),
                (None, b) => b,
            };
            Ok((Expr::binary(*op, left, right), interval))
        }

        Expr::Operation(Operator::Multiply, children) => {
            let (left, li) = substitute_with_interval(&children[0], var, replacement, omega)?;
            let (right, ri) = substitute_with_interval(&children[1], var, replacement, omega)?;
            let interval = match (li, ri) {
                (Some(_), Some(_)) => return Err(interval_error()),
                (Some(a), None) => {
                    let scale = evaluate_constant(&right).map_err(|_| interval_error())?;
                    Some(a.mul_scalar(scale))
                }
                (None, Some(b)) => {
                    let scale = evaluate_constant(&left).map_err(|_| interval_error())?;
                    Some(b.mul_scalar(scale))
                }
                (None, None) => None,
            };
            Ok((Expr::binary(Operator::Multiply, left, right), interval))
        }

        Expr::Operation(Operator::Divide, children) => {
            let (left, li) = substitute_with_interval(&children[0], var, replacement, omega)?;
            let (right, ri) = substitute_with_interval(&children[1], var, replacement, omega)?;
            if ri.is_some() {
                return Err(interval_error());
            }
            let interval = match li {
                Some(a) => {
                    let divisor = evaluate_constant(&right).map_err(|_| interval_error())?;
                    Some(a.mul_scalar(1.0 / divisor))
                }
                None => None,
            };
            Ok((Expr::binary(Operator::Divide, left, right), interval))
        }

        Expr::Operation(op, children) => {
            let mut rebuilt = Vec::with_capacity(children.len());
            for child in children {
                let (sub, interval) = substitute_with_interval(child, var, replacement, omega)?;
                if interval.is_some() {
                    return Err(interval_error());
                }
                rebuilt.push(sub);
            }
            Ok((Expr::Operation(*op, rebuilt), None))
        }

        Expr::Matrix(_) | Expr::Lut(_) => {
            if expr.references(var) {
                Err(interval_error())
            } else {
                Ok((expr.clone(), None))
            }
        }
    }
}

/// Clone the continuized mode once per window (the first window reuses the
/// original mode), conjoin the window's time bounds onto each invariant, and
/// chain the windows with time-triggered transitions.
fn create_modes_with_time_conditions(
    config: &mut Configuration,
    params: &Params,
    domains: &mut [Domain],
) -> PassResult<()> {
    for i in 1..domains.len() {
        let name = format!("{}_{}", params.mode, i + 1);
        config.root.copy_mode_as(&params.mode, &name)?;
        domains[i].mode = name;
    }

    for i in 0..domains.len() {
        let time_condition = Expr::and(
            Expr::binary(
                Operator::GreaterEqual,
                Expr::var(&params.time_var),
                Expr::number(domains[i].start_time),
            ),
            Expr::binary(
                Operator::LessEqual,
                Expr::var(&params.time_var),
                Expr::number(domains[i].end_time),
            ),
        );

        let Some(mode) = config.root.mode_mut(&domains[i].mode) else {
            return Err(PassError::Precondition(format!(
                "mode '{}' disappeared",
                domains[i].mode
            )));
        };
        let invariant = std::mem::replace(&mut mode.invariant, Expr::truth());
        mode.invariant = hybra_ir::and_identity(Expr::and(invariant, time_condition));

        if i + 1 < domains.len() {
            let next = domains[i + 1].mode.clone();
            let transition = config.root.create_transition(&domains[i].mode, &next)?;
            transition.guard = Expr::binary(
                Operator::GreaterEqual,
                Expr::var(&params.time_var),
                Expr::number(domains[i].end_time),
            );
        }
    }
    Ok(())
}

/// Substitute the cyber variable by `update_expression + omega_i` in every
/// window mode, where `omega_i = range_i * [-period, 0]`.
fn substitute_original_cyber_variables(
    config: &mut Configuration,
    params: &Params,
    domains: &[Domain],
    original_dynamics: &IndexMap<String, ExpressionInterval>,
) -> PassResult<()> {
    for domain in domains {
        let omega = domain.range.mul_interval(Interval::new(-params.period, 0.0));
        debug!(
            start = domain.start_time,
            end = domain.end_time,
            range = %domain.range,
            %omega,
            "substituting continuization error term"
        );
        set_substituted_dynamics_in_mode(
            config,
            &domain.mode,
            params,
            original_dynamics,
            Some(omega),
        )?;
    }
    Ok(())
}

/// Get or create a sink error mode: invariant `true`, all-zero flows, and a
/// forbidden-state entry making it observable to reachability.
fn get_error_mode(config: &mut Configuration, name: &str) -> PassResult<String> {
    if !config.root.modes.contains_key(name) {
        config.root.create_mode(name)?;
        let variables = config.root.variables.clone();
        if let Some(mode) = config.root.mode_mut(name) {
            for var in variables {
                mode.flow
                    .insert(var, ExpressionInterval::new(Expr::number(0.0)));
            }
        }
        config.forbidden.insert(name.to_string(), Expr::truth());
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_with_interval_additive() {
        let expr = hybra_syntax::parse_expression("x + c").unwrap();
        let omega = Interval::new(-0.5, 0.0);
        let (result, interval) =
            substitute_with_interval(&expr, "c", &Expr::var("u"), Some(omega)).unwrap();
        assert_eq!(result.to_string(), "x + u");
        assert_eq!(interval, Some(omega));
    }

    #[test]
    fn test_substitute_with_interval_scaled() {
        let expr = hybra_syntax::parse_expression("x - 2 * c").unwrap();
        let omega = Interval::new(-1.0, 0.0);
        let (result, interval) =
            substitute_with_interval(&expr, "c", &Expr::var("u"), Some(omega)).unwrap();
        assert_eq!(result.to_string(), "x - 2 * u");
        // -(2 * [-1, 0]) = [0, 2]
        assert_eq!(interval, Some(Interval::new(0.0, 2.0)));
    }

    #[test]
    fn test_substitute_with_interval_rejects_nonlinear_context() {
        let expr = hybra_syntax::parse_expression("x * c").unwrap();
        let omega = Interval::new(-1.0, 0.0);
        let err = substitute_with_interval(&expr, "c", &Expr::var("u"), Some(omega)).unwrap_err();
        assert!(matches!(
            err,
            PassError::Export(ExportError::IntervalContext { .. })
        ));
    }

    #[test]
    fn test_substitute_without_omega_is_plain() {
        let expr = hybra_syntax::parse_expression("x * c").unwrap();
        let (result, interval) =
            substitute_with_interval(&expr, "c", &Expr::var("u"), None).unwrap();
        assert_eq!(result.to_string(), "x * u");
        assert_eq!(interval, None);
    }
}
