//! The external simulation oracle boundary.
//!
//! Continuization needs numeric value ranges of an expression over time
//! windows. The oracle is a narrow synchronous port injected into the pass,
//! so a deterministic test double can stand in for the real simulator.

use crate::error::PassResult;
use hybra_ir::{Configuration, Interval, SymbolicStatePoint};
use hybra_syntax::Expr;

/// A black box estimating the observed range of an expression's value over
/// each requested time window, simulating from a start state.
pub trait RangeOracle {
    /// Returns one interval per window, in window order. Returning a
    /// different number of ranges than windows is a fatal pass error.
    fn simulate(
        &mut self,
        config: &Configuration,
        start: &SymbolicStatePoint,
        windows: &[Interval],
        expression: &Expr,
    ) -> PassResult<Vec<Interval>>;
}

/// Oracle returning pre-recorded ranges; the standard deterministic test
/// double.
#[derive(Debug, Clone)]
pub struct FixedRangeOracle {
    pub ranges: Vec<Interval>,
}

impl FixedRangeOracle {
    pub fn new(ranges: Vec<Interval>) -> Self {
        Self { ranges }
    }
}

impl RangeOracle for FixedRangeOracle {
    fn simulate(
        &mut self,
        _config: &Configuration,
        _start: &SymbolicStatePoint,
        _windows: &[Interval],
        _expression: &Expr,
    ) -> PassResult<Vec<Interval>> {
        Ok(self.ranges.clone())
    }
}
