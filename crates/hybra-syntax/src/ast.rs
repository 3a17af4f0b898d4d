//! Symbolic expression tree for hybrid-automaton models.
//!
//! Booleans are numeric by source-tool convention: `true` is the constant 1,
//! `false` is the constant 0.

use std::collections::BTreeSet;
use thiserror::Error;

/// Shape mismatch when constructing a matrix or lookup table.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("matrix data length {len} does not match dimensions {dims:?}")]
    DataLength { len: usize, dims: Vec<usize> },

    #[error("matrix rows have unequal lengths ({first} vs {other})")]
    RaggedRows { first: usize, other: usize },

    #[error("matrix must have at least one dimension")]
    NoDimensions,

    #[error(
        "lookup table has {inputs} input(s) but {breakpoint_lists} breakpoint list(s)"
    )]
    InputCount {
        inputs: usize,
        breakpoint_lists: usize,
    },

    #[error(
        "lookup table dimension {dim} has size {dim_width} but {breakpoints} breakpoint(s)"
    )]
    BreakpointCount {
        dim: usize,
        dim_width: usize,
        breakpoints: usize,
    },

    #[error("breakpoints in dimension {dim} are not strictly increasing")]
    UnsortedBreakpoints { dim: usize },
}

/// An operator in a symbolic expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Unary negation.
    Negative,

    // Boolean connectives
    And,
    Or,
    /// Unary logical not.
    Not,

    // Comparisons
    Equal,
    NotEqual,
    Less,
    LessEqual,
    GreaterEqual,
    Greater,
}

impl Operator {
    /// Number of children an operation with this operator carries.
    pub fn arity(self) -> usize {
        match self {
            Operator::Negative | Operator::Not => 1,
            _ => 2,
        }
    }

    /// Check whether this is a comparison operator.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::Less
                | Operator::LessEqual
                | Operator::GreaterEqual
                | Operator::Greater
        )
    }

    /// Binding strength (higher = binds tighter).
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Or => 1,
            Operator::And => 2,
            Operator::Equal
            | Operator::NotEqual
            | Operator::Less
            | Operator::LessEqual
            | Operator::GreaterEqual
            | Operator::Greater => 3,
            Operator::Add | Operator::Subtract => 4,
            Operator::Multiply | Operator::Divide => 5,
            Operator::Negative | Operator::Not => 6,
        }
    }

    /// The surface syntax for this operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Negative => "-",
            Operator::And => "&",
            Operator::Or => "|",
            Operator::Not => "!",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::GreaterEqual => ">=",
            Operator::Greater => ">",
        }
    }
}

/// A symbolic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric constant. Booleans are 1 (true) and 0 (false).
    Constant(f64),
    /// Named variable or constant reference.
    Variable(String),
    /// Operator applied to ordered children; arity matches the operator.
    Operation(Operator, Vec<Expr>),
    /// n-dimensional array of expressions.
    Matrix(MatrixExpr),
    /// Piecewise-linear lookup table sampled at a breakpoint grid.
    Lut(Box<LutExpr>),
}

impl Expr {
    /// The boolean constant `true` (numeric 1).
    pub fn truth() -> Expr {
        Expr::Constant(1.0)
    }

    /// The boolean constant `false` (numeric 0).
    pub fn falsehood() -> Expr {
        Expr::Constant(0.0)
    }

    /// Check whether this expression is the constant `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, Expr::Constant(v) if *v == 1.0)
    }

    /// Numeric constant.
    pub fn number(value: f64) -> Expr {
        Expr::Constant(value)
    }

    /// Variable reference.
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Variable(name.into())
    }

    /// Binary operation.
    pub fn binary(op: Operator, left: Expr, right: Expr) -> Expr {
        debug_assert_eq!(op.arity(), 2);
        Expr::Operation(op, vec![left, right])
    }

    /// Unary negation. Folds constants so `-1` stays a single node.
    pub fn negative(operand: Expr) -> Expr {
        match operand {
            Expr::Constant(v) => Expr::Constant(-v),
            other => Expr::Operation(Operator::Negative, vec![other]),
        }
    }

    /// Conjunction.
    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::binary(Operator::And, left, right)
    }

    /// The left child of a binary operation.
    ///
    /// # Panics
    ///
    /// Panics if this is not a binary operation.
    pub fn left(&self) -> &Expr {
        match self {
            Expr::Operation(op, children) if op.arity() == 2 => &children[0],
            _ => panic!("left() on non-binary expression"),
        }
    }

    /// The right child of a binary operation.
    ///
    /// # Panics
    ///
    /// Panics if this is not a binary operation.
    pub fn right(&self) -> &Expr {
        match self {
            Expr::Operation(op, children) if op.arity() == 2 => &children[1],
            _ => panic!("right() on non-binary expression"),
        }
    }

    /// Collect the names of all variables referenced anywhere in this
    /// expression, including lookup-table inputs and matrix entries.
    pub fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Constant(_) => {}
            Expr::Variable(name) => {
                out.insert(name.clone());
            }
            Expr::Operation(_, children) => {
                for child in children {
                    child.collect_variables(out);
                }
            }
            Expr::Matrix(m) => {
                for entry in &m.data {
                    entry.collect_variables(out);
                }
            }
            Expr::Lut(lut) => {
                for input in &lut.inputs {
                    input.collect_variables(out);
                }
                for entry in &lut.data.data {
                    entry.collect_variables(out);
                }
            }
        }
    }

    /// The set of variables referenced in this expression.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    /// Check whether this expression references the given variable.
    pub fn references(&self, name: &str) -> bool {
        match self {
            Expr::Constant(_) => false,
            Expr::Variable(v) => v == name,
            Expr::Operation(_, children) => children.iter().any(|c| c.references(name)),
            Expr::Matrix(m) => m.data.iter().any(|c| c.references(name)),
            Expr::Lut(lut) => {
                lut.inputs.iter().any(|c| c.references(name))
                    || lut.data.data.iter().any(|c| c.references(name))
            }
        }
    }
}

/// An n-dimensional array of expressions.
///
/// Element order is fastest-varying-first-dimension (compatible with the
/// source tool's `reshape`): element `(i0, ..., ik)` lives at flat index
/// `i0 + d0*i1 + d0*d1*i2 + ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixExpr {
    /// Flat element storage.
    pub data: Vec<Expr>,
    /// Dimension widths, first dimension fastest-varying.
    pub dims: Vec<usize>,
}

impl MatrixExpr {
    /// Create a matrix from flat data and dimension widths.
    pub fn new(data: Vec<Expr>, dims: Vec<usize>) -> Result<Self, ShapeError> {
        if dims.is_empty() {
            return Err(ShapeError::NoDimensions);
        }
        let expected: usize = dims.iter().product();
        if data.len() != expected {
            return Err(ShapeError::DataLength {
                len: data.len(),
                dims,
            });
        }
        Ok(Self { data, dims })
    }

    /// Create a 1-dimensional matrix.
    pub fn from_row(data: Vec<Expr>) -> Self {
        let dims = vec![data.len()];
        Self { data, dims }
    }

    /// Create a 2-dimensional matrix from row literals (`[a, b ; c, d]`).
    /// Dimensions become `[rows, cols]`; storage is fastest-first, so the
    /// row index varies fastest in the flat data.
    pub fn from_rows(rows: Vec<Vec<Expr>>) -> Result<Self, ShapeError> {
        if rows.len() == 1 {
            let row = rows.into_iter().next().unwrap_or_default();
            return Ok(Self::from_row(row));
        }
        let nrows = rows.len();
        let ncols = rows.first().map(Vec::len).unwrap_or(0);
        for row in &rows {
            if row.len() != ncols {
                return Err(ShapeError::RaggedRows {
                    first: ncols,
                    other: row.len(),
                });
            }
        }
        let mut data = Vec::with_capacity(nrows * ncols);
        for col in 0..ncols {
            for row in &rows {
                data.push(row[col].clone());
            }
        }
        Self::new(data, vec![nrows, ncols])
    }

    /// Number of dimensions.
    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    /// Width of the given dimension.
    pub fn dim_width(&self, dim: usize) -> usize {
        self.dims[dim]
    }

    /// Dereference an element by multi-index, fastest-first order.
    ///
    /// # Panics
    ///
    /// Panics if the index rank or any coordinate is out of range.
    pub fn get(&self, index: &[usize]) -> &Expr {
        assert_eq!(
            index.len(),
            self.dims.len(),
            "matrix index rank {} does not match dimensions {:?}",
            index.len(),
            self.dims
        );
        let mut flat = 0;
        let mut stride = 1;
        for (coord, width) in index.iter().zip(&self.dims) {
            assert!(
                coord < width,
                "matrix index {:?} out of range for dimensions {:?}",
                index,
                self.dims
            );
            flat += coord * stride;
            stride *= width;
        }
        &self.data[flat]
    }
}

/// A lookup table: an n-dimensional piecewise-linear function sampled at the
/// breakpoint grid. `data.dims[i]` equals `breakpoints[i].len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct LutExpr {
    /// Input expressions, one per table dimension (usually plain variables).
    pub inputs: Vec<Expr>,
    /// Sampled values at the breakpoint grid.
    pub data: MatrixExpr,
    /// Breakpoint coordinates per dimension, strictly increasing.
    pub breakpoints: Vec<Vec<f64>>,
}

impl LutExpr {
    /// Create a lookup table, checking the grid shape.
    pub fn new(
        inputs: Vec<Expr>,
        data: MatrixExpr,
        breakpoints: Vec<Vec<f64>>,
    ) -> Result<Self, ShapeError> {
        if inputs.len() != breakpoints.len() {
            return Err(ShapeError::InputCount {
                inputs: inputs.len(),
                breakpoint_lists: breakpoints.len(),
            });
        }
        if data.num_dims() != breakpoints.len() {
            return Err(ShapeError::InputCount {
                inputs: data.num_dims(),
                breakpoint_lists: breakpoints.len(),
            });
        }
        for (dim, bp) in breakpoints.iter().enumerate() {
            if data.dim_width(dim) != bp.len() {
                return Err(ShapeError::BreakpointCount {
                    dim,
                    dim_width: data.dim_width(dim),
                    breakpoints: bp.len(),
                });
            }
            if bp.windows(2).any(|w| w[0] >= w[1]) {
                return Err(ShapeError::UnsortedBreakpoints { dim });
            }
        }
        Ok(Self {
            inputs,
            data,
            breakpoints,
        })
    }

    /// Number of table dimensions.
    pub fn num_dims(&self) -> usize {
        self.breakpoints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_precedence() {
        // Multiplication binds tighter than addition
        assert!(Operator::Multiply.precedence() > Operator::Add.precedence());
        // Addition binds tighter than comparison
        assert!(Operator::Add.precedence() > Operator::Equal.precedence());
        // Comparison binds tighter than and
        assert!(Operator::Equal.precedence() > Operator::And.precedence());
        // And binds tighter than or
        assert!(Operator::And.precedence() > Operator::Or.precedence());
    }

    #[test]
    fn test_matrix_dereference_order() {
        // reshape([1, 10, 100, 2, 20, 200], 3, 2) is the 3x2 matrix
        // [1 2 ; 10 20 ; 100 200]: the first dimension varies fastest.
        let m = MatrixExpr::new(
            [1.0, 10.0, 100.0, 2.0, 20.0, 200.0]
                .iter()
                .map(|v| Expr::number(*v))
                .collect(),
            vec![3, 2],
        )
        .unwrap();

        assert_eq!(*m.get(&[2, 0]), Expr::number(100.0));
        assert_eq!(*m.get(&[0, 1]), Expr::number(2.0));
        assert_eq!(*m.get(&[2, 1]), Expr::number(200.0));
    }

    #[test]
    fn test_matrix_from_rows_matches_reshape() {
        let rows = vec![
            vec![Expr::number(1.0), Expr::number(2.0)],
            vec![Expr::number(10.0), Expr::number(20.0)],
            vec![Expr::number(100.0), Expr::number(200.0)],
        ];
        let m = MatrixExpr::from_rows(rows).unwrap();
        assert_eq!(m.dims, vec![3, 2]);
        let flat: Vec<f64> = m
            .data
            .iter()
            .map(|e| match e {
                Expr::Constant(v) => *v,
                _ => f64::NAN,
            })
            .collect();
        assert_eq!(flat, vec![1.0, 10.0, 100.0, 2.0, 20.0, 200.0]);
    }

    #[test]
    fn test_matrix_shape_mismatch() {
        let err = MatrixExpr::new(vec![Expr::number(1.0)], vec![2, 2]);
        assert!(matches!(err, Err(ShapeError::DataLength { .. })));
    }

    #[test]
    fn test_lut_breakpoint_mismatch() {
        let data = MatrixExpr::from_row(vec![Expr::number(1.0), Expr::number(2.0)]);
        let err = LutExpr::new(vec![Expr::var("t")], data, vec![vec![0.0, 1.0, 2.0]]);
        assert!(matches!(err, Err(ShapeError::BreakpointCount { .. })));
    }

    #[test]
    fn test_collect_variables_in_lut() {
        let data = MatrixExpr::from_row(vec![Expr::number(1.0), Expr::var("k")]);
        let lut = LutExpr::new(
            vec![Expr::binary(Operator::Add, Expr::var("t"), Expr::number(1.0))],
            data,
            vec![vec![0.0, 1.0]],
        )
        .unwrap();
        let vars = Expr::Lut(Box::new(lut)).variables();
        assert!(vars.contains("t"));
        assert!(vars.contains("k"));
    }
}
