//! Transformation passes over the hybrid-automaton IR.
//!
//! Each pass receives a [`Configuration`](hybra_ir::Configuration), checks
//! its preconditions before mutating anything, and leaves the model
//! validation-clean on success. Precondition mismatches are reported as
//! [`PassError::Precondition`] with the original configuration untouched.

pub mod continuization;
pub mod delete_params;
pub mod error;
pub mod lut_flows;
pub mod oracle;

pub use continuization::ContinuizationPassTT;
pub use error::{PassError, PassResult};
pub use oracle::{FixedRangeOracle, RangeOracle};
