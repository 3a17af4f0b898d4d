//! Pass-level error type.

use hybra_ir::{ExportError, ValidationError};
use thiserror::Error;

/// A failure raised by a transformation pass.
///
/// `Precondition` is the expected, caller-recoverable kind: the automaton
/// does not match the pass's required shape, checked up front and reported
/// before any mutation occurs. The other kinds indicate an unsupported
/// construct or a model-integrity violation and are fatal for the pass.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("simulation oracle error: {0}")]
    Oracle(String),
}

pub type PassResult<T> = Result<T, PassError>;
