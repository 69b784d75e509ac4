use datafusion::error::DataFusionError;
use thiserror::Error;

/// A violated precondition of a kernel operation.
///
/// These are contract errors reported at call entry. The kernel never retries or
/// recovers; propagation is direct to the caller. Empty inputs are *not* errors, they
/// short-circuit to empty outputs.
#[derive(Debug, Error, PartialEq, Eq, Hash)]
pub enum KernelError {
    #[error("column `{column}` has length {actual}, expected {expected}")]
    ColumnLengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("context ids decrease at position {index}")]
    UnsortedContexts { index: usize },
    #[error("expected exactly {expected} word column(s), found {actual}")]
    WordColumnMismatch { expected: usize, actual: usize },
    #[error("k-way intersection requires at least one posting list")]
    NoInputLists,
    #[error("entity column has length {actual}, but the last list has {expected} postings")]
    EntityColumnMismatch { expected: usize, actual: usize },
    #[error("row has {actual} values, but the table has {expected} columns")]
    RowArityMismatch { expected: usize, actual: usize },
    #[error(
        "enumerating {nof_vars}-tuples over {entities} entities exceeds the limit of {limit} tuples per context"
    )]
    TupleFanOutExceeded {
        entities: usize,
        nof_vars: usize,
        limit: usize,
    },
}

impl From<KernelError> for DataFusionError {
    fn from(error: KernelError) -> Self {
        DataFusionError::External(Box::new(error))
    }
}
