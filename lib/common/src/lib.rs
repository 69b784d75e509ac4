mod error;
mod ids;
mod value_id;

pub use error::KernelError;
pub use ids::{EntityId, Score, TextRecordId, WordId};
pub use value_id::ValueId;

pub type DFResult<T> = datafusion::error::Result<T>;

/// Result alias for kernel operations that can only fail on violated preconditions.
pub type KernelResult<T> = Result<T, KernelError>;
