//! Repositories over the queue tables.
//!
//! Admission inserts run inside a transaction that performs the uniqueness
//! lookups first, so the check and the insert observe the same state.

mod conversion;
mod deletion;

pub use conversion::{ConversionRepository, SqlxConversionRepository};
pub use deletion::{DeletionRepository, SqlxDeletionRepository};
