//! Row models for the two work queues.

mod conversion;
mod deletion;

pub use conversion::{ConversionEntry, ConversionInfo, TargetFormat};
pub use deletion::{DeletionEntry, DeletionInfo};

use serde::{Deserialize, Serialize};

/// Lifecycle status of a queue entry.
///
/// `Done` and `Canceled` are terminal; rows in terminal status are never
/// popped again and do not block re-admission of the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum EntryStatus {
    Pending = 0,
    Done = 1,
    Canceled = 2,
}

impl EntryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }
}
