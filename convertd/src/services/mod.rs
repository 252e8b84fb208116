//! Service construction.

mod container;

pub use container::ServiceContainer;
