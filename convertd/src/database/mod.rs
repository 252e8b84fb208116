//! Persistence layer: pool construction, row models, repositories.

pub mod db;
pub mod models;
pub mod repositories;

pub use db::{DbError, create_pool};
