//! Persistence backends for short links.
//!
//! The store is the single source of truth. Both backends enforce code
//! uniqueness at insert time and never hand a code out twice, even after
//! the link has been soft-deleted.

pub mod memory;
pub mod mysql;

pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use portal_core::repository::{ReadRepository, Repository, Result};
pub use portal_core::StorageError;
