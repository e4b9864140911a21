use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::{error::Result, event::Event};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "pg")]
mod pg;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "memory")]
pub use memory::*;
#[cfg(feature = "pg")]
pub use pg::*;
#[cfg(feature = "sqlite")]
pub use sqlite::*;

/// Storage access used by [`Store`](crate::Store).
///
/// Adapters report a missing event table through [`Engine::table_exists`] and
/// map their driver's "missing table" failures to
/// [`StoreError::TableAbsent`](crate::StoreError::TableAbsent). Every other
/// failure is returned as is.
#[async_trait]
pub trait Engine: DynClone + Send + Sync {
    async fn table_exists(&self, table: &'_ str) -> Result<bool>;

    /// Creates the event table if it does not exist yet.
    async fn create_table(&self, table: &'_ str) -> Result<()>;

    /// Whether rows carry an identity usable to order equal timestamps.
    async fn has_identity(&self, table: &'_ str) -> Result<bool>;

    async fn add_identity(&self, table: &'_ str) -> Result<()>;

    async fn insert(&self, table: &'_ str, events: Vec<Event>) -> Result<()>;

    /// Events of `context`, ascending by time then identity.
    async fn read(&self, table: &'_ str, context: &'_ str) -> Result<Vec<Event>>;

    /// Value stored under `key` in a legacy key/value table, `None` when the
    /// table or the row is missing.
    async fn read_legacy(&self, table: &'_ str, key: &'_ str) -> Result<Option<String>>;
}

dyn_clone::clone_trait_object!(Engine);
