//! Record Store: durable CRUD over validated records, partitioned by
//! kind, with indexed list queries behind the read cache.

mod backend;
mod engine;
mod errors;
mod query;

pub use backend::{BackendError, FileBackend, MemoryBackend, StorageBackend};
pub use engine::MemStore;
pub use errors::{StoreError, StoreResult};
pub use query::{ListQuery, Page, SortOrder, TimeRange};
