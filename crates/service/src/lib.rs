//! Project lock service: the lock manager, the revoker-rights registry, and
//! the storage seam they run on.
//!
//! Every operation takes the store explicitly (`&S where S: LockStore`), so
//! the same manager drives PostgreSQL in production and [`MemoryLockStore`]
//! in tests.

pub mod config;
pub mod error;
pub mod manager;
pub mod rights;
pub mod store;
pub mod wait;

pub use config::{DbConfig, LockConfig};
pub use error::{LockError, LockResult};
pub use manager::{LockListing, LockManager};
pub use rights::RevokerRightsRegistry;
pub use store::memory::MemoryLockStore;
pub use store::postgres::PgLockStore;
pub use store::LockStore;
