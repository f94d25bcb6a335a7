//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod project_lock_repo;
pub mod revoker_rights_repo;

pub use project_lock_repo::ProjectLockRepo;
pub use revoker_rights_repo::RevokerRightsRepo;
