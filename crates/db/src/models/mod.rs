//! Row structs and insert DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO used by the repository insert

pub mod project_lock;
pub mod revoker_right;
