pub mod error;
pub mod locking;
pub mod mask;
pub mod types;
