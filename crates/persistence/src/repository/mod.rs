//! Repository implementations for database operations

pub mod discovery;

pub use discovery::*;
