//! Domain models and database row types.

pub mod catalog;
pub mod compliance;
pub mod finding;
pub mod pagination;
pub mod system;
