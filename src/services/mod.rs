//! Business logic services.
//!
//! `control_family`, `resolver`, `aggregator` and `recommendation` are pure
//! functions over in-memory data; the rest wrap them with persistence.

pub mod aggregator;
pub mod catalog;
pub mod compliance;
pub mod control_family;
pub mod finding;
pub mod fingerprint;
pub mod ingestion;
pub mod recommendation;
pub mod report;
pub mod resolver;
pub mod system;
