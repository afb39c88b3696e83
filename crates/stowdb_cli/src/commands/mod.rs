//! CLI command implementations.

pub mod buckets;
pub mod dump;
pub mod registry;
