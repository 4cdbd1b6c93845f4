//! Shared test utilities for integration tests.

pub mod builders;
pub mod cluster;

pub use builders::*;
pub use cluster::{Deletion, SyncingCluster};
