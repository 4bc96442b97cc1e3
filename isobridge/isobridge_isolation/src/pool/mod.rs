//! Worker pools.

pub mod teardown;

pub use teardown::{PoolError, TeardownPool, TeardownStats};
