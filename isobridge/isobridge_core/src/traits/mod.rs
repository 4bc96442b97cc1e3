//! Core traits.

pub mod target;

pub use target::HandleTarget;
