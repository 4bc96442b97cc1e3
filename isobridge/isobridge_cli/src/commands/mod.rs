//! Subcommand implementations.

pub mod domains;
pub mod inspect;
