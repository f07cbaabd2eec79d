//! Subcommand implementations.

pub mod embed;
pub mod extract;
pub mod inspect;
