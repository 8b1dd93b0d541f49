//! CLI command implementations.

pub mod scenarios;
pub mod suite;
