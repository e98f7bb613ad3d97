//! Subcommand implementations.

pub mod config;
pub mod control;
pub mod listen;
pub mod serve;
