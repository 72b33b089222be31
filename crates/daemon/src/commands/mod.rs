//! Daemon subcommands.

pub mod codec;
pub mod compare;
pub mod config;
pub mod replay;
