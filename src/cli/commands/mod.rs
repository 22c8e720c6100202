//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations and hands each one the shared
//! [`CommandContext`](crate::cli::CommandContext).

pub mod check;
pub mod completions;
pub mod dispatcher;
pub mod download;
pub mod install;
pub mod staging;
pub mod update;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
