//! Command-line interface for updraft.
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`context`] - Configuration and cancellation shared by commands
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;
pub mod context;

pub use args::{
    CheckArgs, Cli, Commands, CompletionsArgs, DownloadArgs, InstallArgs, UpdateArgs,
};
pub use commands::{Command, CommandDispatcher, CommandResult};
pub use context::CommandContext;
