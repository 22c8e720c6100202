//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Updraft - self-updating for desktop executables.
#[derive(Debug, Parser)]
#[command(name = "updraft")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides the user config location)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check whether a newer release is available
    Check(CheckArgs),

    /// Download an artifact into the staging folder
    Download(DownloadArgs),

    /// Replace the running executable with the staged artifact
    Install(InstallArgs),

    /// Check, download and install in one go
    Update(UpdateArgs),

    /// Print the path of the staged artifact
    Path,

    /// Remove the staging folder
    Cleanup,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CheckArgs {
    /// Repository to check (`owner/name` or URL); defaults to the configured one
    pub repo: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `download` command.
#[derive(Debug, Clone, clap::Args)]
pub struct DownloadArgs {
    /// HTTPS URL of the artifact
    pub url: String,

    /// Expected SHA-256 of the artifact (hex)
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,
}

/// Arguments for the `install` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct InstallArgs {
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the `update` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct UpdateArgs {
    /// Repository to update from; defaults to the configured one
    pub repo: Option<String>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_check_with_repo_and_json() {
        let cli = Cli::parse_from(["updraft", "check", "acme/player", "--json"]);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.repo.as_deref(), Some("acme/player"));
                assert!(args.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["updraft", "cleanup", "--debug", "--quiet"]);
        assert!(cli.debug);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Cleanup));
    }

    #[test]
    fn download_requires_url() {
        assert!(Cli::try_parse_from(["updraft", "download"]).is_err());
    }

    #[test]
    fn parses_update_yes() {
        let cli = Cli::parse_from(["updraft", "update", "-y"]);
        match cli.command {
            Commands::Update(args) => {
                assert!(args.yes);
                assert!(args.repo.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["updraft"]).is_err());
    }
}
