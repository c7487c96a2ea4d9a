use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge this host to a declared set of packages, files and services", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace); also streams command output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Declaration file (JSON, or TOML by extension)
    #[arg(
        short,
        long,
        global = true,
        env = "CONVERGE_CONFIG",
        default_value = "config.json"
    )]
    pub config: PathBuf,

    /// Defaults to `apply`
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the host to the declaration
    Apply(ApplyArgs),

    /// Probe the host and show what `apply` would change
    Plan(RunArgs),

    /// Check the declaration without touching the host
    Validate {
        /// Print the resolved tasks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Clone, Default)]
pub struct ApplyArgs {
    /// Report changes without making them (same as `plan`)
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Clone, Default)]
pub struct RunArgs {
    /// Run mutating commands without sudo
    #[arg(long)]
    pub no_sudo: bool,

    /// Kill any single command running longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}
