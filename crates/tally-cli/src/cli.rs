use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tally",
    about = "Tally: proof-of-work blocks on a shared origin",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Miner configuration file (TOML). `TALLY_*` variables override it.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an origin holding only a genesis block
    Genesis(GenesisArgs),
    /// Attach the mirror to its origin, bootstrapping a new chain
    Init,
    /// Mine the working directory into a block and push it
    Commit(CommitArgs),
    /// Show the mirror's chain
    Status,
    /// Show one block
    Show(ShowArgs),
    /// Check difficulty and link windows from tip back to genesis
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct GenesisArgs {
    /// Directory for the new origin; defaults to the configured origin
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct CommitArgs {
    #[arg(short, long)]
    pub message: String,
}

#[derive(Args)]
pub struct ShowArgs {
    pub hash: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Block to verify from; defaults to the branch tip
    #[arg(long)]
    pub tip: Option<String>,
}
