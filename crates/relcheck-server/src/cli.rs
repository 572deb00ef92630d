use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "relcheck-server", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP check API (default).
    Serve,
    /// Print a new API key and the config entry that enables it.
    GenerateApiKey,
    /// Parse and validate a model file without starting the server.
    ValidateModel {
        #[arg(long)]
        file: PathBuf,
    },
}
