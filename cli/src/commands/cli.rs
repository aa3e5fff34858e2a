use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "procrelay", about = "HTTP bridge for a line-oriented engine CLI")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP server (the default when no subcommand is given).
    Serve(ServeArgs),
    /// Print the engine's installed capabilities and exit.
    Skills,
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Serve(ServeArgs::default())
    }
}

#[derive(Debug, Default, ClapArgs)]
pub struct ServeArgs {
    /// Listening port; overrides config and environment.
    #[arg(long)]
    pub port: Option<u16>,

    /// Listening host; overrides config and environment.
    #[arg(long)]
    pub host: Option<String>,

    /// Path to a config.toml (default: ./config.toml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,
}
