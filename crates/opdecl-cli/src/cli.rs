use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "opdecl",
    about = "opdecl: replay operator declaration manifests against an in-memory registry",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a manifest and report every accepted or rejected declaration
    Check {
        /// Path to the manifest TOML
        manifest: String,

        /// Registry config TOML
        #[arg(long)]
        config: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Log registrations to stderr
        #[arg(long, short)]
        verbose: bool,
    },

    /// Replay a manifest and print the resulting registry state and digest
    Snapshot {
        /// Path to the manifest TOML
        manifest: String,

        /// Registry config TOML
        #[arg(long)]
        config: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
