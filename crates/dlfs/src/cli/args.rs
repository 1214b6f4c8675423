pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dlfs")]
#[command(about = "Deploy directories to Chia DataLayer stores and mirror them")]
pub struct Args {
    /// Path to the dlfs config directory (defaults to ~/.dlfs)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset (defaults to the config file's)
    #[arg(long, global = true)]
    pub log_level: Option<tracing::Level>,

    #[command(subcommand)]
    pub command: crate::Command,
}
