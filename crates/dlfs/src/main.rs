// CLI modules
mod cli;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Deploy, Init, Mirror, Version};

command_enum! {
    (Deploy, Deploy),
    (Init, Init),
    (Mirror, Mirror),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match run(args).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<String> {
    // falls back to built-in defaults when there is no config file
    let ctx = cli::op::OpContext::new(args.config_path).context("failed to load config")?;

    let log_level = args
        .log_level
        .map(|level| level.to_string())
        .unwrap_or_else(|| ctx.config.log_level.clone());
    // dropped on return, which flushes buffered log lines
    let _guard = cli::logging::init_logging(&log_level);

    let output = args.command.execute(&ctx).await?;
    Ok(output.to_string())
}
