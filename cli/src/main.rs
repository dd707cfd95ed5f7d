mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{inspect, run as run_cmd, table};

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::Run(args) => run_cmd::run(&cli, args),
        Commands::Inspect(args) => inspect::run(&cli, args),
        Commands::Table(args) => table::run(&cli, args),
    }
}

/// `-v` enables info, `-vv` debug; `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> anyhow::Result<()> { run() }
