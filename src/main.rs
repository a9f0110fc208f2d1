use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use stgen::cli::Cli;
use stgen::dispatch::Generator;
use stgen::frontend;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let mut generator = Generator::new(args.to_config());

    let stdin = std::io::stdin();
    frontend::run_stream(&mut generator, stdin.lock())
        .context("processing primitive stream")?;
    generator.finish().context("finalizing trace run")?;

    Ok(())
}
