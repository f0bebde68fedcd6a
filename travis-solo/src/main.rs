mod commands;
mod output;

use clap::Parser;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

/// Local Travis build runner
#[derive(Parser, Debug)]
#[command(name = "travis-solo")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    run: commands::run::RunArgs,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = commands::run::execute(cli.run).await?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
