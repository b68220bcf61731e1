// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, set up logging, hand over to the UI.
// - Start-up failures (no QR session, credential file not writable) end
//   the process with a non-zero status.

use clap::Parser;
use dodo_link::{config::Cli, ui};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with the prompt on stdout.
    let default_filter = if cli.verbose { "dodo_link=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    ui::run(&cli)
}
