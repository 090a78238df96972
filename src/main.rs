use anyhow::Result;
use clap::Parser;
use scan_triage::cli;
use tracing::error;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        // Config errors surface before a subscriber exists.
        if tracing::dispatcher::has_been_set() {
            error!("{:#}", err);
        } else {
            eprintln!("error: {:#}", err);
        }
        std::process::exit(1);
    }
    Ok(())
}
