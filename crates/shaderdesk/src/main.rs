mod cli;
mod preview;
mod run;
mod session;
mod watcher;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Export) => run::run_export(cli.run),
        None => run::run(cli.run),
    }
}
