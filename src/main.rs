//! `sonicvault` command-line entry point.

use sonicvault::{cli, logging};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let console = cli::take_console_level(&mut args);
    let Some(command) = cli::parse_args(args)? else {
        return Ok(());
    };
    if let Err(err) = logging::init(command.name(), console) {
        eprintln!("Logging disabled: {err}");
    }
    let _run = tracing::info_span!("run", command = command.name()).entered();
    cli::run(command)
}
