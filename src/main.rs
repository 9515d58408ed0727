//! `archiver` binary. All logic lives in `archiver-cli`; this only parses
//! arguments and maps the resulting exit code to the process exit status.

use clap::Parser;

fn main() {
    let cli = archiver::Cli::parse();
    std::process::exit(archiver::run(cli));
}
