mod cli;
mod data;
mod error;
mod report;
mod session;

use clap::Parser;

use cli::Cli;

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = cli::run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
