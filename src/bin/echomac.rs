use std::process::ExitCode;

use clap::Parser;
use echomac::Config;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        // stdout carries only the MAC address.
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Config::parse();

    match echomac::run(&config) {
        Ok(mac_addr) => {
            println!("{}", mac_addr);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {}", config.target, err);
            ExitCode::FAILURE
        }
    }
}
