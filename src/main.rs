use backtrace::Backtrace;
use clap::{value_parser, Arg, ArgAction, Command};
use tracing::error;

use std::path::PathBuf;

mod agent;
mod common;
mod config;
mod ethtool;
mod sender;

use config::Config;

fn main() {
    // custom panic hook to terminate whole process after unwinding
    std::panic::set_hook(Box::new(|s| {
        eprintln!("{s}");
        eprintln!("{:?}", Backtrace::new());
        std::process::exit(101);
    }));

    let config = match Config::try_from(command().get_matches()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error loading config: {error}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(config.log().level()))
        .with_target(false)
        .init();

    if let Err(e) = ctrlc::set_handler(move || {
        std::process::exit(2);
    }) {
        eprintln!("failed to set ctrl-c handler: {e}");
        std::process::exit(1);
    }

    if let Err(e) = agent::run(config) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

pub fn command() -> Command {
    Command::new(env!("CARGO_BIN_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_about(
            "Reports NIC driver statistics from `ethtool -S` to a local spectatord. \
             Command line flags take precedence over the configuration file.",
        )
        .arg(
            Arg::new("CONFIG")
                .help("Agent configuration file")
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Set)
                .index(1),
        )
        .arg(
            Arg::new("IFACES")
                .long("ifaces")
                .help("Comma separated list of interfaces to query")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("ADDRESS")
                .long("address")
                .help("hostname:port where spectatord is listening")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("FREQUENCY")
                .long("frequency")
                .help("Collect metrics at this frequency")
                .action(ArgAction::Set)
                .value_parser(value_parser!(humantime::Duration)),
        )
        .arg(
            Arg::new("ETHTOOL")
                .long("ethtool")
                .help("Path to the ethtool binary")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("TIMEOUT")
                .long("timeout")
                .help("Deadline for reading the statistics of one interface")
                .action(ArgAction::Set)
                .value_parser(value_parser!(humantime::Duration)),
        )
        .arg(
            Arg::new("VERBOSE")
                .long("verbose")
                .short('v')
                .help("Increase the verbosity")
                .action(ArgAction::Count),
        )
}
