use anyhow::Result;
use clap::{Arg, ArgAction, Command};

use sysfeed::commands;

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Read configuration from FILE instead of the default location")
}

fn main() -> Result<()> {
    sysfeed::init_logging();

    let matches = Command::new("sysfeed")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Streams host metrics and a CPU usage forecast over WebSocket")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Sample metrics and broadcast them to connected observers")
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST")
                        .help("Address to listen on"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .help("Port to listen on (0 picks a free port)")
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("MS")
                        .help("Milliseconds to wait between updates")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Collect one snapshot and print it as JSON")
                .arg(
                    Arg::new("pretty")
                        .long("pretty")
                        .help("Pretty-print the JSON output")
                        .action(ArgAction::SetTrue),
                )
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("config")
                .about("Show the effective configuration")
                .arg(
                    Arg::new("path")
                        .long("path")
                        .help("Print the default config file location instead")
                        .action(ArgAction::SetTrue),
                )
                .arg(config_arg()),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("serve", sub_matches)) => commands::serve(sub_matches),
        Some(("snapshot", sub_matches)) => commands::snapshot(sub_matches),
        Some(("config", sub_matches)) => commands::config(sub_matches),
        _ => {
            println!("Use 'sysfeed --help' for more information.");
            Ok(())
        }
    }
}
