// FILE: crates/cli/src/main.rs

use anyhow::Result;
use clap::{Arg, ArgAction, Command};

mod commands;
mod setup;

fn build_cli() -> Command {
    Command::new("timershare")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Shared countdown timers kept in sync across devices")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml (defaults to the platform config dir)")
                .global(true),
        )
        .arg(
            Arg::new("endpoint")
                .short('e')
                .long("endpoint")
                .value_name("URL")
                .help("Overrides remote.endpoint for this run")
                .global(true),
        )
        .subcommand(Command::new("init").about("Write a default config file"))
        .subcommand(
            Command::new("status")
                .about("Pull the shared document and list active timers")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print timers as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("set")
                .about("Start or restart a timer and push it")
                .arg(Arg::new("key").required(true).value_name("KEY").help("Timer key"))
                .arg(
                    Arg::new("duration")
                        .required(true)
                        .value_name("DURATION")
                        .help("Countdown length, e.g. 90, 90s, 5m, 1h30m"),
                )
                .arg(Arg::new("phase").short('p').long("phase").value_name("PHASE").help("Predicted phase id"))
                .arg(Arg::new("display").short('l').long("label").value_name("LABEL").help("Predicted phase label")),
        )
        .subcommand(
            Command::new("watch")
                .about("Keep syncing and reprint the timers until Ctrl-C")
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("DURATION")
                        .help("Refresh interval")
                        .default_value("5s"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run two in-process devices against an in-memory store")
                .arg(Arg::new("latency").long("latency").value_name("DURATION").default_value("50ms"))
                .arg(Arg::new("debounce").long("debounce").value_name("DURATION").default_value("1s")),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let manager = setup::config_manager(matches.get_one::<String>("config-dir"))?;
    if let Some(("init", _)) = matches.subcommand() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        return commands::init(&manager);
    }

    let config = setup::load_config(&manager, matches.get_one::<String>("endpoint"))?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.app.log_level.to_string()),
    )
    .init();

    match matches.subcommand() {
        Some(("status", sub_matches)) => commands::status(&config, sub_matches).await,
        Some(("set", sub_matches)) => commands::set(&config, sub_matches).await,
        Some(("watch", sub_matches)) => commands::watch(&config, sub_matches).await,
        Some(("simulate", sub_matches)) => commands::simulate(&config, sub_matches).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
