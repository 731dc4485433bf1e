use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use log::info;

mod apps;
mod config;
mod topology;

use config::SimConfig;
use topology::Simulation;

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("udcn-sim")
        .version("0.1.0")
        .about("UDCN Simulator - run NDN forwarders over a virtual topology")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Scenario file path")
                .required(true),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration-ms")
                .value_name("MS")
                .help("Override the scenario duration")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the report as JSON")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .context("missing --config")?;
    let mut config = SimConfig::load(config_path)
        .with_context(|| format!("failed to load scenario {}", config_path))?;
    if let Some(duration_ms) = matches.get_one::<u64>("duration") {
        config.duration_ms = *duration_ms;
    }

    info!("Loaded scenario {}", config_path);
    let report = Simulation::new(&config)?.run();

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
