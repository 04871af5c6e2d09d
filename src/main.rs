use std::fs;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use toml::Table;

use mesi_l1::sim::config::{Config, L1Config, SimConfig};
use mesi_l1::timeq::Cycle;
use mesi_l1::traffic::config::TrafficConfig;
use mesi_l1::traffic::ScenarioDriver;

#[derive(Parser)]
#[command(version, about)]
struct MesiArgs {
    #[arg(help = "Path to scenario.toml")]
    scenario_path: PathBuf,
    #[arg(long, help = "Enable log at level (0:none, 1:info, 2:debug)")]
    log: Option<u64>,
    #[arg(long, help = "Override the cycle limit")]
    timeout: Option<Cycle>,
    #[arg(long, help = "Write the run summary as JSON")]
    json: Option<PathBuf>,
}

fn init_logger(level: u64) {
    let filter = match level {
        0 => "off",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

pub fn main() -> anyhow::Result<()> {
    let argv = MesiArgs::parse();
    let text = fs::read_to_string(&argv.scenario_path)
        .with_context(|| format!("failed to read {}", argv.scenario_path.display()))?;
    let table: Table = toml::from_str(&text).context("cannot parse scenario toml")?;

    let file_level = table
        .get("sim")
        .and_then(|sim| sim.get("log_level"))
        .and_then(|level| level.as_integer())
        .map(|level| level.max(0) as u64);
    init_logger(argv.log.or(file_level).unwrap_or(0));

    let mut sim_config = SimConfig::try_from_section(table.get("sim")).context("bad [sim] section")?;
    let l1_config = L1Config::try_from_section(table.get("l1")).context("bad [l1] section")?;
    let traffic_config =
        TrafficConfig::try_from_section(table.get("traffic")).context("bad [traffic] section")?;

    // override toml configs with argv
    sim_config.log_level = argv.log.unwrap_or(sim_config.log_level);
    sim_config.timeout = argv.timeout.unwrap_or(sim_config.timeout);

    let mut driver = ScenarioDriver::new(&sim_config, l1_config, &traffic_config)?;
    driver.run()?;
    driver
        .cache()
        .print_stats(&mut io::stdout().lock())
        .context("cannot print stats")?;

    let json_path = argv
        .json
        .or_else(|| traffic_config.results_json.as_ref().map(PathBuf::from));
    if let Some(path) = json_path {
        let file = fs::File::create(&path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), driver.report())
            .context("cannot write json summary")?;
    }
    Ok(())
}
