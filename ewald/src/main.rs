use ewald::{ScenarioConfig, Scenario, NVec3, potential_energy};
use ewald::bench_ewald;

use anyhow::{Context, Result};
use clap::Parser;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, default_value = "rock_salt.yaml")]
    file_name: String,

    /// time the real and wave parts for growing body counts instead
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name);
    let file = File::open(&config_path).with_context(|| format!("opening {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)
        .with_context(|| format!("parsing {}", config_path.display()))?;

    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.bench {
        bench_ewald();
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let mut scenario = Scenario::build_scenario(scenario_cfg)?;

    let tree = scenario.ewald.evaluate(&mut scenario.bodies, scenario.ncrit);
    log::info!("tree: {} cells, {} leaves", tree.cells.len(), tree.leaves().count());

    // report in input order
    scenario.bodies.sort_by_key(|b| b.ibody);
    let n = scenario.bodies.len();
    let energy = potential_energy(&scenario.bodies);
    let net_force = scenario.bodies.iter().fold(NVec3::zeros(), |f, b| f - b.gradient() * b.q);

    println!("bodies        : {n}");
    println!("energy        : {energy:.12e}");
    println!("energy / body : {:.12e}", energy / n as f64);
    println!("net force     : {:.3e}", net_force.norm());
    for b in scenario.bodies.iter().take(4) {
        println!("  body {:4}  q = {:+.3}  phi = {:+.10e}", b.ibody, b.q, b.potential());
    }

    Ok(())
}
