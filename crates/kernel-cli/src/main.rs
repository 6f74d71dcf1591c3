use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use contracts::{PopulationSnapshot, SimConfig};
use kernel_core::HouseholdModel;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("hhsim <command>");
    println!("commands:");
    println!("  run [config.json] [snapshots.jsonl]");
    println!("    runs the household model to its horizon; snapshots go to stdout when no path is given");
    println!("  default-config");
    println!("    prints the built-in configuration as json");
    println!("  network-report [config.json]");
    println!("    builds the population and network only and prints their summary");
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn load_config(path: Option<&String>) -> Result<SimConfig, String> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let raw = fs::read_to_string(path).map_err(|err| format!("failed to read {path}: {err}"))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid config {path}: {err}"))
}

fn write_snapshots<W: Write>(out: &mut W, snapshots: &[PopulationSnapshot]) -> Result<(), String> {
    for snapshot in snapshots {
        let line = serde_json::to_string(snapshot)
            .map_err(|err| format!("failed to encode snapshot {}: {err}", snapshot.seq))?;
        writeln!(out, "{line}").map_err(|err| format!("failed to write snapshot: {err}"))?;
    }
    Ok(())
}

fn run_model(args: &[String]) -> Result<(), String> {
    let config = load_config(args.get(2))?;
    let mut model = HouseholdModel::new(config).map_err(|err| err.to_string())?;

    let mut sink: Box<dyn Write> = match args.get(3) {
        Some(path) => Box::new(BufWriter::new(
            File::create(Path::new(path)).map_err(|err| format!("failed to create {path}: {err}"))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    // drain at every statistics firing so memory stays flat on long runs
    let mut exported = 0usize;
    while model.step() {
        let snapshots = model.drain_snapshots();
        exported += snapshots.len();
        write_snapshots(&mut sink, &snapshots)?;
    }
    model.run();
    let snapshots = model.drain_snapshots();
    exported += snapshots.len();
    write_snapshots(&mut sink, &snapshots)?;
    sink.flush().map_err(|err| format!("failed to flush snapshots: {err}"))?;

    let counters = model.counters();
    if counters.terminated_streams > 0 {
        warn!(terminated = counters.terminated_streams, "some streams ended early");
    }
    info!(exported, "snapshots written");
    eprintln!("{}", model.status());
    Ok(())
}

fn network_report(args: &[String]) -> Result<(), String> {
    let config = load_config(args.get(2))?;
    let model = HouseholdModel::new(config).map_err(|err| err.to_string())?;
    let store = model.store();
    let stats = model.connect_stats();
    let households = store.household_count();
    let mean_degree = if households == 0 {
        0.0
    } else {
        2.0 * store.network.edge_count() as f64 / households as f64
    };
    println!(
        "households={} persons={} attractors={} edges={} lattice_degree={} mean_degree={:.3}",
        households,
        store.person_count(),
        store.attractor_count(),
        store.network.edge_count(),
        model.network_degree(),
        mean_degree
    );
    println!(
        "requested={} linked={} shortfall={} shortfall_rate={:.4} rewired={} rewire_failed={} zero_weight={}",
        stats.requested_links,
        stats.lattice_links,
        stats.lattice_shortfall,
        stats.shortfall_rate(),
        stats.rewired,
        stats.rewire_failed,
        stats.zero_weight
    );
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);
    init_logging();

    let result = match command {
        Some("run") => run_model(&args),
        Some("default-config") => serde_json::to_string_pretty(&SimConfig::default())
            .map(|json| println!("{json}"))
            .map_err(|err| format!("failed to encode config: {err}")),
        Some("network-report") => network_report(&args),
        _ => {
            print_usage();
            return;
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        print_usage();
        std::process::exit(2);
    }
}
