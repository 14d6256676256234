use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

use clap::Parser;
use icnlib::config::SimulationConfig;
use icnlib::io::get_reader;
use icnlib::network::NetworkView;
use icnlib::simulator::Simulator;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Replays a content request trace through an ICN caching and routing strategy"))]
struct Args {
    /// JSON simulation configuration: topology, strategy and cache policy
    config: String,
    /// Request trace, one `time receiver content [log]` request per line
    trace: String,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let config_file = File::open(&args.config).map_err(|e| format!("Couldn't open the config file at path {}: {e}", args.config))?;
    let config: SimulationConfig = serde_json::from_reader(BufReader::new(config_file)).map_err(|e| format!("Couldn't parse the config file: {e}"))?;
    let mut simulator = Simulator::new(&config).map_err(|e| format!("Couldn't set up the simulation: {e}"))?;
    let trace_file = File::open(&args.trace).map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    let trace_len = trace_file.metadata().map_err(|e| format!("Couldn't read the trace file metadata: {e}"))?.len();
    // Empty files can't be memory mapped
    let result = if trace_len == 0 {
        warn!(path = %args.trace, "the trace is empty");
        simulator.summary()
    } else {
        let trace_reader = BufReader::new(get_reader(trace_file)?);
        simulator.simulate_trace(trace_reader).map_err(|e| format!("Simulation failed: {e}"))?
    };
    info!(
        strategy = simulator.strategy_name(),
        events = simulator.processed_events(),
        requests = result.requests,
        cache_hit_ratio = result.cache_hit_ratio,
        "simulation finished"
    );
    println!("{}", serde_json::to_string_pretty(&result).map_err(|e| format!("Couldn't serialise the output {e}"))?);
    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Strategy: {}", simulator.strategy_name());
        println!("Requests processed (warm-up included): {}", simulator.processed_events());
        let network = simulator.network();
        let occupancy = network
            .topology()
            .cache_nodes()
            .into_iter()
            .map(|node| format!("{node}: {}", network.cache_dump(node).len()))
            .reduce(|a, b| format!("{a}, {b}"))
            .unwrap_or_default();
        println!("Cached contents by node: ({occupancy})");
    }
    Ok(())
}
