//! Multi-Core Pipeline Simulator CLI.
//!
//! The main executable for the simulator. It collects configuration from
//! the TOML simulator config, the cache config file, and command-line
//! overrides, loads the assembly program, runs the simulation to
//! completion, and emits the state dump, the statistics report, and the
//! per-core pipeline trace CSVs.

use clap::Parser;
use std::process;

use riscv_multicore_sim::config::{CacheParams, SimConfig};
use riscv_multicore_sim::sim::Simulator;

/// Command-line arguments for the multi-core pipeline simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "Cycle-accurate multi-core pipeline simulator")]
struct Args {
    /// Assembly program to simulate.
    program: String,

    #[arg(short, long, default_value = "sim_config.toml")]
    config: String,

    /// Cache hierarchy config file (KEY=value lines); overrides the path
    /// named in the simulator config.
    #[arg(long)]
    cache_config: Option<String>,

    /// Number of cores; overrides the simulator config.
    #[arg(long)]
    cores: Option<usize>,

    /// Enable or disable operand forwarding; overrides the simulator config.
    #[arg(long)]
    forwarding: Option<bool>,

    /// Per-cycle stage logging on stderr.
    #[arg(long)]
    trace: bool,

    /// Directory for the pipeline_core<id>.csv trace files.
    #[arg(long)]
    trace_dir: Option<String>,
}

fn main() {
    let args = Args::parse();

    let mut config = match SimConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => fatal(&e.to_string()),
    };
    if let Some(cores) = args.cores {
        config.general.num_cores = cores;
    }
    if let Some(forwarding) = args.forwarding {
        config.general.forwarding = forwarding;
    }
    if args.trace {
        config.general.trace = true;
    }
    if let Some(dir) = args.trace_dir {
        config.general.trace_dir = dir;
    }

    let cache_path = args
        .cache_config
        .unwrap_or_else(|| config.general.cache_config.clone());
    let cache_params = match CacheParams::load(&cache_path) {
        Ok(params) => params,
        Err(e) => fatal(&e.to_string()),
    };

    println!("Global Configuration");
    println!("--------------------");
    println!("  Cores:              {}", config.general.num_cores);
    println!(
        "  Forwarding:         {}",
        if config.general.forwarding {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    println!("  Memory:             {} B", config.general.memory_bytes);
    println!(
        "  L1I:                {} B, {} B blocks, {}-way, {}",
        cache_params.l1i.size_bytes,
        cache_params.l1i.block_bytes,
        cache_params.l1i.associativity,
        cache_params.l1i.policy.name()
    );
    println!(
        "  L1D:                {} B, {} B blocks, {}-way, {}",
        cache_params.l1d.size_bytes,
        cache_params.l1d.block_bytes,
        cache_params.l1d.associativity,
        cache_params.l1d.policy.name()
    );
    println!(
        "  L2:                 {} B, {} B blocks, {}-way, {}",
        cache_params.l2.size_bytes,
        cache_params.l2.block_bytes,
        cache_params.l2.associativity,
        cache_params.l2.policy.name()
    );
    println!(
        "  SPM:                {} B, latency={}",
        cache_params.spm_size, cache_params.spm_latency
    );
    println!("--------------------");

    let mut simulator = match Simulator::new(config.clone(), cache_params) {
        Ok(simulator) => simulator,
        Err(e) => fatal(&e.to_string()),
    };

    if let Err(e) = simulator.load_program_file(&args.program) {
        fatal(&e.to_string());
    }

    if let Err(e) = simulator.run() {
        eprintln!("\n[!] FATAL: {}", e);
        simulator.print_statistics();
        process::exit(1);
    }

    simulator.print_state();
    simulator.print_statistics();

    if let Err(e) = simulator.export_traces(&config.general.trace_dir) {
        eprintln!("[!] Could not export pipeline traces: {}", e);
        process::exit(1);
    }
    println!(
        "\nPipeline traces exported to {}/pipeline_core<id>.csv",
        config.general.trace_dir
    );
}

fn fatal(msg: &str) -> ! {
    eprintln!("\n[!] FATAL: {}", msg);
    process::exit(1);
}
