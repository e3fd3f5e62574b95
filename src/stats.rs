//! Simulation statistics collection and reporting.
//!
//! Tracks per-core cycle, instruction, and stall counts, and renders the
//! end-of-run report: per-core breakdown, global totals, cache hit/miss
//! statistics, and an echo of the active configuration.

use crate::config::{CacheGeometry, CacheParams, SimConfig};
use crate::core::Core;
use crate::mem::{CacheStats, MemoryHierarchy};

/// Counters owned by one core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreStats {
    pub cycles: u64,
    pub instructions: u64,
    pub stalls: u64,
    pub memory_stalls: u64,
}

impl CoreStats {
    /// Committed instructions per cycle.
    pub fn ipc(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.instructions as f64 / self.cycles as f64
        }
    }
}

/// Prints the full end-of-run report.
pub fn print_report(
    cores: &[Core],
    hierarchy: &MemoryHierarchy,
    config: &SimConfig,
    cache_params: &CacheParams,
) {
    println!("\n==========================================================");
    println!("PIPELINE STATISTICS");
    println!("==========================================================");

    let mut total_cycles = 0u64;
    let mut total_instructions = 0u64;
    let mut total_stalls = 0u64;
    let mut total_memory_stalls = 0u64;

    for core in cores {
        let stats = core.stats;
        println!("Core {}:", core.core_id());
        println!("  Instructions executed: {}", stats.instructions);
        println!("  Cycles:                {}", stats.cycles);
        println!("  Total stalls:          {}", stats.stalls);
        println!("  Memory stalls:         {}", stats.memory_stalls);
        println!("  IPC:                   {:.2}", stats.ipc());
        println!();

        total_cycles = total_cycles.max(stats.cycles);
        total_instructions += stats.instructions;
        total_stalls += stats.stalls;
        total_memory_stalls += stats.memory_stalls;
    }

    let overall_ipc = if total_cycles > 0 {
        total_instructions as f64 / total_cycles as f64
    } else {
        0.0
    };
    let memory_stall_share = if total_stalls > 0 {
        total_memory_stalls as f64 * 100.0 / total_stalls as f64
    } else {
        0.0
    };

    println!("Overall:");
    println!("  Total instructions:    {}", total_instructions);
    println!("  Total cycles:          {}", total_cycles);
    println!("  Total stalls:          {}", total_stalls);
    println!(
        "  Memory stalls:         {} ({:.1}% of all stalls)",
        total_memory_stalls, memory_stall_share
    );
    println!("  Overall IPC:           {:.2}", overall_ipc);

    println!("----------------------------------------------------------");
    println!("CONFIGURATION");
    println!(
        "  Forwarding:            {}",
        if config.general.forwarding {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    println!("  Instruction latencies:");
    for (op, latency) in config.latency.table() {
        println!("    {:<6} {} cycle(s)", op, latency);
    }
    print_geometry("L1I", &cache_params.l1i);
    print_geometry("L1D", &cache_params.l1d);
    print_geometry("L2", &cache_params.l2);
    println!(
        "  SPM:                   {} B, latency={}",
        cache_params.spm_size, cache_params.spm_latency
    );
    println!(
        "  Memory latency:        {} cycles",
        cache_params.mem_latency
    );

    println!("----------------------------------------------------------");
    println!("MEMORY HIERARCHY");

    println!("L1I Caches:");
    let mut l1i_total = CacheStats::default();
    for core in cores {
        let stats = hierarchy.l1i_stats(core.core_id());
        print_cache_line(&format!("Core {}", core.core_id()), stats);
        accumulate(&mut l1i_total, stats);
    }

    println!("L1D Caches:");
    let mut l1d_total = CacheStats::default();
    for core in cores {
        let stats = hierarchy.l1d_stats(core.core_id());
        print_cache_line(&format!("Core {}", core.core_id()), stats);
        accumulate(&mut l1d_total, stats);
    }

    println!("L2 Cache:");
    print_cache_line("Shared", hierarchy.l2_stats());

    println!("Main Memory:");
    println!("  Accesses: {}", hierarchy.memory_accesses());

    println!("Overall Miss Rates:");
    print_miss_rate("L1I", l1i_total);
    print_miss_rate("L1D", l1d_total);
    print_miss_rate("L2", hierarchy.l2_stats());
    println!("==========================================================");
}

fn print_geometry(name: &str, geom: &CacheGeometry) {
    println!(
        "  {:<4} {} B, {} B blocks, {}-way, latency={}, policy={}",
        format!("{}:", name),
        geom.size_bytes,
        geom.block_bytes,
        geom.associativity,
        geom.latency,
        geom.policy.name()
    );
}

fn print_cache_line(label: &str, stats: CacheStats) {
    println!(
        "  {:<8} Accesses={}, Hits={}, Misses={}, Hit Rate={:.2}%",
        label,
        stats.accesses,
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );
}

fn print_miss_rate(name: &str, stats: CacheStats) {
    let miss_rate = if stats.accesses > 0 {
        (1.0 - stats.hit_rate()) * 100.0
    } else {
        0.0
    };
    println!("  {} Miss Rate: {:.2}%", name, miss_rate);
}

fn accumulate(total: &mut CacheStats, stats: CacheStats) {
    total.accesses += stats.accesses;
    total.hits += stats.hits;
    total.misses += stats.misses;
}
