//! Simulation harness.
//!
//! Owns the cores, the memory hierarchy, and the barrier, and drives one
//! logical time axis: per cycle, centralized fetch followed by each
//! core's reverse-order stage advancement. Deterministic by
//! construction: cores are visited in ascending id order and nothing
//! suspends inside a cycle.

use crate::common::SimError;
use crate::config::{CacheParams, SimConfig};
use crate::core::Core;
use crate::isa::LatencyTable;
use crate::mem::MemoryHierarchy;
use crate::stats;
use crate::sync::SyncBarrier;
use std::io;
use std::path::Path;

/// Centralized fetch pass.
pub mod fetch;

/// Assembly program loader.
pub mod loader;

pub struct Simulator {
    config: SimConfig,
    cache_params: CacheParams,
    cores: Vec<Core>,
    hierarchy: MemoryHierarchy,
    barrier: SyncBarrier,
    program: Vec<String>,
}

impl Simulator {
    pub fn new(config: SimConfig, cache_params: CacheParams) -> Result<Self, SimError> {
        config.validate()?;
        let num_cores = config.general.num_cores;

        let hierarchy =
            MemoryHierarchy::new(num_cores, &cache_params, config.general.memory_bytes)?;
        let mut barrier = SyncBarrier::new(num_cores);
        barrier.set_trace(config.general.trace);

        let latencies = LatencyTable::new(&config.latency);
        let cores = (0..num_cores)
            .map(|id| {
                let mut core = Core::new(id, config.general.forwarding, latencies.clone());
                core.trace_log = config.general.trace;
                core
            })
            .collect();

        Ok(Self {
            config,
            cache_params,
            cores,
            hierarchy,
            barrier,
            program: Vec::new(),
        })
    }

    /// Loads an assembly program from a string, resetting all cores.
    pub fn load_program(&mut self, source: &str) -> Result<(), SimError> {
        let program = loader::load_program(source, &mut self.hierarchy)?;
        self.program = program.instructions;
        for core in &mut self.cores {
            core.reset();
            core.set_labels(program.labels.clone());
        }
        self.barrier.reset();
        Ok(())
    }

    pub fn load_program_file(&mut self, path: &str) -> Result<(), SimError> {
        let program = loader::load_program_file(path, &mut self.hierarchy)?;
        self.program = program.instructions;
        for core in &mut self.cores {
            core.reset();
            core.set_labels(program.labels.clone());
        }
        self.barrier.reset();
        Ok(())
    }

    /// Runs the loaded program to completion, then restores memory
    /// visibility with a full hierarchy flush.
    pub fn run(&mut self) -> Result<(), SimError> {
        self.hierarchy.reset_statistics();

        let program_len = self.program.len();
        let mut cycles: u64 = 0;
        loop {
            fetch::centralized_fetch(&mut self.cores, &mut self.hierarchy, &self.program)?;

            for core in &mut self.cores {
                if core.is_done(program_len) {
                    continue;
                }
                core.clock_cycle(&mut self.hierarchy, &mut self.barrier)?;
            }

            if self.cores.iter().all(|core| core.is_done(program_len)) {
                break;
            }

            cycles += 1;
            if self.config.general.max_cycles > 0 && cycles > self.config.general.max_cycles {
                return Err(SimError::Invariant(format!(
                    "simulation exceeded {} cycles without completing; \
                     a core may be stuck at a barrier no other core can reach",
                    self.config.general.max_cycles
                )));
            }
        }

        self.hierarchy.flush_all()?;
        Ok(())
    }

    pub fn num_cores(&self) -> usize {
        self.cores.len()
    }

    pub fn core(&self, id: usize) -> &Core {
        &self.cores[id]
    }

    pub fn core_mut(&mut self, id: usize) -> &mut Core {
        &mut self.cores[id]
    }

    pub fn hierarchy(&self) -> &MemoryHierarchy {
        &self.hierarchy
    }

    pub fn hierarchy_mut(&mut self) -> &mut MemoryHierarchy {
        &mut self.hierarchy
    }

    pub fn barrier(&self) -> &SyncBarrier {
        &self.barrier
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn cache_params(&self) -> &CacheParams {
        &self.cache_params
    }

    /// Convenience override applied to every core.
    pub fn set_forwarding(&mut self, enabled: bool) {
        self.config.general.forwarding = enabled;
        for core in &mut self.cores {
            core.set_forwarding(enabled);
        }
    }

    /// Convenience override applied to every core.
    pub fn set_instruction_latency(&mut self, opcode: crate::isa::Opcode, latency: u64) {
        for core in &mut self.cores {
            core.set_instruction_latency(opcode, latency);
        }
    }

    /// Writes `pipeline_core<id>.csv` for every core into `dir`.
    pub fn export_traces(&self, dir: &str) -> io::Result<()> {
        for core in &self.cores {
            let path = Path::new(dir).join(format!("pipeline_core{}.csv", core.core_id()));
            core.record
                .export_csv(path.to_str().unwrap_or("pipeline.csv"), core.stats.cycles)?;
        }
        Ok(())
    }

    /// Dumps the final architectural state: per-core PC and registers,
    /// then the whole of main memory as little-endian words.
    pub fn print_state(&self) {
        println!("\n=== Final Simulator State ===");
        for core in &self.cores {
            println!("\n=== Core {} State ===", core.core_id());
            println!("PC: {:#010x}\n", core.pc);
            println!("Registers:");
            core.regs.dump();
        }

        let bytes = self.hierarchy.raw_memory();
        let num_words = bytes.len() / 4;
        println!("\n=== Complete Shared Memory Dump ===");
        println!("All cores have access to the entire memory space");
        for w in 0..num_words {
            let addr = (w * 4) as u32;
            let word = self.hierarchy.memory_word(addr) as u32;
            if w % 4 == 0 {
                print!("{:08x}: ", addr);
            }
            print!("{:08x} ", word);
            if w % 4 == 3 || w == num_words - 1 {
                println!();
            }
        }
    }

    /// Prints the end-of-run statistics report.
    pub fn print_statistics(&self) {
        stats::print_report(
            &self.cores,
            &self.hierarchy,
            &self.config,
            &self.cache_params,
        );
    }
}
