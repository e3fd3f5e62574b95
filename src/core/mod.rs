//! One pipelined core.
//!
//! Five stages connected by bounded queues of capacity two. Within a
//! cycle the stages advance in reverse order (writeback, memory,
//! execute, decode) so a value produced in cycle `k` becomes visible to
//! earlier stages in cycle `k + 1`. Fetch is centralized across cores
//! and feeds the fetch queue from outside (see `sim::fetch`).

use crate::common::{RegisterFile, REG_CORE_ID, REG_ZERO};
use crate::common::SimError;
use crate::isa::{Instruction, LatencyTable, Opcode};
use crate::mem::MemoryHierarchy;
use crate::stats::CoreStats;
use crate::sync::SyncBarrier;
use std::collections::{HashMap, VecDeque};

/// Per-instruction trace recording.
pub mod trace;

/// The pipeline stages.
pub mod stages;

use trace::{PipelineTrace, StageToken};

/// Maximum in-flight instructions per stage queue.
pub const QUEUE_CAPACITY: usize = 2;

/// A raw instruction sitting in the fetch queue.
#[derive(Debug, Clone)]
pub struct FetchEntry {
    pub id: u64,
    pub raw: String,
    /// Cycle the entry was fetched in; decode never consumes an entry
    /// fetched in the current cycle.
    pub cycle: u64,
}

pub struct Core {
    core_id: usize,
    pub regs: RegisterFile,
    pub pc: usize,
    forwarding: bool,
    pub trace_log: bool,
    latencies: LatencyTable,
    labels: HashMap<String, usize>,

    pub fetch_queue: VecDeque<FetchEntry>,
    pub decode_queue: VecDeque<Instruction>,
    pub execute_queue: VecDeque<Instruction>,
    pub memory_queue: VecDeque<Instruction>,
    pub writeback_queue: VecDeque<Instruction>,

    /// Register writes staged during writeback when forwarding is off,
    /// committed at the end of the cycle.
    pending_writes: HashMap<usize, i32>,
    /// Earliest cycle at which each register's in-flight write is readable.
    register_available_cycle: HashMap<usize, u64>,

    pub record: PipelineTrace,
    pub stats: CoreStats,

    pub fetch_counter: u64,
    pending_fetch: Option<FetchEntry>,
    fetch_wait: u64,

    cycle_stall: bool,
    halted: bool,
}

impl Core {
    pub fn new(core_id: usize, forwarding: bool, latencies: LatencyTable) -> Self {
        Self {
            core_id,
            regs: RegisterFile::new(core_id),
            pc: 0,
            forwarding,
            trace_log: false,
            latencies,
            labels: HashMap::new(),
            fetch_queue: VecDeque::new(),
            decode_queue: VecDeque::new(),
            execute_queue: VecDeque::new(),
            memory_queue: VecDeque::new(),
            writeback_queue: VecDeque::new(),
            pending_writes: HashMap::new(),
            register_available_cycle: HashMap::new(),
            record: PipelineTrace::new(),
            stats: CoreStats::default(),
            fetch_counter: 0,
            pending_fetch: None,
            fetch_wait: 0,
            cycle_stall: false,
            halted: false,
        }
    }

    /// Clears all execution state, keeping configuration.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.pc = 0;
        self.labels.clear();
        self.fetch_queue.clear();
        self.decode_queue.clear();
        self.execute_queue.clear();
        self.memory_queue.clear();
        self.writeback_queue.clear();
        self.pending_writes.clear();
        self.register_available_cycle.clear();
        self.record.clear();
        self.stats = CoreStats::default();
        self.fetch_counter = 0;
        self.pending_fetch = None;
        self.fetch_wait = 0;
        self.cycle_stall = false;
        self.halted = false;
    }

    pub fn core_id(&self) -> usize {
        self.core_id
    }

    pub fn forwarding(&self) -> bool {
        self.forwarding
    }

    pub fn set_forwarding(&mut self, enabled: bool) {
        self.forwarding = enabled;
    }

    pub fn set_labels(&mut self, labels: HashMap<String, usize>) {
        self.labels = labels;
    }

    pub fn set_instruction_latency(&mut self, opcode: Opcode, latency: u64) {
        self.latencies.set(opcode, latency);
    }

    pub fn latency_of(&self, opcode: Opcode) -> u64 {
        self.latencies.get(opcode)
    }

    pub fn register(&self, index: usize) -> i32 {
        self.regs.read(index)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn set_halted(&mut self) {
        self.halted = true;
    }

    pub fn is_pipeline_empty(&self) -> bool {
        self.fetch_queue.is_empty()
            && self.decode_queue.is_empty()
            && self.execute_queue.is_empty()
            && self.memory_queue.is_empty()
            && self.writeback_queue.is_empty()
            && self.pending_fetch.is_none()
    }

    /// Whether centralized fetch should skip this core this cycle.
    pub fn is_pipeline_stalled(&self) -> bool {
        self.cycle_stall
            || self.fetch_queue.len() >= QUEUE_CAPACITY
            || self.decode_queue.len() >= QUEUE_CAPACITY
            || self.memory_queue.len() >= QUEUE_CAPACITY
            || self.writeback_queue.len() >= QUEUE_CAPACITY
    }

    /// Finished for the run loop: halted, or drained past the program end.
    pub fn is_done(&self, program_len: usize) -> bool {
        self.halted || (self.is_pipeline_empty() && self.pc >= program_len)
    }

    pub(crate) fn record_stage(&mut self, id: u64, token: StageToken) {
        self.record.record(id, self.stats.cycles, token);
    }

    /// Marks a stall for `id` this cycle and latches the per-cycle stall.
    pub(crate) fn note_stall(&mut self, id: u64) {
        self.record_stage(id, StageToken::Stall);
        self.stats.stalls += 1;
        self.cycle_stall = true;
    }

    pub(crate) fn cycle_stalled(&self) -> bool {
        self.cycle_stall
    }

    pub(crate) fn resolve_label(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Reports an unresolved label; the control transfer fails open.
    pub(crate) fn report_unresolved_label(&self, label: &str) {
        eprintln!("[Core {}] Error: label '{}' not found", self.core_id, label);
    }

    /// The freshest value of `reg` visible to execute: an in-flight result
    /// from writeback, memory, or execute, else the architectural file.
    /// x0 and x31 are never forwarded.
    pub(crate) fn forwarded_value(&self, reg: usize) -> i32 {
        if reg == REG_ZERO || reg == REG_CORE_ID || !self.forwarding {
            return self.regs.read(reg);
        }
        for queue in [&self.writeback_queue, &self.memory_queue, &self.execute_queue] {
            for inst in queue {
                if inst.should_execute && inst.writes(reg) {
                    if let Some(value) = inst.result {
                        return value;
                    }
                }
            }
        }
        self.regs.read(reg)
    }

    fn source_registers(inst: &Instruction) -> impl Iterator<Item = usize> + '_ {
        [inst.rs1, inst.rs2]
            .into_iter()
            .flatten()
            .filter(|&reg| reg != REG_ZERO)
    }

    /// Decode-time hazard check with forwarding disabled: a source is
    /// unusable while its write sits in `pending_writes` or has not
    /// reached its availability cycle.
    pub(crate) fn operands_ready_for_decode(&self, inst: &Instruction) -> bool {
        for reg in Self::source_registers(inst) {
            if self.pending_writes.contains_key(&reg) {
                return false;
            }
            if let Some(&available) = self.register_available_cycle.get(&reg) {
                if self.stats.cycles < available {
                    return false;
                }
            }
        }
        true
    }

    /// Execute-handoff hazard check with forwarding disabled: any
    /// in-flight instruction writing a source register blocks the consumer.
    pub(crate) fn operands_available(&self, consumer: &Instruction) -> bool {
        for reg in Self::source_registers(consumer) {
            if self.pending_writes.contains_key(&reg) {
                return false;
            }
        }
        for queue in [
            &self.decode_queue,
            &self.execute_queue,
            &self.memory_queue,
            &self.writeback_queue,
        ] {
            for inst in queue {
                if inst.id == consumer.id {
                    continue;
                }
                let Some(rd) = inst.rd else { continue };
                if rd == REG_ZERO {
                    continue;
                }
                if Self::source_registers(consumer).any(|reg| reg == rd) {
                    return false;
                }
            }
        }
        true
    }

    /// Execute-handoff hazard check with forwarding enabled: a producer
    /// whose result is not ready yet (a load still in flight) blocks the
    /// consumer; everything else forwards.
    pub(crate) fn operands_forwardable(&self, consumer: &Instruction) -> bool {
        for reg in Self::source_registers(consumer) {
            if reg == REG_CORE_ID {
                continue;
            }
            for queue in [&self.execute_queue, &self.memory_queue, &self.writeback_queue] {
                for inst in queue {
                    if inst.should_execute && inst.writes(reg) && inst.result.is_none() {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Flushes the stages younger than a resolved control transfer:
    /// fetch, decode, execute, and memory of this core only. An in-flight
    /// instruction fetch is cancelled too.
    pub(crate) fn flush_control(&mut self) {
        self.fetch_queue.clear();
        self.decode_queue.clear();
        self.execute_queue.clear();
        self.memory_queue.clear();
        self.pending_fetch = None;
        self.fetch_wait = 0;
    }

    pub(crate) fn flush_all_queues(&mut self) {
        self.flush_control();
        self.writeback_queue.clear();
    }

    pub(crate) fn stage_pending_write(&mut self, reg: usize, value: i32) {
        self.pending_writes.insert(reg, value);
    }

    pub(crate) fn set_register_available(&mut self, reg: usize, cycle: u64) {
        self.register_available_cycle.insert(reg, cycle);
    }

    // Fetch-side interface used by centralized fetch.

    pub fn next_fetch_id(&mut self) -> u64 {
        let id = self.fetch_counter;
        self.fetch_counter += 1;
        id
    }

    /// Queues a fetched instruction and records its "F" cycle.
    pub fn push_fetch_entry(&mut self, id: u64, raw: String) {
        let cycle = self.stats.cycles;
        self.record_stage(id, StageToken::Fetch);
        self.fetch_queue.push_back(FetchEntry { id, raw, cycle });
    }

    /// Parks a fetched instruction while its L1I miss resolves.
    pub fn begin_fetch_wait(&mut self, id: u64, raw: String, wait_cycles: u64) {
        self.pending_fetch = Some(FetchEntry {
            id,
            raw,
            cycle: self.stats.cycles,
        });
        self.fetch_wait = wait_cycles;
    }

    pub fn fetch_waiting(&self) -> bool {
        self.fetch_wait > 0 || self.pending_fetch.is_some()
    }

    /// Burns one wait cycle of an in-flight instruction fetch, pushing the
    /// parked entry once the miss has resolved. The wait is charged to
    /// this core's stall and memory-stall counters.
    pub fn tick_fetch_wait(&mut self) {
        if self.fetch_wait > 0 {
            self.fetch_wait -= 1;
            self.stats.stalls += 1;
            self.stats.memory_stalls += 1;
        }
        if self.fetch_wait == 0 {
            if let Some(entry) = self.pending_fetch.take() {
                self.push_fetch_entry(entry.id, entry.raw);
            }
        }
    }

    /// Advances every stage of this core by one cycle.
    pub fn clock_cycle(
        &mut self,
        hierarchy: &mut MemoryHierarchy,
        barrier: &mut SyncBarrier,
    ) -> Result<(), SimError> {
        if self.halted {
            return Ok(());
        }
        self.cycle_stall = false;

        stages::write_back::wb_stage(self, hierarchy, barrier)?;
        stages::memory::mem_stage(self, hierarchy)?;
        stages::execute::execute_stage(self, barrier)?;
        stages::decode::decode_stage(self)?;

        self.stats.cycles += 1;

        if !self.forwarding && !self.pending_writes.is_empty() {
            let writes: Vec<(usize, i32)> = self.pending_writes.drain().collect();
            for (reg, value) in writes {
                self.regs.write(reg, value);
                self.register_available_cycle.insert(reg, self.stats.cycles);
            }
        }
        Ok(())
    }
}
