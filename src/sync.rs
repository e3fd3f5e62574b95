//! Cross-core synchronization barrier.
//!
//! The `sync` instruction rendezvouses every core in two phases that map
//! onto the pipeline: a core *arrives* when its `sync` reaches execute
//! and *retires* when it leaves writeback. The last retirement restores
//! cross-core coherence by writing back and invalidating every core's
//! L1D, so values written before the barrier are visible from L2 after
//! it.

use crate::common::SimError;
use crate::mem::MemoryHierarchy;

pub struct SyncBarrier {
    num_cores: usize,
    arrived: Vec<bool>,
    retired: Vec<bool>,
    arrive_count: usize,
    retire_count: usize,
    trace: bool,
}

impl SyncBarrier {
    pub fn new(num_cores: usize) -> Self {
        Self {
            num_cores,
            arrived: vec![false; num_cores],
            retired: vec![false; num_cores],
            arrive_count: 0,
            retire_count: 0,
            trace: false,
        }
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Phase 1, called from execute. Idempotent within one barrier episode.
    pub fn arrive(&mut self, core: usize) {
        if !self.arrived[core] {
            self.arrived[core] = true;
            self.arrive_count += 1;
            if self.trace {
                eprintln!(
                    "[Barrier] core {} arrived ({}/{})",
                    core, self.arrive_count, self.num_cores
                );
            }
        }
    }

    /// Whether the barrier is open: every core has arrived.
    pub fn can_proceed(&self, _core: usize) -> bool {
        self.arrive_count == self.num_cores
    }

    /// Phase 2, called from writeback. The last retirement flushes every
    /// core's L1D into L2 and re-arms the barrier.
    pub fn retire(&mut self, core: usize, hierarchy: &mut MemoryHierarchy) -> Result<(), SimError> {
        if !self.retired[core] {
            self.retired[core] = true;
            self.retire_count += 1;
            if self.trace {
                eprintln!(
                    "[Barrier] core {} retired ({}/{})",
                    core, self.retire_count, self.num_cores
                );
            }
        }

        if self.retire_count == self.num_cores {
            for c in 0..self.num_cores {
                hierarchy.flush_l1d(c)?;
            }
            self.reset();
            if self.trace {
                eprintln!("[Barrier] all cores retired, L1D caches flushed");
            }
        }
        Ok(())
    }

    pub fn arrive_count(&self) -> usize {
        self.arrive_count
    }

    pub fn retire_count(&self) -> usize {
        self.retire_count
    }

    pub fn has_arrived(&self, core: usize) -> bool {
        self.arrived[core]
    }

    pub fn has_retired(&self, core: usize) -> bool {
        self.retired[core]
    }

    pub fn reset(&mut self) {
        self.arrived.fill(false);
        self.retired.fill(false);
        self.arrive_count = 0;
        self.retire_count = 0;
    }
}
