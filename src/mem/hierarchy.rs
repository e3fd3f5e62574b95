//! The multi-level memory hierarchy.
//!
//! Per-core private L1I and L1D caches sit in front of one shared L2,
//! which is backed by main memory. Scratchpads are independent of the
//! hierarchy. The authoritative value of a byte is the most recent write
//! in L1D, else L2, else main memory; SYNC and halt restore L2/memory
//! visibility by flushing the private levels.

use super::backing::{Backing, MainMemory};
use super::cache::{Cache, CacheStats};
use super::scratchpad::Scratchpad;
use crate::common::SimError;
use crate::config::CacheParams;

/// A cache plus whatever backs it, viewed as a single next level.
struct Level<'a> {
    cache: &'a mut Cache,
    next: &'a mut dyn Backing,
}

impl Backing for Level<'_> {
    fn read(&mut self, addr: u32, size: usize) -> (u64, Vec<u8>) {
        self.cache.read(addr, size, &mut *self.next)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> u64 {
        self.cache.write(addr, data, &mut *self.next)
    }
}

pub struct MemoryHierarchy {
    num_cores: usize,
    l1i: Vec<Cache>,
    l1d: Vec<Cache>,
    l2: Cache,
    memory: MainMemory,
    scratchpads: Vec<Scratchpad>,
}

impl MemoryHierarchy {
    pub fn new(
        num_cores: usize,
        params: &CacheParams,
        memory_bytes: usize,
    ) -> Result<Self, SimError> {
        if num_cores == 0 {
            return Err(SimError::Config("hierarchy needs at least one core".into()));
        }

        let mut l1i = Vec::with_capacity(num_cores);
        let mut l1d = Vec::with_capacity(num_cores);
        let mut scratchpads = Vec::with_capacity(num_cores);
        for _ in 0..num_cores {
            l1i.push(Cache::new("L1I", &params.l1i)?);
            l1d.push(Cache::new("L1D", &params.l1d)?);
            scratchpads.push(Scratchpad::new(params.spm_size, params.spm_latency));
        }

        Ok(Self {
            num_cores,
            l1i,
            l1d,
            l2: Cache::new("L2", &params.l2)?,
            memory: MainMemory::new(memory_bytes, params.mem_latency),
            scratchpads,
        })
    }

    pub fn num_cores(&self) -> usize {
        self.num_cores
    }

    fn check_core(&self, core: usize) -> Result<(), SimError> {
        if core >= self.num_cores {
            return Err(SimError::Config(format!(
                "core id {} out of range (0..{})",
                core, self.num_cores
            )));
        }
        Ok(())
    }

    /// Four-byte instruction read through the core's L1I, word-aligned.
    pub fn fetch_instruction(&mut self, core: usize, addr: u32) -> Result<(u64, i32), SimError> {
        self.check_core(core)?;
        let addr = addr & !0x3;
        let mut l2 = Level {
            cache: &mut self.l2,
            next: &mut self.memory,
        };
        let (latency, bytes) = self.l1i[core].read(addr, 4, &mut l2);
        Ok((latency, word_from(&bytes)))
    }

    /// Four-byte data read through the core's L1D, word-aligned.
    pub fn load_word(&mut self, core: usize, addr: u32) -> Result<(u64, i32), SimError> {
        self.check_core(core)?;
        let addr = addr & !0x3;
        let mut l2 = Level {
            cache: &mut self.l2,
            next: &mut self.memory,
        };
        let (latency, bytes) = self.l1d[core].read(addr, 4, &mut l2);
        Ok((latency, word_from(&bytes)))
    }

    /// Four-byte data write through the core's L1D, word-aligned.
    pub fn store_word(&mut self, core: usize, addr: u32, value: i32) -> Result<u64, SimError> {
        self.check_core(core)?;
        let addr = addr & !0x3;
        let mut l2 = Level {
            cache: &mut self.l2,
            next: &mut self.memory,
        };
        Ok(self.l1d[core].write(addr, &value.to_le_bytes(), &mut l2))
    }

    /// Word read from the core's scratchpad; misalignment is fatal.
    pub fn load_word_spm(&mut self, core: usize, addr: u32) -> Result<(u64, i32), SimError> {
        self.check_core(core)?;
        let spm = &self.scratchpads[core];
        let value = spm.load_word(addr)?;
        Ok((spm.latency(), value))
    }

    /// Word write to the core's scratchpad; misalignment is fatal.
    pub fn store_word_spm(&mut self, core: usize, addr: u32, value: i32) -> Result<u64, SimError> {
        self.check_core(core)?;
        self.scratchpads[core].store_word(addr, value)?;
        Ok(self.scratchpads[core].latency())
    }

    /// Writes back every dirty line of the core's L1D into L2, then
    /// invalidates the whole L1D.
    pub fn flush_l1d(&mut self, core: usize) -> Result<(), SimError> {
        self.check_core(core)?;
        let mut l2 = Level {
            cache: &mut self.l2,
            next: &mut self.memory,
        };
        self.l1d[core].flush_and_invalidate(&mut l2);
        Ok(())
    }

    /// Flushes every core's L1D, then flushes L2 into main memory.
    pub fn flush_all(&mut self) -> Result<(), SimError> {
        for core in 0..self.num_cores {
            self.flush_l1d(core)?;
        }
        self.l2.flush(&mut self.memory);
        Ok(())
    }

    /// Drops every L1D line of the core without writing back.
    pub fn invalidate_l1d(&mut self, core: usize) -> Result<(), SimError> {
        self.check_core(core)?;
        self.l1d[core].invalidate_all();
        Ok(())
    }

    pub fn l1i_stats(&self, core: usize) -> CacheStats {
        self.l1i[core].stats()
    }

    pub fn l1d_stats(&self, core: usize) -> CacheStats {
        self.l1d[core].stats()
    }

    pub fn l2_stats(&self) -> CacheStats {
        self.l2.stats()
    }

    pub fn memory_accesses(&self) -> u64 {
        self.memory.accesses()
    }

    pub fn l1i_latency(&self, core: usize) -> u64 {
        self.l1i[core].access_latency()
    }

    pub fn l1i_block_bytes(&self, core: usize) -> usize {
        self.l1i[core].block_bytes()
    }

    pub fn reset_statistics(&mut self) {
        for cache in self.l1i.iter_mut().chain(self.l1d.iter_mut()) {
            cache.reset_statistics();
        }
        self.l2.reset_statistics();
        self.memory.reset_statistics();
    }

    /// Direct word store into main memory, used by the program loader.
    pub fn set_memory_word(&mut self, addr: u32, value: i32) {
        self.memory.set_word(addr, value);
    }

    /// Direct word read from main memory, bypassing the caches.
    pub fn memory_word(&self, addr: u32) -> i32 {
        self.memory.word(addr)
    }

    pub fn raw_memory(&self) -> &[u8] {
        self.memory.raw()
    }
}

fn word_from(bytes: &[u8]) -> i32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    i32::from_le_bytes(buf)
}
