//! Centralized fetch.
//!
//! One pass per cycle visits every core in ascending id order and seeds
//! its fetch queue from the program, charging L1I miss latency to the
//! core rather than to the pass itself.

use crate::common::SimError;
use crate::core::{Core, QUEUE_CAPACITY};
use crate::mem::MemoryHierarchy;

pub fn centralized_fetch(
    cores: &mut [Core],
    hierarchy: &mut MemoryHierarchy,
    program: &[String],
) -> Result<(), SimError> {
    for core in cores.iter_mut() {
        if core.is_halted() {
            continue;
        }

        // A fetch whose L1I miss is still outstanding blocks this core's
        // fetch slot but nobody else's.
        if core.fetch_waiting() {
            core.tick_fetch_wait();
            continue;
        }

        if core.fetch_queue.len() >= QUEUE_CAPACITY {
            continue;
        }
        if core.is_pipeline_stalled() {
            continue;
        }
        if core.pc >= program.len() {
            continue;
        }

        let core_id = core.core_id();
        let block = hierarchy.l1i_block_bytes(core_id) as u32;
        let addr = (core.pc as u32 * 4) & !(block - 1);
        let (latency, _word) = hierarchy.fetch_instruction(core_id, addr)?;

        let raw = program[core.pc].clone();
        let id = core.next_fetch_id();
        core.pc += 1;

        let extra = latency.saturating_sub(hierarchy.l1i_latency(core_id));
        if extra > 0 {
            core.begin_fetch_wait(id, raw, extra);
        } else {
            core.push_fetch_entry(id, raw);
        }

        if core.trace_log {
            eprintln!(
                "[Core {}] F  id={} pc={} ({} cycles)",
                core_id,
                id,
                core.pc - 1,
                latency
            );
        }
    }
    Ok(())
}
