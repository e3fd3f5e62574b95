use crate::common::SimError;
use crate::core::{Core, QUEUE_CAPACITY};
use crate::core::trace::StageToken;
use crate::isa::{Instruction, Opcode};
use crate::mem::MemoryHierarchy;

pub fn mem_stage(core: &mut Core, hierarchy: &mut MemoryHierarchy) -> Result<(), SimError> {
    let Some(front) = core.memory_queue.front_mut() else {
        return Ok(());
    };

    // An access already in flight keeps the stage busy until its latency
    // is paid off.
    if front.waiting_for_memory {
        if front.memory_latency > 0 {
            front.memory_latency -= 1;
            let id = front.id;
            core.note_stall(id);
            core.stats.memory_stalls += 1;
            return Ok(());
        }
        let mut inst = core.memory_queue.pop_front().expect("front checked");
        inst.waiting_for_memory = false;
        return push_to_writeback(core, inst);
    }

    let mut inst = core.memory_queue.pop_front().expect("front checked");

    if inst.should_execute {
        match inst.opcode {
            Opcode::Lw => {
                let addr = pending_addr(&inst)?;
                let (latency, value) = hierarchy.load_word(core.core_id(), addr)?;
                inst.result = Some(value);
                if core.trace_log {
                    eprintln!(
                        "[Core {}] M  lw [{}] -> {} ({} cycles)",
                        core.core_id(),
                        addr,
                        value,
                        latency
                    );
                }
                if latency > 1 {
                    return stall_for_memory(core, inst, latency);
                }
            }
            Opcode::Sw => {
                let addr = pending_addr(&inst)?;
                let value = pending_store(&inst)?;
                let latency = hierarchy.store_word(core.core_id(), addr, value)?;
                if core.trace_log {
                    eprintln!(
                        "[Core {}] M  sw {} -> [{}] ({} cycles)",
                        core.core_id(),
                        value,
                        addr,
                        latency
                    );
                }
                if latency > 1 {
                    return stall_for_memory(core, inst, latency);
                }
            }
            Opcode::LwSpm => {
                let addr = pending_addr(&inst)?;
                let (latency, value) = hierarchy.load_word_spm(core.core_id(), addr)?;
                inst.result = Some(value);
                if latency > 1 {
                    return stall_for_memory(core, inst, latency);
                }
            }
            Opcode::SwSpm => {
                let addr = pending_addr(&inst)?;
                let value = pending_store(&inst)?;
                let latency = hierarchy.store_word_spm(core.core_id(), addr, value)?;
                if latency > 1 {
                    return stall_for_memory(core, inst, latency);
                }
            }
            Opcode::Invld1 => {
                hierarchy.invalidate_l1d(core.core_id())?;
            }
            // sync retires in writeback; everything else has no memory
            // side effect.
            _ => {}
        }
    }

    push_to_writeback(core, inst)
}

fn pending_addr(inst: &Instruction) -> Result<u32, SimError> {
    inst.pending_addr.ok_or_else(|| {
        SimError::Invariant(format!(
            "memory stage received {} without an effective address",
            inst.opcode.mnemonic()
        ))
    })
}

fn pending_store(inst: &Instruction) -> Result<i32, SimError> {
    inst.pending_store.ok_or_else(|| {
        SimError::Invariant(format!(
            "memory stage received {} without a store value",
            inst.opcode.mnemonic()
        ))
    })
}

/// Parks an instruction at the head of the memory queue for the remaining
/// cycles of a multi-cycle access.
fn stall_for_memory(core: &mut Core, mut inst: Instruction, latency: u64) -> Result<(), SimError> {
    inst.memory_latency = latency - 1;
    inst.waiting_for_memory = true;
    core.note_stall(inst.id);
    core.stats.memory_stalls += 1;
    core.memory_queue.push_front(inst);
    Ok(())
}

fn push_to_writeback(core: &mut Core, inst: Instruction) -> Result<(), SimError> {
    if core.writeback_queue.len() >= QUEUE_CAPACITY {
        core.note_stall(inst.id);
        core.memory_queue.push_front(inst);
        return Ok(());
    }
    core.record_stage(inst.id, StageToken::Memory);
    core.writeback_queue.push_back(inst);
    Ok(())
}
