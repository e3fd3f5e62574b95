use crate::common::{SimError, REG_CORE_ID, REG_ZERO};
use crate::core::Core;
use crate::core::trace::StageToken;
use crate::mem::MemoryHierarchy;
use crate::sync::SyncBarrier;

pub fn wb_stage(
    core: &mut Core,
    hierarchy: &mut MemoryHierarchy,
    barrier: &mut SyncBarrier,
) -> Result<(), SimError> {
    let Some(inst) = core.writeback_queue.pop_front() else {
        return Ok(());
    };

    if inst.opcode.is_halt() {
        core.flush_all_queues();
        core.record_stage(inst.id, StageToken::Writeback);
        hierarchy.flush_all()?;
        core.set_halted();
        if core.trace_log {
            eprintln!(
                "[Core {}] halt retired, pipeline flushed, hierarchy written back",
                core.core_id()
            );
        }
        return Ok(());
    }

    // Skipped instructions retire silently and do not count as work.
    if !inst.should_execute {
        return Ok(());
    }

    if let (Some(value), Some(rd)) = (inst.result, inst.rd) {
        if rd != REG_ZERO && rd != REG_CORE_ID {
            if core.forwarding() {
                core.regs.write(rd, value);
                core.set_register_available(rd, core.stats.cycles + 1);
            } else {
                core.stage_pending_write(rd, value);
            }
            if core.trace_log {
                eprintln!("[Core {}] W  x{} <= {}", core.core_id(), rd, value);
            }
        }
    }

    core.stats.instructions += 1;
    core.record_stage(inst.id, StageToken::Writeback);

    if inst.opcode.is_sync() {
        barrier.retire(core.core_id(), hierarchy)?;
    }
    Ok(())
}
