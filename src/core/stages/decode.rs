use crate::common::SimError;
use crate::core::{Core, QUEUE_CAPACITY};
use crate::core::trace::StageToken;
use crate::isa::parser;

pub fn decode_stage(core: &mut Core) -> Result<(), SimError> {
    if core.is_halted() {
        return Ok(());
    }
    let Some(entry) = core.fetch_queue.front() else {
        return Ok(());
    };
    // Entries fetched this very cycle decode next cycle at the earliest.
    if entry.cycle >= core.stats.cycles {
        return Ok(());
    }
    if core.cycle_stalled() {
        return Ok(());
    }

    if core.decode_queue.len() >= QUEUE_CAPACITY {
        let id = entry.id;
        core.note_stall(id);
        return Ok(());
    }

    // Stray label lines were already resolved by the loader; consume them
    // without occupying a pipeline slot.
    if entry.raw.contains(':') {
        core.fetch_queue.pop_front();
        return Ok(());
    }

    let mut inst = parser::parse_instruction(&entry.raw)?;
    inst.id = entry.id;

    if !core.forwarding() && !core.operands_ready_for_decode(&inst) {
        core.note_stall(inst.id);
        return Ok(());
    }

    core.fetch_queue.pop_front();

    // Core-id dispatch: only the named core executes the branch.
    if let Some(target) = inst.core_dispatch {
        inst.should_execute = core.core_id() == target;
    }

    if inst.opcode.is_arithmetic() {
        inst.execute_latency = core.latency_of(inst.opcode);
    }

    if core.trace_log {
        eprintln!(
            "[Core {}] D  id={} {}",
            core.core_id(),
            inst.id,
            inst.opcode.mnemonic()
        );
    }

    core.record_stage(inst.id, StageToken::Decode);
    core.decode_queue.push_back(inst);
    Ok(())
}
