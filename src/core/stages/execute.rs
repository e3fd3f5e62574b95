use crate::common::SimError;
use crate::core::{Core, QUEUE_CAPACITY};
use crate::core::trace::StageToken;
use crate::isa::{Instruction, Opcode};
use crate::sync::SyncBarrier;

pub fn execute_stage(core: &mut Core, barrier: &mut SyncBarrier) -> Result<(), SimError> {
    // Re-enqueued work (a multi-cycle op or a waiting sync) has priority
    // over the decode queue.
    let inst = if let Some(inst) = core.execute_queue.pop_front() {
        inst
    } else if let Some(front) = core.decode_queue.front() {
        if front.should_execute {
            let ready = if core.forwarding() {
                core.operands_forwardable(front)
            } else {
                core.operands_available(front)
            };
            if !ready {
                let id = front.id;
                core.note_stall(id);
                return Ok(());
            }
        }
        core.decode_queue.pop_front().expect("decode front checked")
    } else {
        return Ok(());
    };

    core.record_stage(inst.id, StageToken::Execute);

    if core.trace_log {
        eprintln!(
            "[Core {}] E  id={} {}",
            core.core_id(),
            inst.id,
            inst.opcode.mnemonic()
        );
    }

    if !inst.should_execute {
        return push_to_memory(core, inst);
    }

    let opcode = inst.opcode;
    match opcode {
        op if op.is_arithmetic() => execute_arithmetic(core, inst),
        op if op.is_memory() => execute_address_calc(core, inst),
        op if op.is_branch() => execute_branch(core, inst),
        op if op.is_jump() => execute_jump(core, inst),
        Opcode::La => execute_la(core, inst),
        Opcode::Halt => {
            core.flush_control();
            push_to_memory(core, inst)
        }
        Opcode::Sync => execute_sync(core, barrier, inst),
        Opcode::Invld1 => push_to_memory(core, inst),
        other => Err(SimError::Invariant(format!(
            "execute received unhandled opcode {}",
            other.mnemonic()
        ))),
    }
}

fn execute_arithmetic(core: &mut Core, mut inst: Instruction) -> Result<(), SimError> {
    // Operands are resolved once, on the first execute cycle; later
    // cycles of a multi-cycle op only burn latency.
    if inst.result.is_none() {
        let op1 = core.forwarded_value(inst.rs1.unwrap_or(0));
        let op2 = if inst.opcode == Opcode::Addi {
            inst.immediate
        } else {
            core.forwarded_value(inst.rs2.unwrap_or(0))
        };
        inst.result = Some(alu(inst.opcode, op1, op2));
    }

    inst.cycles_in_execute += 1;
    if inst.cycles_in_execute < inst.execute_latency {
        core.stats.stalls += 1;
        core.execute_queue.push_front(inst);
        return Ok(());
    }

    push_to_memory(core, inst)
}

fn alu(opcode: Opcode, op1: i32, op2: i32) -> i32 {
    match opcode {
        Opcode::Add | Opcode::Addi => op1.wrapping_add(op2),
        Opcode::Sub => op1.wrapping_sub(op2),
        Opcode::Slt => (op1 < op2) as i32,
        Opcode::Mul => op1.wrapping_mul(op2),
        _ => 0,
    }
}

fn execute_address_calc(core: &mut Core, mut inst: Instruction) -> Result<(), SimError> {
    if inst.pending_addr.is_none() {
        let base = core.forwarded_value(inst.rs1.unwrap_or(0));
        let effective = base.wrapping_add(inst.immediate);
        inst.pending_addr = Some(effective as u32);
        if inst.opcode.is_store() {
            inst.pending_store = Some(core.forwarded_value(inst.rs2.unwrap_or(0)));
        }
    }
    push_to_memory(core, inst)
}

fn execute_branch(core: &mut Core, mut inst: Instruction) -> Result<(), SimError> {
    let taken = if let Some(target_core) = inst.core_dispatch {
        core.core_id() == target_core
    } else {
        let op1 = core.forwarded_value(inst.rs1.unwrap_or(0));
        let op2 = core.forwarded_value(inst.rs2.unwrap_or(0));
        match inst.opcode {
            Opcode::Beq => op1 == op2,
            Opcode::Bne => op1 != op2,
            Opcode::Blt => op1 < op2,
            Opcode::Bge => op1 >= op2,
            _ => false,
        }
    };

    if taken {
        match resolve_target(core, &inst) {
            Some(target) => {
                inst.target_pc = Some(target);
                core.pc = target;
                core.flush_control();
                if core.trace_log {
                    eprintln!("[Core {}] branch taken -> pc {}", core.core_id(), target);
                }
            }
            // Unresolved target: the branch fails open as not taken.
            None => {}
        }
    }

    push_to_memory(core, inst)
}

fn execute_jump(core: &mut Core, mut inst: Instruction) -> Result<(), SimError> {
    match resolve_target(core, &inst) {
        Some(target) => {
            inst.target_pc = Some(target);
            if inst.opcode == Opcode::Jal {
                if let Some(rd) = inst.rd {
                    if rd != 0 {
                        inst.result = Some(core.pc as i32 + 1);
                    }
                }
            }
            core.pc = target;
            core.flush_control();
            if core.trace_log {
                eprintln!("[Core {}] jump -> pc {}", core.core_id(), target);
            }
        }
        // Unresolved target: fall through without redirecting.
        None => {}
    }
    push_to_memory(core, inst)
}

fn execute_la(core: &mut Core, mut inst: Instruction) -> Result<(), SimError> {
    let value = match &inst.label {
        Some(label) => match core.resolve_label(label) {
            Some(addr) => addr as i32,
            None => {
                core.report_unresolved_label(label);
                0
            }
        },
        None => 0,
    };
    inst.result = Some(value);
    push_to_memory(core, inst)
}

fn execute_sync(
    core: &mut Core,
    barrier: &mut SyncBarrier,
    inst: Instruction,
) -> Result<(), SimError> {
    barrier.arrive(core.core_id());
    if !barrier.can_proceed(core.core_id()) {
        core.note_stall(inst.id);
        core.execute_queue.push_front(inst);
        return Ok(());
    }
    push_to_memory(core, inst)
}

fn resolve_target(core: &Core, inst: &Instruction) -> Option<usize> {
    if let Some(target) = inst.target_pc {
        return Some(target);
    }
    let label = inst.label.as_deref()?;
    match core.resolve_label(label) {
        Some(target) => Some(target),
        None => {
            core.report_unresolved_label(label);
            None
        }
    }
}

/// Hands an instruction to the memory stage, stalling in execute when the
/// memory queue is full.
fn push_to_memory(core: &mut Core, inst: Instruction) -> Result<(), SimError> {
    if core.memory_queue.len() >= QUEUE_CAPACITY {
        core.note_stall(inst.id);
        core.execute_queue.push_front(inst);
        return Ok(());
    }
    core.memory_queue.push_back(inst);
    Ok(())
}
