//! Instruction set definitions.
//!
//! The simulated machine executes a small RISC-V-like subset: integer
//! arithmetic, word loads/stores against the cache hierarchy or the
//! per-core scratchpad, branches and jumps, label address loads, the
//! cross-core `sync` barrier, `halt`, and an explicit L1D invalidate.

use crate::config::LatencyConfig;
use std::collections::HashMap;

/// Textual instruction parsing.
pub mod parser;

/// Operation executed by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Addi,
    Sub,
    Slt,
    Mul,
    Lw,
    Sw,
    LwSpm,
    SwSpm,
    Beq,
    Bne,
    Blt,
    Bge,
    J,
    Jal,
    La,
    Sync,
    Halt,
    Invld1,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Addi => "addi",
            Opcode::Sub => "sub",
            Opcode::Slt => "slt",
            Opcode::Mul => "mul",
            Opcode::Lw => "lw",
            Opcode::Sw => "sw",
            Opcode::LwSpm => "lw_spm",
            Opcode::SwSpm => "sw_spm",
            Opcode::Beq => "beq",
            Opcode::Bne => "bne",
            Opcode::Blt => "blt",
            Opcode::Bge => "bge",
            Opcode::J => "j",
            Opcode::Jal => "jal",
            Opcode::La => "la",
            Opcode::Sync => "sync",
            Opcode::Halt => "halt",
            Opcode::Invld1 => "invld1",
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Opcode::Add | Opcode::Addi | Opcode::Sub | Opcode::Slt | Opcode::Mul
        )
    }

    pub fn is_memory(&self) -> bool {
        matches!(
            self,
            Opcode::Lw | Opcode::Sw | Opcode::LwSpm | Opcode::SwSpm
        )
    }

    pub fn is_load(&self) -> bool {
        matches!(self, Opcode::Lw | Opcode::LwSpm)
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Opcode::Sw | Opcode::SwSpm)
    }

    pub fn is_spm(&self) -> bool {
        matches!(self, Opcode::LwSpm | Opcode::SwSpm)
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Opcode::Beq | Opcode::Bne | Opcode::Blt | Opcode::Bge)
    }

    pub fn is_jump(&self) -> bool {
        matches!(self, Opcode::J | Opcode::Jal)
    }

    pub fn is_sync(&self) -> bool {
        matches!(self, Opcode::Sync)
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, Opcode::Halt)
    }

    pub fn is_invld_l1d(&self) -> bool {
        matches!(self, Opcode::Invld1)
    }
}

/// A decoded instruction flowing through one core's pipeline.
///
/// Decode fills in the static fields; the runtime fields below `result`
/// mutate as the instruction progresses through the stages.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Fetch sequence number within the owning core.
    pub id: u64,
    pub opcode: Opcode,
    pub rd: Option<usize>,
    pub rs1: Option<usize>,
    pub rs2: Option<usize>,
    pub immediate: i32,
    /// Branch/jump/`la` target symbol.
    pub label: Option<String>,
    /// Resolved once in execute.
    pub target_pc: Option<usize>,
    /// Literal core id of a `beq x31, <id>, label` dispatch.
    pub core_dispatch: Option<usize>,

    pub should_execute: bool,
    pub result: Option<i32>,
    pub execute_latency: u64,
    pub cycles_in_execute: u64,
    /// Effective address computed in execute for loads and stores.
    pub pending_addr: Option<u32>,
    /// Value to be stored, captured in execute.
    pub pending_store: Option<i32>,
    pub waiting_for_memory: bool,
    pub memory_latency: u64,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            id: 0,
            opcode,
            rd: None,
            rs1: None,
            rs2: None,
            immediate: 0,
            label: None,
            target_pc: None,
            core_dispatch: None,
            should_execute: true,
            result: None,
            execute_latency: 1,
            cycles_in_execute: 0,
            pending_addr: None,
            pending_store: None,
            waiting_for_memory: false,
            memory_latency: 0,
        }
    }

    /// Whether this instruction produces a register result that can be
    /// forwarded or written back.
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Whether this instruction will eventually write `reg`.
    pub fn writes(&self, reg: usize) -> bool {
        self.rd == Some(reg)
    }
}

/// Execute latencies for the arithmetic opcodes, shared by every core.
#[derive(Debug, Clone)]
pub struct LatencyTable {
    latencies: HashMap<Opcode, u64>,
}

impl LatencyTable {
    pub fn new(config: &LatencyConfig) -> Self {
        let mut latencies = HashMap::new();
        latencies.insert(Opcode::Add, config.add);
        latencies.insert(Opcode::Addi, config.addi);
        latencies.insert(Opcode::Sub, config.sub);
        latencies.insert(Opcode::Slt, config.slt);
        latencies.insert(Opcode::Mul, config.mul);
        Self { latencies }
    }

    pub fn get(&self, opcode: Opcode) -> u64 {
        self.latencies.get(&opcode).copied().unwrap_or(1)
    }

    pub fn set(&mut self, opcode: Opcode, latency: u64) {
        self.latencies.insert(opcode, latency);
    }
}

impl Default for LatencyTable {
    fn default() -> Self {
        Self::new(&LatencyConfig::default())
    }
}
