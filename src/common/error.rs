//! Error types shared across the simulator.

use std::error::Error;
use std::fmt;

/// Fatal simulation errors, grouped by the subsystem that raises them.
///
/// Cache misses, queue-full stalls, and multi-cycle latencies are normal
/// operating events and never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Invalid cache geometry, unknown policy, out-of-range core id.
    Config(String),

    /// Unknown opcode, malformed register or immediate.
    Parse(String),

    /// Misaligned or out-of-range scratchpad access.
    Memory(String),

    /// Queue overflow or a stage receiving an instruction in the wrong state.
    Invariant(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(msg) => write!(f, "configuration error: {}", msg),
            SimError::Parse(msg) => write!(f, "parse error: {}", msg),
            SimError::Memory(msg) => write!(f, "memory error: {}", msg),
            SimError::Invariant(msg) => write!(f, "internal invariant violated: {}", msg),
        }
    }
}

impl Error for SimError {}
