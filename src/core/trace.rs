//! Per-instruction pipeline trace.
//!
//! Each fetched instruction owns a row of per-cycle tokens recording the
//! stage it occupied that cycle. Rows are append-only; cycles in which an
//! instruction was nowhere stay empty and are padded out at export time.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};

/// What an instruction did in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageToken {
    Fetch,
    Decode,
    Execute,
    Memory,
    Writeback,
    Stall,
}

impl fmt::Display for StageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            StageToken::Fetch => "F",
            StageToken::Decode => "D",
            StageToken::Execute => "E",
            StageToken::Memory => "M",
            StageToken::Writeback => "W",
            StageToken::Stall => "S",
        };
        f.write_str(c)
    }
}

/// Fetch id -> row of per-cycle stage tokens.
#[derive(Default)]
pub struct PipelineTrace {
    rows: HashMap<u64, Vec<Option<StageToken>>>,
}

impl PipelineTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `token` for instruction `id` at `cycle`. Recording twice in
    /// one cycle keeps the later token (a stall resolved into progress, or
    /// progress demoted to a stall).
    pub fn record(&mut self, id: u64, cycle: u64, token: StageToken) {
        let row = self.rows.entry(id).or_default();
        let cycle = cycle as usize;
        if row.len() <= cycle {
            row.resize(cycle + 1, None);
        }
        row[cycle] = Some(token);
    }

    pub fn row(&self, id: u64) -> Option<&[Option<StageToken>]> {
        self.rows.get(&id).map(|r| r.as_slice())
    }

    /// The tokens of one row with empty cycles removed, in cycle order.
    pub fn tokens(&self, id: u64) -> Vec<StageToken> {
        self.rows
            .get(&id)
            .map(|row| row.iter().filter_map(|t| *t).collect())
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Writes the trace as CSV: one row per instruction in fetch order,
    /// ids renumbered from 1, one column per simulated cycle.
    pub fn export_csv(&self, path: &str, total_cycles: u64) -> io::Result<()> {
        let mut file = File::create(path)?;

        write!(file, "InstrID")?;
        for cycle in 0..total_cycles {
            write!(file, ",Cycle{}", cycle + 1)?;
        }
        writeln!(file)?;

        let mut ids: Vec<u64> = self.rows.keys().copied().collect();
        ids.sort_unstable();

        for (normalized, id) in ids.iter().enumerate() {
            write!(file, "{}", normalized + 1)?;
            let row = &self.rows[id];
            for cycle in 0..total_cycles as usize {
                match row.get(cycle).copied().flatten() {
                    Some(token) => write!(file, ",{}", token)?,
                    None => write!(file, ",")?,
                }
            }
            writeln!(file)?;
        }
        Ok(())
    }
}
