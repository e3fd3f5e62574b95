use crate::common::SimError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const DEFAULT_NUM_CORES: usize = 4;
const DEFAULT_MEMORY_BYTES: usize = 4096;
const DEFAULT_MAX_CYCLES: u64 = 1_000_000;

const DEFAULT_L1_SIZE: usize = 16 * 1024;
const DEFAULT_L2_SIZE: usize = 256 * 1024;
const DEFAULT_BLOCK_SIZE: usize = 64;
const DEFAULT_L1I_ASSOC: usize = 2;
const DEFAULT_L1D_ASSOC: usize = 4;
const DEFAULT_L2_ASSOC: usize = 8;
const DEFAULT_L1_LATENCY: u64 = 1;
const DEFAULT_L2_LATENCY: u64 = 10;
const DEFAULT_MEM_LATENCY: u64 = 100;
const DEFAULT_SPM_SIZE: usize = 16 * 1024;
const DEFAULT_SPM_LATENCY: u64 = 1;

/// Cache line replacement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementPolicy {
    Lru,
    Fifo,
}

impl ReplacementPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LRU" => Some(ReplacementPolicy::Lru),
            "FIFO" => Some(ReplacementPolicy::Fifo),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReplacementPolicy::Lru => "LRU",
            ReplacementPolicy::Fifo => "FIFO",
        }
    }
}

/// Top-level simulator configuration, loaded from a TOML file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SimConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub latency: LatencyConfig,
}

impl SimConfig {
    /// Loads the configuration from `path`, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &str) -> Result<Self, SimError> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("could not read {}: {}", path, e)))?;
        toml::from_str(&content)
            .map_err(|e| SimError::Config(format!("could not parse {}: {}", path, e)))
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.general.num_cores == 0 || self.general.num_cores > 16 {
            return Err(SimError::Config(format!(
                "number of cores must be between 1 and 16, got {}",
                self.general.num_cores
            )));
        }
        for (op, lat) in self.latency.table() {
            if lat < 1 {
                return Err(SimError::Config(format!(
                    "latency for {} must be at least 1",
                    op
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_num_cores")]
    pub num_cores: usize,

    #[serde(default = "default_forwarding")]
    pub forwarding: bool,

    #[serde(default)]
    pub trace: bool,

    #[serde(default = "default_memory_bytes")]
    pub memory_bytes: usize,

    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,

    #[serde(default = "default_trace_dir")]
    pub trace_dir: String,

    #[serde(default = "default_cache_config")]
    pub cache_config: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            num_cores: DEFAULT_NUM_CORES,
            forwarding: true,
            trace: false,
            memory_bytes: DEFAULT_MEMORY_BYTES,
            max_cycles: DEFAULT_MAX_CYCLES,
            trace_dir: default_trace_dir(),
            cache_config: default_cache_config(),
        }
    }
}

fn default_num_cores() -> usize {
    DEFAULT_NUM_CORES
}

fn default_forwarding() -> bool {
    true
}

fn default_memory_bytes() -> usize {
    DEFAULT_MEMORY_BYTES
}

fn default_max_cycles() -> u64 {
    DEFAULT_MAX_CYCLES
}

fn default_trace_dir() -> String {
    ".".to_string()
}

fn default_cache_config() -> String {
    "cache_config.txt".to_string()
}

/// Execute-stage latencies for the arithmetic opcodes.
#[derive(Debug, Deserialize, Clone)]
pub struct LatencyConfig {
    #[serde(default = "d_lat_one")]
    pub add: u64,

    #[serde(default = "d_lat_one")]
    pub addi: u64,

    #[serde(default = "d_lat_one")]
    pub sub: u64,

    #[serde(default = "d_lat_one")]
    pub slt: u64,

    #[serde(default = "d_lat_mul")]
    pub mul: u64,
}

impl LatencyConfig {
    pub fn table(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("add", self.add),
            ("addi", self.addi),
            ("sub", self.sub),
            ("slt", self.slt),
            ("mul", self.mul),
        ]
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            add: 1,
            addi: 1,
            sub: 1,
            slt: 1,
            mul: d_lat_mul(),
        }
    }
}

fn d_lat_one() -> u64 {
    1
}

fn d_lat_mul() -> u64 {
    3
}

/// Geometry and timing of one cache level.
#[derive(Debug, Clone, Copy)]
pub struct CacheGeometry {
    pub size_bytes: usize,
    pub block_bytes: usize,
    pub associativity: usize,
    pub latency: u64,
    pub policy: ReplacementPolicy,
}

/// Cache hierarchy parameters, loaded from the `KEY=value` cache config file.
///
/// Unknown keys are ignored; a missing file yields the built-in defaults.
#[derive(Debug, Clone)]
pub struct CacheParams {
    pub l1i: CacheGeometry,
    pub l1d: CacheGeometry,
    pub l2: CacheGeometry,
    pub mem_latency: u64,
    pub spm_size: usize,
    pub spm_latency: u64,
}

impl Default for CacheParams {
    fn default() -> Self {
        Self {
            l1i: CacheGeometry {
                size_bytes: DEFAULT_L1_SIZE,
                block_bytes: DEFAULT_BLOCK_SIZE,
                associativity: DEFAULT_L1I_ASSOC,
                latency: DEFAULT_L1_LATENCY,
                policy: ReplacementPolicy::Lru,
            },
            l1d: CacheGeometry {
                size_bytes: DEFAULT_L1_SIZE,
                block_bytes: DEFAULT_BLOCK_SIZE,
                associativity: DEFAULT_L1D_ASSOC,
                latency: DEFAULT_L1_LATENCY,
                policy: ReplacementPolicy::Lru,
            },
            l2: CacheGeometry {
                size_bytes: DEFAULT_L2_SIZE,
                block_bytes: DEFAULT_BLOCK_SIZE,
                associativity: DEFAULT_L2_ASSOC,
                latency: DEFAULT_L2_LATENCY,
                policy: ReplacementPolicy::Lru,
            },
            mem_latency: DEFAULT_MEM_LATENCY,
            spm_size: DEFAULT_SPM_SIZE,
            spm_latency: DEFAULT_SPM_LATENCY,
        }
    }
}

impl CacheParams {
    /// Loads cache parameters from a `KEY=value` file.
    pub fn load(path: &str) -> Result<Self, SimError> {
        if !Path::new(path).exists() {
            println!(
                "Cache configuration file {} not found, using defaults",
                path
            );
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("could not read {}: {}", path, e)))?;
        let params = Self::parse(&content)?;
        println!("Cache configuration loaded from {}", path);
        Ok(params)
    }

    /// Parses `KEY=value` lines, one setting per line, whitespace-trimmed.
    pub fn parse(content: &str) -> Result<Self, SimError> {
        let mut values: HashMap<&str, &str> = HashMap::new();
        for line in content.lines() {
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim(), value.trim());
            }
        }

        let mut params = Self::default();

        let size = |key: &str, dest: &mut usize| -> Result<(), SimError> {
            if let Some(v) = values.get(key) {
                *dest = v
                    .parse()
                    .map_err(|_| SimError::Config(format!("bad value for {}: {}", key, v)))?;
            }
            Ok(())
        };
        let cycles = |key: &str, dest: &mut u64| -> Result<(), SimError> {
            if let Some(v) = values.get(key) {
                *dest = v
                    .parse()
                    .map_err(|_| SimError::Config(format!("bad value for {}: {}", key, v)))?;
            }
            Ok(())
        };
        let policy = |key: &str, dest: &mut ReplacementPolicy| -> Result<(), SimError> {
            if let Some(v) = values.get(key) {
                *dest = ReplacementPolicy::parse(v)
                    .ok_or_else(|| SimError::Config(format!("unknown policy for {}: {}", key, v)))?;
            }
            Ok(())
        };

        size("L1I_SIZE", &mut params.l1i.size_bytes)?;
        size("L1D_SIZE", &mut params.l1d.size_bytes)?;
        size("L2_SIZE", &mut params.l2.size_bytes)?;
        size("L1I_BLOCK_SIZE", &mut params.l1i.block_bytes)?;
        size("L1D_BLOCK_SIZE", &mut params.l1d.block_bytes)?;
        size("L2_BLOCK_SIZE", &mut params.l2.block_bytes)?;
        size("L1I_ASSOC", &mut params.l1i.associativity)?;
        size("L1D_ASSOC", &mut params.l1d.associativity)?;
        size("L2_ASSOC", &mut params.l2.associativity)?;
        cycles("L1I_LATENCY", &mut params.l1i.latency)?;
        cycles("L1D_LATENCY", &mut params.l1d.latency)?;
        cycles("L2_LATENCY", &mut params.l2.latency)?;
        cycles("MEM_LATENCY", &mut params.mem_latency)?;
        size("SPM_SIZE", &mut params.spm_size)?;
        cycles("SPM_LATENCY", &mut params.spm_latency)?;
        policy("L1I_POLICY", &mut params.l1i.policy)?;
        policy("L1D_POLICY", &mut params.l1d.policy)?;
        policy("L2_POLICY", &mut params.l2.policy)?;

        Ok(params)
    }
}
