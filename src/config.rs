//! Application-level configuration constants.

// Workers
pub const WORKER_SCRIPT: &str = "worker.js";
/// Used when the platform cannot report its parallelism.
pub const FALLBACK_THREADS: usize = 2;

// Default simulation settings
pub const DEFAULT_CHAIN_START: u32 = 1;
pub const DEFAULT_CHAIN_MAX: u32 = 40;
pub const DEFAULT_SAMPLE_SIZE: u32 = 5_000;
pub const DEFAULT_TOTAL_SHINIES: u32 = 1;
pub const DEFAULT_WILDRATE_PCT: f64 = 10.0;
pub const DEFAULT_TIME_FOR_CATCH: u32 = 50;
pub const DEFAULT_TIME_FOR_RUN: u32 = 25;
pub const DEFAULT_TIME_FOR_REROLL: u32 = 10;

// Limits
pub const MAX_WILDRATE_PERMILLE: u32 = 1_000;
/// Longest chain a run may target.
pub const MAX_CHAIN: u32 = u8::MAX as u32;
