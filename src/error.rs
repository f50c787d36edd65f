use std::fmt;

use crate::config::MAX_CHAIN;
use crate::settings::SettingsKey;

/// Errors raised by the scheduler, the aggregator and the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RadarError {
    /// Wild encounter rate in thousandths, outside `1..=1000`.
    WildrateOutOfRange(u32),
    EmptySample,
    NoShiniesRequested,
    /// `chain_start` or `chain_max` above `MAX_CHAIN`.
    ChainTooLong(u32),
    /// A setting was given a value its field cannot hold.
    InvalidValue { key: SettingsKey, value: f64 },
    /// Raw engine output whose length is not a multiple of five.
    MalformedSummary(usize),
    /// `ProgressState::split` called before `start`.
    SplitBeforeStart,
    /// A worker went away; `target` is the chain it was computing, if any.
    WorkerLost { slot: usize, target: Option<u32> },
    /// Every worker is gone and the run can no longer make progress.
    PoolClosed,
    Spawn(String),
}

impl fmt::Display for RadarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadarError::WildrateOutOfRange(r) => write!(
                f,
                "Wild rate is in thousandths, but <{}> is outside 1..=1000",
                r
            ),
            RadarError::ChainTooLong(len) => write!(
                f,
                "Chain length {} is longer than the maximum of {}",
                len, MAX_CHAIN
            ),
            RadarError::EmptySample => write!(f, "Sample size must be at least 1"),
            RadarError::NoShiniesRequested => write!(f, "Total shinies must be at least 1"),
            RadarError::InvalidValue { key, value } => {
                write!(f, "Invalid value {} for setting {}", value, key)
            }
            RadarError::MalformedSummary(len) => write!(
                f,
                "Data from the simulation was not in sets of five (got {} values)",
                len
            ),
            RadarError::SplitBeforeStart => write!(f, "Progress split before the run started"),
            RadarError::WorkerLost { slot, target: Some(t) } => {
                write!(f, "Worker {} was lost while computing chain {}", slot, t)
            }
            RadarError::WorkerLost { slot, target: None } => {
                write!(f, "Worker {} was lost", slot)
            }
            RadarError::PoolClosed => write!(f, "All workers have shut down"),
            RadarError::Spawn(msg) => write!(f, "Failed to start worker: {}", msg),
        }
    }
}

impl std::error::Error for RadarError {}
