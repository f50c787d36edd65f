//! Monte Carlo estimates of how long a Poké Radar shiny hunt takes, for a
//! range of target chain lengths, computed in parallel on a fixed pool of
//! workers.
//!
//! The pieces, leaves first:
//! * [`Settings`] – the simulation parameters and their GET/SET key table.
//! * [`ComputeEngine`] – one synchronous simulation per chain length;
//!   [`RadarEngine`] is the Monte Carlo implementation.
//! * [`WorkerPool`] – FIFO queue plus per-slot `Init/Ready/Running` state.
//! * [`ResultAggregator`] – sparse results and run progress.
//! * [`Orchestrator`] – splits a run into jobs and routes completions.
//!
//! Workers are OS threads natively ([`native`]) and web workers in the
//! browser (`web`).

use wasm_bindgen::prelude::*;

pub mod aggregator;
pub mod config;
pub mod engine;
mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod native;
pub mod orchestrator;
pub mod pool;
pub mod protocol;
pub mod report;
pub mod settings;
pub mod utils;
#[cfg(target_arch = "wasm32")]
pub mod web;
pub mod worker_agent;

pub use aggregator::{ProgressState, ResultAggregator, ResultRecord, ResultSet};
pub use engine::{ComputeEngine, QuantileSummary, RadarEngine};
pub use error::RadarError;
pub use orchestrator::Orchestrator;
pub use pool::{Job, SlotHandle, SlotStatus, WorkerPool};
pub use settings::{EngineConfig, Settings, SettingsKey};

/// Single-chain entry point for JavaScript callers that manage their own
/// workers.
///
/// # Arguments
/// * `settings_js` - Serialized [`Settings`]
/// * `target` - Chain length to simulate
///
/// # Returns
/// The five quantiles `[p09, p25, p50, p75, p91]` in seconds
#[wasm_bindgen]
pub fn run_chain(settings_js: JsValue, target: u32) -> Result<Box<[f64]>, JsValue> {
    let settings: Settings = serde_wasm_bindgen::from_value(settings_js)
        .map_err(|e| JsValue::from_str(&format!("Failed to deserialize settings: {}", e)))?;

    settings
        .engine_config()
        .and_then(|config| RadarEngine::new().run(&config, target))
        .map(|summary| summary.to_vec().into_boxed_slice())
        .map_err(|e| JsValue::from_str(&format!("Calculation failed: {}", e)))
}
