//! The compute engine boundary and the Poké Radar Monte Carlo engine.
//!
//! An engine turns one `(config, target)` pair into a five-point
//! quantile summary of the seconds needed to find the requested number
//! of shinies when building a radar chain up to `target` first. Calls
//! are synchronous and compute-bound; the scheduler runs each one on its
//! own worker.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::settings::EngineConfig;
use crate::RadarError;

/// Number of values in a [`QuantileSummary`].
pub const SUMMARY_LEN: usize = 5;

/// Quantiles reported per chain length, in order.
pub const QUANTILES: [f64; SUMMARY_LEN] = [0.09, 0.25, 0.50, 0.75, 0.91];

const RADAR_ODDS: &[u32] = &[
    4096, 3855, 3640, 3449, 3277, 3121, 2979, 2849, 2731, 2621, 2521, 2427, 2341, 2259, 2185, 2114,
    2048, 1986, 1927, 1872, 1820, 1771, 1724, 1680, 1638, 1598, 1560, 1524, 1489, 1456, 1310, 1285,
    1260, 1236, 1213, 1192, 993, 799, 400, 200, 99,
];
const FULL_ODDS: u32 = RADAR_ODDS[0];
const FINAL_ODDS: u32 = RADAR_ODDS[RADAR_ODDS.len() - 1];

/// `[p09, p25, p50, p75, p91]` in seconds.
pub type QuantileSummary = [f64; SUMMARY_LEN];

/// A black-box statistical simulation for a single chain length.
pub trait ComputeEngine {
    fn run(&self, config: &EngineConfig, target: u32) -> Result<QuantileSummary, RadarError>;

    /// Run every chain length in `config.chain_start..=config.chain_max`
    /// serially, returning the summaries back to back.
    fn run_range(&self, config: &EngineConfig) -> Result<Vec<f64>, RadarError> {
        let mut out = Vec::new();
        for target in config.chain_start..=config.chain_max {
            out.extend_from_slice(&self.run(config, target)?);
        }
        Ok(out)
    }
}

/// Monte Carlo simulation of shiny hunting with the Poké Radar.
#[derive(Debug, Clone, Copy, Default)]
pub struct RadarEngine {
    seed: Option<u64>,
}

impl RadarEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose runs are reproducible. Each target draws from its
    /// own stream so results do not depend on scheduling order.
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl ComputeEngine for RadarEngine {
    fn run(&self, config: &EngineConfig, target: u32) -> Result<QuantileSummary, RadarError> {
        if config.pkmn_wildrate == 0 || config.pkmn_wildrate > 1000 {
            return Err(RadarError::WildrateOutOfRange(config.pkmn_wildrate));
        }
        if config.sample_size == 0 {
            return Err(RadarError::EmptySample);
        }
        if config.total_shinies == 0 {
            return Err(RadarError::NoShiniesRequested);
        }

        debug!(
            "simulating {} hunts for chain length {}",
            config.sample_size, target
        );

        let mut times = match self.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed ^ (target as u64).rotate_left(32));
                sample_hunts(&mut rng, config, target as usize)
            }
            None => sample_hunts(&mut rand::rng(), config, target as usize),
        };
        times.sort_unstable();

        Ok(summarize(&times))
    }
}

fn sample_hunts<R: Rng + ?Sized>(rng: &mut R, config: &EngineConfig, target: usize) -> Vec<u32> {
    (0..config.sample_size)
        .map(|_| hunt(rng, config, target))
        .collect()
}

/// Seconds spent finding `total_shinies` while aiming for a chain of `target`.
fn hunt<R: Rng + ?Sized>(rng: &mut R, config: &EngineConfig, target: usize) -> u32 {
    let done = |found: u32| found >= config.total_shinies;

    let mut time = 0u32;
    let mut chain = 0usize;
    let mut found = 0u32;

    while !done(found) {
        let odds = RADAR_ODDS.get(chain).copied().unwrap_or(FINAL_ODDS);
        let patch_shiny = check_patches(rng, odds);
        let would_finish = done(found + patch_shiny as u32);

        let building = chain < target && !would_finish;
        let catch_and_continue = patch_shiny && !would_finish;

        if building || catch_and_continue {
            let correct_pkmn = chain != 0 || rng.random_ratio(config.pkmn_wildrate, 1000);
            let shiny = patch_shiny || rng.random_ratio(1, FULL_ODDS);

            if correct_pkmn {
                found += shiny as u32;
                time = time.saturating_add(config.time_for_catch);
            } else {
                // flee from the wrong species
                time = time.saturating_add(config.time_for_run);
            }

            if correct_pkmn && rng.random_ratio(93, 100) {
                chain += 1;
            } else {
                chain = 0;
                time = time.saturating_add(config.time_for_reroll);
            }
        } else if !patch_shiny {
            // at the target length with nothing shiny in the grass
            time = time.saturating_add(config.time_for_reroll);
        } else {
            // the final shiny is not timed
            found += 1;
        }
    }

    time
}

fn check_patches<R: Rng + ?Sized>(rng: &mut R, out_of: u32) -> bool {
    (0..3).map(|_| rng.random_ratio(1, out_of)).any(|b| b)
}

/// Summarize sorted samples at [`QUANTILES`].
pub fn summarize(sorted: &[u32]) -> QuantileSummary {
    QUANTILES.map(|q| quantile(sorted, q))
}

// https://en.wikipedia.org/wiki/Quartile#Method_4
fn quantile(data: &[u32], q: f64) -> f64 {
    match data.len() {
        0 => return 0.0,
        1 => return data[0] as f64,
        _ => {}
    }

    let pos = q * (data.len() + 1) as f64;
    let last = data.len() - 1;
    let k = (pos as usize).min(last);
    let alpha = pos.fract();
    let next = (k + 1).min(last);

    data[k] as f64 + alpha * (data[next] as f64 - data[k] as f64)
}
