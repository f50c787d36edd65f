//! Simulation parameters and the field-key table used by GET/SET.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::*;
use crate::RadarError;

/// UI-facing names of the eight settings fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingsKey {
    ChainStart,
    ChainMax,
    SampleSize,
    TotalShinies,
    PkmnWildrate,
    TimeForCatch,
    TimeForRun,
    TimeForReroll,
}

impl SettingsKey {
    pub const ALL: [SettingsKey; 8] = [
        SettingsKey::ChainStart,
        SettingsKey::ChainMax,
        SettingsKey::SampleSize,
        SettingsKey::TotalShinies,
        SettingsKey::PkmnWildrate,
        SettingsKey::TimeForCatch,
        SettingsKey::TimeForRun,
        SettingsKey::TimeForReroll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingsKey::ChainStart => "chainStart",
            SettingsKey::ChainMax => "chainMax",
            SettingsKey::SampleSize => "sampleSize",
            SettingsKey::TotalShinies => "totalShinies",
            SettingsKey::PkmnWildrate => "pkmnWildrate",
            SettingsKey::TimeForCatch => "timeForCatch",
            SettingsKey::TimeForRun => "timeForRun",
            SettingsKey::TimeForReroll => "timeForReroll",
        }
    }
}

impl fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingsKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingsKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown settings parameter '{}'", s))
    }
}

/// The live simulation parameters.
///
/// `pkmn_wildrate` is kept as the percentage shown to the user (one
/// decimal); [`Settings::engine_config`] converts it to thousandths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub chain_start: u32,
    pub chain_max: u32,
    pub sample_size: u32,
    pub total_shinies: u32,
    pub pkmn_wildrate: f64,
    // in seconds for "time_for_.."
    pub time_for_catch: u32,
    pub time_for_run: u32,
    pub time_for_reroll: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chain_start: DEFAULT_CHAIN_START,
            chain_max: DEFAULT_CHAIN_MAX,
            sample_size: DEFAULT_SAMPLE_SIZE,
            total_shinies: DEFAULT_TOTAL_SHINIES,
            pkmn_wildrate: DEFAULT_WILDRATE_PCT,
            time_for_catch: DEFAULT_TIME_FOR_CATCH,
            time_for_run: DEFAULT_TIME_FOR_RUN,
            time_for_reroll: DEFAULT_TIME_FOR_REROLL,
        }
    }
}

impl Settings {
    pub fn get(&self, key: SettingsKey) -> f64 {
        match key {
            SettingsKey::ChainStart => self.chain_start as f64,
            SettingsKey::ChainMax => self.chain_max as f64,
            SettingsKey::SampleSize => self.sample_size as f64,
            SettingsKey::TotalShinies => self.total_shinies as f64,
            SettingsKey::PkmnWildrate => self.pkmn_wildrate,
            SettingsKey::TimeForCatch => self.time_for_catch as f64,
            SettingsKey::TimeForRun => self.time_for_run as f64,
            SettingsKey::TimeForReroll => self.time_for_reroll as f64,
        }
    }

    /// Set one field. Integer fields accept only whole, non-negative
    /// values, chain bounds at most [`MAX_CHAIN`]; the wild rate accepts
    /// a percentage in `0.0..=100.0`.
    pub fn set(&mut self, key: SettingsKey, value: f64) -> Result<(), RadarError> {
        let invalid = RadarError::InvalidValue { key, value };
        let upper = match key {
            SettingsKey::ChainStart | SettingsKey::ChainMax => MAX_CHAIN,
            _ => u32::MAX,
        };

        match self.integer_field_mut(key) {
            Some(field) => {
                if !value.is_finite()
                    || value < 0.0
                    || value.fract() != 0.0
                    || value > f64::from(upper)
                {
                    return Err(invalid);
                }
                *field = value as u32;
            }
            None => {
                if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                    return Err(invalid);
                }
                self.pkmn_wildrate = value;
            }
        }
        Ok(())
    }

    fn integer_field_mut(&mut self, key: SettingsKey) -> Option<&mut u32> {
        match key {
            SettingsKey::ChainStart => Some(&mut self.chain_start),
            SettingsKey::ChainMax => Some(&mut self.chain_max),
            SettingsKey::SampleSize => Some(&mut self.sample_size),
            SettingsKey::TotalShinies => Some(&mut self.total_shinies),
            SettingsKey::TimeForCatch => Some(&mut self.time_for_catch),
            SettingsKey::TimeForRun => Some(&mut self.time_for_run),
            SettingsKey::TimeForReroll => Some(&mut self.time_for_reroll),
            SettingsKey::PkmnWildrate => None,
        }
    }

    /// Number of chain lengths a run over these settings covers.
    /// Saturates rather than wrapping for out-of-range bounds.
    pub fn chain_count(&self) -> usize {
        match self.chain_max.checked_sub(self.chain_start) {
            None => 0,
            Some(span) => usize::try_from(span)
                .ok()
                .and_then(|n| n.checked_add(1))
                .unwrap_or(usize::MAX),
        }
    }

    /// Wild rate as the engine consumes it: `ui_value * 10`, rounded.
    pub fn wildrate_permille(&self) -> u32 {
        (self.pkmn_wildrate * 10.0).round().clamp(0.0, u32::MAX as f64) as u32
    }

    /// Validate and convert to the engine's view of the parameters.
    pub fn engine_config(&self) -> Result<EngineConfig, RadarError> {
        if let Some(len) = [self.chain_start, self.chain_max]
            .into_iter()
            .find(|len| *len > MAX_CHAIN)
        {
            return Err(RadarError::ChainTooLong(len));
        }
        let pkmn_wildrate = self.wildrate_permille();
        if pkmn_wildrate == 0 || pkmn_wildrate > MAX_WILDRATE_PERMILLE {
            return Err(RadarError::WildrateOutOfRange(pkmn_wildrate));
        }
        if self.sample_size == 0 {
            return Err(RadarError::EmptySample);
        }
        if self.total_shinies == 0 {
            return Err(RadarError::NoShiniesRequested);
        }

        Ok(EngineConfig {
            chain_start: self.chain_start,
            chain_max: self.chain_max,
            sample_size: self.sample_size,
            total_shinies: self.total_shinies,
            pkmn_wildrate,
            time_for_catch: self.time_for_catch,
            time_for_run: self.time_for_run,
            time_for_reroll: self.time_for_reroll,
        })
    }
}

/// Parameters as seen by a [`ComputeEngine`](crate::ComputeEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub chain_start: u32,
    pub chain_max: u32,
    pub sample_size: u32,
    pub total_shinies: u32,
    // in thousandths
    pub pkmn_wildrate: u32,
    pub time_for_catch: u32,
    pub time_for_run: u32,
    pub time_for_reroll: u32,
}
