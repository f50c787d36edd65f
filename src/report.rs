//! Unit conversion for presenting results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregator::ResultRecord;
use crate::utils::round2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Min,
    Hr,
    Days,
}

impl TimeUnit {
    /// Seconds per unit.
    pub fn factor(self) -> f64 {
        match self {
            TimeUnit::Min => 60.0,
            TimeUnit::Hr => 60.0 * 60.0,
            TimeUnit::Days => 60.0 * 60.0 * 24.0,
        }
    }

    pub fn short(self) -> &'static str {
        match self {
            TimeUnit::Min => "min",
            TimeUnit::Hr => "hr",
            TimeUnit::Days => "days",
        }
    }

    pub fn long(self) -> &'static str {
        match self {
            TimeUnit::Min => "minutes",
            TimeUnit::Hr => "hours",
            TimeUnit::Days => "days",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" => Ok(TimeUnit::Min),
            "hr" => Ok(TimeUnit::Hr),
            "days" => Ok(TimeUnit::Days),
            other => Err(format!("unknown unit '{}' (use min, hr or days)", other)),
        }
    }
}

/// One table row, scaled to a unit and rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub chain_len: u32,
    pub median: f64,
    pub iqr: f64,
    pub q09: f64,
    pub q25: f64,
    pub q75: f64,
    pub q91: f64,
}

impl ReportRow {
    pub fn new(record: &ResultRecord, unit: TimeUnit) -> Self {
        let scale = |secs: f64| round2(secs / unit.factor());
        Self {
            chain_len: record.chain_len,
            median: scale(record.q50),
            iqr: scale(record.iqr()),
            q09: scale(record.q09),
            q25: scale(record.q25),
            q75: scale(record.q75),
            q91: scale(record.q91),
        }
    }
}
