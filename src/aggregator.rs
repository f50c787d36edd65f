//! Result collection and run progress.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::engine::{QuantileSummary, SUMMARY_LEN};
use crate::protocol::{ConductorEvent, RunReply};
use crate::utils::now_ms;
use crate::RadarError;

/// Receives every [`ConductorEvent`] the conductor produces.
pub type Listener = Box<dyn FnMut(ConductorEvent)>;

/// Quantiles (seconds) for one chain length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub chain_len: u32,
    pub q09: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub q91: f64,
}

impl ResultRecord {
    pub fn from_summary(chain_len: u32, s: QuantileSummary) -> Self {
        Self {
            chain_len,
            q09: s[0],
            q25: s[1],
            q50: s[2],
            q75: s[3],
            q91: s[4],
        }
    }

    /// Build a record from a raw engine buffer of exactly five values.
    pub fn from_raw(chain_len: u32, raw: &[f64]) -> Result<Self, RadarError> {
        let summary: QuantileSummary = raw
            .try_into()
            .map_err(|_| RadarError::MalformedSummary(raw.len()))?;
        Ok(Self::from_summary(chain_len, summary))
    }

    /// Split a flat buffer of back-to-back summaries, labelling them
    /// `chain_start`, `chain_start + 1`, ...
    pub fn batch_from_raw(raw: &[f64], chain_start: u32) -> Result<Vec<Self>, RadarError> {
        if raw.len() % SUMMARY_LEN != 0 {
            return Err(RadarError::MalformedSummary(raw.len()));
        }

        raw.chunks_exact(SUMMARY_LEN)
            .zip(chain_start..)
            .map(|(chunk, len)| Self::from_raw(len, chunk))
            .collect()
    }

    pub fn iqr(&self) -> f64 {
        self.q75 - self.q25
    }
}

/// Records keyed by chain length; sparse until a run completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: BTreeMap<u32, ResultRecord>,
}

impl ResultSet {
    /// Insert `record`, returning the one it replaced.
    pub fn insert(&mut self, record: ResultRecord) -> Option<ResultRecord> {
        self.records.insert(record.chain_len, record)
    }

    pub fn get(&self, chain_len: u32) -> Option<&ResultRecord> {
        self.records.get(&chain_len)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records in ascending chain length.
    pub fn iter(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.values()
    }

    pub fn chain_lens(&self) -> impl Iterator<Item = u32> + '_ {
        self.records.keys().copied()
    }
}

/// Timer and counter for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressState {
    start_time: Option<f64>,
    stop_time: Option<f64>,
    splits: usize,
    total: usize,
    finished: bool,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a run of `total` jobs. An empty run is finished at once.
    pub fn start(&mut self, total: usize) {
        self.start_time = Some(now_ms());
        self.stop_time = None;
        self.finished = false;
        self.splits = 0;
        self.total = total;
        if total == 0 {
            self.done();
        }
    }

    /// Count one completed job.
    pub fn split(&mut self) -> Result<(), RadarError> {
        if self.start_time.is_none() {
            return Err(RadarError::SplitBeforeStart);
        }
        self.splits += 1;
        if !self.finished && self.splits >= self.total {
            self.done();
        }
        Ok(())
    }

    fn done(&mut self) {
        self.stop_time = Some(now_ms());
        self.finished = true;
    }

    pub fn splits(&self) -> usize {
        self.splits
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn started(&self) -> bool {
        self.start_time.is_some()
    }

    /// Seconds from `start` to completion, or to now while running.
    pub fn elapsed_secs(&self) -> Option<f64> {
        let start = self.start_time?;
        let stop = self.stop_time.unwrap_or_else(now_ms);
        Some((stop - start) / 1000.0)
    }

    /// One-line status in the style of the run indicator.
    pub fn describe(&self) -> String {
        match (self.finished, self.elapsed_secs()) {
            (true, Some(secs)) => format!("Simulation completed in {:.2} seconds", secs),
            (_, None) => "Timer not started".to_string(),
            (false, Some(_)) => format!(
                "Running [{} chains finished of {} total]",
                self.splits, self.total
            ),
        }
    }
}

/// Owns the results and progress of the current run.
pub struct ResultAggregator {
    results: ResultSet,
    failed: BTreeMap<u32, String>,
    progress: ProgressState,
    run_id: u64,
    listener: Listener,
}

impl ResultAggregator {
    pub fn new(listener: Listener) -> Self {
        Self {
            results: ResultSet::default(),
            failed: BTreeMap::new(),
            progress: ProgressState::new(),
            run_id: 0,
            listener,
        }
    }

    /// Clear previous results and begin a run of `total` chains. Returns
    /// the id completions must carry to be counted.
    pub fn start(&mut self, total: usize) -> u64 {
        self.run_id += 1;
        self.results.clear();
        self.failed.clear();
        self.progress.start(total);
        info!("run {} started with {} chains", self.run_id, total);
        if self.progress.finished() {
            self.emit_complete();
        }
        self.run_id
    }

    /// Record one worker reply for run `run_id`.
    pub fn on_result(&mut self, run_id: u64, reply: RunReply) -> Result<(), RadarError> {
        if run_id != self.run_id {
            debug!(
                "dropping chain {} from finished run {}",
                reply.chain_len, run_id
            );
            return Ok(());
        }

        let chain_len = reply.chain_len;
        let event = match reply.raw {
            Ok(raw) => {
                let record = ResultRecord::from_raw(chain_len, &raw)?;
                if self.results.insert(record).is_some() {
                    warn!("chain {} reported twice, keeping the latest", chain_len);
                }
                debug!("new data for len {}", chain_len);
                ConductorEvent::FinishedChain { data: record }
            }
            Err(reason) => {
                warn!("chain {} failed: {}", chain_len, reason);
                self.failed.insert(chain_len, reason.clone());
                ConductorEvent::ChainFailed { chain_len, reason }
            }
        };

        self.progress.split()?;
        (self.listener)(event);

        if self.progress.finished() && self.progress.splits() == self.progress.total() {
            self.emit_complete();
        }
        Ok(())
    }

    fn emit_complete(&mut self) {
        let elapsed_secs = self.progress.elapsed_secs().unwrap_or(0.0);
        info!("{}", self.progress.describe());
        (self.listener)(ConductorEvent::RunComplete {
            elapsed_secs,
            chains: self.results.len(),
        });
    }

    /// Forward an event that did not originate here.
    pub fn notify(&mut self, event: ConductorEvent) {
        (self.listener)(event);
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn failed(&self) -> &BTreeMap<u32, String> {
        &self.failed
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }
}
