//! Messages exchanged between the conductor, its workers and whatever
//! renders the results.

use serde::{Deserialize, Serialize};

use crate::aggregator::ResultRecord;
use crate::Settings;

/// Requests accepted by the conductor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "UPPERCASE")]
pub enum Command {
    Run,
    Get { param: String },
    Set { param: String, val: f64 },
}

/// One unit of work sent to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub settings: Settings,
    pub target: u32,
}

/// Worker answer to a [`RunRequest`]. Engine failures travel as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReply {
    pub chain_len: u32,
    pub raw: Result<Vec<f64>, String>,
}

/// Everything a worker can say to the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerReply {
    /// The worker has loaded and can accept work. Sent once.
    Ready,
    Finished(RunReply),
}

/// Notifications for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConductorEvent {
    GetConfig {
        id: String,
        val: Option<f64>,
    },
    FinishedChain {
        data: ResultRecord,
    },
    #[serde(rename_all = "camelCase")]
    ChainFailed {
        chain_len: u32,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    RunComplete {
        elapsed_secs: f64,
        chains: usize,
    },
    RunFailed {
        reason: String,
    },
}
