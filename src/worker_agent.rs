//! Web Worker agent that runs one chain length per request.

use crate::engine::{ComputeEngine, RadarEngine};
use crate::protocol::{RunReply, RunRequest, WorkerReply};
use futures::sink::SinkExt;
use futures::StreamExt;
use log::info;
use yew_agent::reactor::{reactor, ReactorScope};

/// Run `request` on `engine` and package the answer for the pool.
pub fn execute<E: ComputeEngine + ?Sized>(engine: &E, request: &RunRequest) -> RunReply {
    let raw = request
        .settings
        .engine_config()
        .and_then(|config| engine.run(&config, request.target))
        .map(|summary| summary.to_vec())
        .map_err(|e| e.to_string());

    RunReply {
        chain_len: request.target,
        raw,
    }
}

/// Worker reactor: announces itself with `Ready`, then answers every
/// `RunRequest` with exactly one `Finished`.
#[reactor]
pub async fn RadarTask(mut scope: ReactorScope<RunRequest, WorkerReply>) {
    if scope.send(WorkerReply::Ready).await.is_err() {
        return;
    }

    let engine = RadarEngine::new();
    while let Some(request) = scope.next().await {
        info!("running for chain length {}", request.target);
        let reply = execute(&engine, &request);

        // abort loop if all bridges dropped
        if scope.send(WorkerReply::Finished(reply)).await.is_err() {
            break;
        }
    }
}
