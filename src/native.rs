//! Native hosting: one OS thread per worker slot, with the coordinator on
//! the calling thread.
//!
//! Each worker thread owns its request queue and reports back through a
//! shared event channel. The coordinator consumes that channel one event
//! at a time, so the pool, results and progress stay single-threaded.

use std::sync::Arc;
use std::thread;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::executor::{block_on, block_on_stream};
use futures::StreamExt;
use log::{debug, error, warn};

use crate::aggregator::Listener;
use crate::engine::ComputeEngine;
use crate::orchestrator::Orchestrator;
use crate::pool::{SlotHandle, WorkerPool};
use crate::protocol::{RunRequest, WorkerReply};
use crate::worker_agent::execute;
use crate::RadarError;

/// What the coordinator hears from a worker thread.
#[derive(Debug)]
pub enum SlotEvent {
    Message { slot: usize, reply: WorkerReply },
    Lost { slot: usize },
}

/// Request side of a worker thread.
pub struct ThreadSlot {
    slot: usize,
    requests: UnboundedSender<RunRequest>,
}

impl SlotHandle for ThreadSlot {
    fn post(&self, request: RunRequest) {
        if let Err(e) = self.requests.unbounded_send(request) {
            warn!(
                "worker slot {} is gone, chain {} not sent",
                self.slot,
                e.into_inner().target
            );
        }
    }
}

// Reports the slot as lost if its thread unwinds.
struct LossGuard {
    slot: usize,
    events: UnboundedSender<SlotEvent>,
}

impl Drop for LossGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self.events.unbounded_send(SlotEvent::Lost { slot: self.slot });
        }
    }
}

/// Start the worker thread for `slot`.
pub fn spawn_slot<E>(
    slot: usize,
    engine: Arc<E>,
    events: UnboundedSender<SlotEvent>,
) -> Result<ThreadSlot, RadarError>
where
    E: ComputeEngine + Send + Sync + 'static,
{
    let (requests, inbox) = unbounded::<RunRequest>();

    thread::Builder::new()
        .name(format!("radar-slot-{}", slot))
        .spawn(move || {
            let guard = LossGuard {
                slot,
                events: events.clone(),
            };
            if events
                .unbounded_send(SlotEvent::Message {
                    slot,
                    reply: WorkerReply::Ready,
                })
                .is_err()
            {
                return;
            }

            for request in block_on_stream(inbox) {
                debug!("slot {} running for chain length {}", slot, request.target);
                let reply = execute(engine.as_ref(), &request);
                let event = SlotEvent::Message {
                    slot,
                    reply: WorkerReply::Finished(reply),
                };
                if events.unbounded_send(event).is_err() {
                    break;
                }
            }
            drop(guard);
        })
        .map_err(|e| RadarError::Spawn(e.to_string()))?;

    Ok(ThreadSlot { slot, requests })
}

/// An [`Orchestrator`] driven by worker threads.
pub struct NativeConductor {
    orchestrator: Orchestrator<ThreadSlot>,
    events: UnboundedReceiver<SlotEvent>,
}

impl NativeConductor {
    /// Start `workers` threads (at least one) sharing `engine`.
    pub fn new<E>(engine: E, workers: usize, listener: Listener) -> Result<Self, RadarError>
    where
        E: ComputeEngine + Send + Sync + 'static,
    {
        let engine = Arc::new(engine);
        let (tx, events) = unbounded();
        let pool = WorkerPool::try_new(workers, |slot| {
            spawn_slot(slot, Arc::clone(&engine), tx.clone())
        })?;
        // only the worker threads keep senders, so the stream ends when
        // the last one exits
        drop(tx);

        Ok(Self {
            orchestrator: Orchestrator::new(pool, listener),
            events,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator<ThreadSlot> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator<ThreadSlot> {
        &mut self.orchestrator
    }

    /// Start a run over the current settings and block until it finishes.
    pub fn run_blocking(&mut self) -> Result<(), RadarError> {
        self.orchestrator.run()?;
        self.wait()
    }

    /// Process worker events until the current run is finished.
    pub fn wait(&mut self) -> Result<(), RadarError> {
        if !self.orchestrator.progress().started() {
            return Ok(());
        }
        while !self.orchestrator.progress().finished() {
            let Some(event) = block_on(self.events.next()) else {
                error!("all workers exited before the run finished");
                return Err(RadarError::PoolClosed);
            };
            self.handle(event)?;
        }
        Ok(())
    }

    fn handle(&mut self, event: SlotEvent) -> Result<(), RadarError> {
        match event {
            SlotEvent::Message { slot, reply } => self.orchestrator.on_worker_message(slot, reply),
            SlotEvent::Lost { slot } => self.orchestrator.on_worker_lost(slot),
        }
    }
}
