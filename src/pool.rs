//! Bounded-concurrency job scheduler.
//!
//! The pool owns a fixed set of worker slots and a FIFO queue of jobs.
//! Every state-changing event (a job queued, a worker reporting ready, a
//! worker finishing) ends with a single dispatch pass that hands queued
//! jobs to idle slots in ascending slot order. A slot only ever holds one
//! job, and only the pool changes a slot's status.
//!
//! The pool never blocks: sending work to a slot is fire-and-forget
//! through its [`SlotHandle`], and answers come back through
//! [`WorkerPool::on_message`] on the coordinating thread.

use std::collections::VecDeque;
use std::fmt;

use log::{debug, error, warn};

use crate::protocol::{RunReply, RunRequest, WorkerReply};
use crate::{RadarError, Settings};

/// Transport to one isolated worker.
pub trait SlotHandle {
    /// Hand `request` to the worker. Must not block.
    fn post(&self, request: RunRequest);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Worker not loaded yet; never assigned work.
    Init,
    Ready,
    Running,
}

/// Completion callback: receives the invocation context and the reply.
pub type Completion<C> = Box<dyn FnOnce(&mut C, RunReply) -> Result<(), RadarError>>;

/// A single chain length to compute, with its own settings snapshot.
pub struct Job<C> {
    request: RunRequest,
    on_complete: Completion<C>,
}

impl<C> Job<C> {
    pub fn new<F>(settings: Settings, target: u32, on_complete: F) -> Self
    where
        F: FnOnce(&mut C, RunReply) -> Result<(), RadarError> + 'static,
    {
        Job {
            request: RunRequest { settings, target },
            on_complete: Box::new(on_complete),
        }
    }

    pub fn target(&self) -> u32 {
        self.request.target
    }

    pub fn settings(&self) -> &Settings {
        &self.request.settings
    }
}

impl<C> fmt::Debug for Job<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("target", &self.request.target)
            .finish_non_exhaustive()
    }
}

struct InFlight<C> {
    target: u32,
    on_complete: Completion<C>,
}

enum SlotState<C> {
    Init,
    Ready,
    Running(InFlight<C>),
}

struct WorkerSlot<H, C> {
    handle: H,
    state: SlotState<C>,
    lost: bool,
}

impl<H, C> WorkerSlot<H, C> {
    fn status(&self) -> SlotStatus {
        match self.state {
            SlotState::Init => SlotStatus::Init,
            SlotState::Ready => SlotStatus::Ready,
            SlotState::Running(_) => SlotStatus::Running,
        }
    }
}

pub struct WorkerPool<H: SlotHandle, C> {
    slots: Vec<WorkerSlot<H, C>>,
    jobs: VecDeque<Job<C>>,
}

impl<H: SlotHandle, C> WorkerPool<H, C> {
    /// Create `size` slots (at least one), all waiting for their worker to
    /// report ready. `factory` is called with each slot index in order.
    pub fn new<F>(size: usize, mut factory: F) -> Self
    where
        F: FnMut(usize) -> H,
    {
        let size = size.max(1);
        let slots = (0..size)
            .map(|idx| WorkerSlot {
                handle: factory(idx),
                state: SlotState::Init,
                lost: false,
            })
            .collect();

        WorkerPool {
            slots,
            jobs: VecDeque::new(),
        }
    }

    /// Same as [`WorkerPool::new`] for factories that can fail; the first
    /// error aborts construction.
    pub fn try_new<F, E>(size: usize, mut factory: F) -> Result<Self, E>
    where
        F: FnMut(usize) -> Result<H, E>,
    {
        let size = size.max(1);
        let mut slots = Vec::with_capacity(size);
        for idx in 0..size {
            slots.push(WorkerSlot {
                handle: factory(idx)?,
                state: SlotState::Init,
                lost: false,
            });
        }

        Ok(WorkerPool {
            slots,
            jobs: VecDeque::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn status(&self, slot: usize) -> Option<SlotStatus> {
        self.slots.get(slot).map(WorkerSlot::status)
    }

    pub fn statuses(&self) -> Vec<SlotStatus> {
        self.slots.iter().map(WorkerSlot::status).collect()
    }

    pub fn running(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.status() == SlotStatus::Running)
            .count()
    }

    /// Target currently computed by `slot`, if it is running.
    pub fn in_flight(&self, slot: usize) -> Option<u32> {
        match self.slots.get(slot).map(|s| &s.state) {
            Some(SlotState::Running(job)) => Some(job.target),
            _ => None,
        }
    }

    pub fn queued(&self) -> impl Iterator<Item = &Job<C>> {
        self.jobs.iter()
    }

    pub fn queued_len(&self) -> usize {
        self.jobs.len()
    }

    pub fn handle(&self, slot: usize) -> Option<&H> {
        self.slots.get(slot).map(|s| &s.handle)
    }

    /// Append `job` to the queue and dispatch whatever can run now.
    pub fn queue_job(&mut self, job: Job<C>) {
        debug!("queueing chain {}", job.target());
        self.jobs.push_back(job);
        self.dispatch();
    }

    /// Feed one message from the worker behind `slot` into the pool.
    ///
    /// A `Finished` reply marks the slot ready, runs the job's callback
    /// against `ctx`, then dispatches. The callback's error is returned
    /// after dispatching so a failed callback never strands the slot.
    pub fn on_message(
        &mut self,
        slot: usize,
        message: WorkerReply,
        ctx: &mut C,
    ) -> Result<(), RadarError> {
        let Some(worker) = self.slots.get_mut(slot) else {
            warn!("message from unknown worker slot {}", slot);
            return Ok(());
        };

        let result = match message {
            WorkerReply::Ready => {
                match worker.state {
                    SlotState::Init if worker.lost => {
                        warn!("lost worker slot {} reported ready", slot);
                    }
                    SlotState::Init => {
                        debug!("worker slot {} is ready", slot);
                        worker.state = SlotState::Ready;
                    }
                    _ => warn!("worker slot {} reported ready twice", slot),
                }
                Ok(())
            }
            WorkerReply::Finished(reply) => {
                match std::mem::replace(&mut worker.state, SlotState::Ready) {
                    SlotState::Running(job) => {
                        if job.target != reply.chain_len {
                            warn!(
                                "worker slot {} answered chain {} while running chain {}",
                                slot, reply.chain_len, job.target
                            );
                        }
                        (job.on_complete)(ctx, reply)
                    }
                    previous => {
                        warn!(
                            "unsolicited result for chain {} from worker slot {}",
                            reply.chain_len, slot
                        );
                        worker.state = previous;
                        Ok(())
                    }
                }
            }
        };

        self.dispatch();
        result
    }

    /// The worker behind `slot` is gone. The slot drops back to `Init` so it
    /// is never assigned again; a job it was running is not retried.
    pub fn on_worker_lost(&mut self, slot: usize) -> Result<(), RadarError> {
        let Some(worker) = self.slots.get_mut(slot) else {
            warn!("unknown worker slot {} reported lost", slot);
            return Ok(());
        };

        worker.lost = true;
        match std::mem::replace(&mut worker.state, SlotState::Init) {
            SlotState::Running(job) => {
                error!("worker slot {} lost while running chain {}", slot, job.target);
                Err(RadarError::WorkerLost {
                    slot,
                    target: Some(job.target),
                })
            }
            _ => {
                error!("worker slot {} lost", slot);
                if self.slots.iter().all(|s| s.lost) && !self.jobs.is_empty() {
                    return Err(RadarError::WorkerLost { slot, target: None });
                }
                Ok(())
            }
        }
    }

    fn dispatch(&mut self) {
        while !self.jobs.is_empty() {
            let Some(idx) = self
                .slots
                .iter()
                .position(|s| s.status() == SlotStatus::Ready)
            else {
                break;
            };
            let Some(job) = self.jobs.pop_front() else {
                break;
            };

            let Job {
                request,
                on_complete,
            } = job;
            let slot = &mut self.slots[idx];
            debug!("dispatching chain {} to worker slot {}", request.target, idx);
            slot.state = SlotState::Running(InFlight {
                target: request.target,
                on_complete,
            });
            slot.handle.post(request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(usize, RunRequest)>>>;

    struct RecordingSlot {
        idx: usize,
        log: Log,
    }

    impl SlotHandle for RecordingSlot {
        fn post(&self, request: RunRequest) {
            self.log.borrow_mut().push((self.idx, request));
        }
    }

    fn pool(size: usize) -> (WorkerPool<RecordingSlot, Vec<u32>>, Log) {
        let log: Log = Rc::default();
        let pool = WorkerPool::new(size, |idx| RecordingSlot {
            idx,
            log: log.clone(),
        });
        (pool, log)
    }

    fn job(target: u32) -> Job<Vec<u32>> {
        Job::new(Settings::default(), target, |done: &mut Vec<u32>, reply| {
            done.push(reply.chain_len);
            Ok(())
        })
    }

    fn finished(target: u32) -> WorkerReply {
        WorkerReply::Finished(RunReply {
            chain_len: target,
            raw: Ok(vec![0.0; 5]),
        })
    }

    fn assignments(log: &Log) -> Vec<(usize, u32)> {
        log.borrow().iter().map(|(s, r)| (*s, r.target)).collect()
    }

    fn ready_all<H: SlotHandle>(pool: &mut WorkerPool<H, Vec<u32>>, done: &mut Vec<u32>) {
        for slot in 0..pool.len() {
            pool.on_message(slot, WorkerReply::Ready, done).unwrap();
        }
    }

    #[test]
    fn never_creates_an_empty_pool() {
        let (pool, _) = pool(0);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.statuses(), vec![SlotStatus::Init]);
    }

    #[test]
    fn nothing_is_dispatched_before_ready() {
        let (mut pool, log) = pool(2);
        pool.queue_job(job(1));
        assert!(log.borrow().is_empty());
        assert_eq!(pool.queued_len(), 1);

        let mut done = Vec::new();
        pool.on_message(1, WorkerReply::Ready, &mut done).unwrap();
        assert_eq!(assignments(&log), vec![(1, 1)]);
        assert_eq!(pool.statuses(), vec![SlotStatus::Init, SlotStatus::Running]);
    }

    #[test]
    fn three_slots_five_targets() {
        let (mut pool, log) = pool(3);
        let mut done = Vec::new();
        ready_all(&mut pool, &mut done);

        for t in 1..=5 {
            pool.queue_job(job(t));
        }
        assert_eq!(assignments(&log), vec![(0, 1), (1, 2), (2, 3)]);
        assert_eq!(pool.running(), 3);
        assert_eq!(pool.queued_len(), 2);

        // out-of-order completion
        pool.on_message(2, finished(3), &mut done).unwrap();
        assert_eq!(assignments(&log)[3], (2, 4));
        pool.on_message(0, finished(1), &mut done).unwrap();
        assert_eq!(assignments(&log)[4], (0, 5));
        assert!(pool.running() <= 3);

        pool.on_message(1, finished(2), &mut done).unwrap();
        pool.on_message(0, finished(5), &mut done).unwrap();
        pool.on_message(2, finished(4), &mut done).unwrap();

        done.sort_unstable();
        assert_eq!(done, vec![1, 2, 3, 4, 5]);
        assert_eq!(pool.running(), 0);
        assert_eq!(pool.queued_len(), 0);
        assert_eq!(pool.statuses(), vec![SlotStatus::Ready; 3]);
    }

    #[test]
    fn assignment_is_fifo_and_bounded() {
        let (mut pool, log) = pool(2);
        let mut done = Vec::new();
        for t in 10..20 {
            pool.queue_job(job(t));
        }
        ready_all(&mut pool, &mut done);

        let mut next = 0;
        while pool.running() > 0 {
            assert!(pool.running() <= 2);
            let slot = (0..2).find(|s| pool.in_flight(*s).is_some()).unwrap();
            let target = pool.in_flight(slot).unwrap();
            pool.on_message(slot, finished(target), &mut done).unwrap();
            next += 1;
        }
        assert_eq!(next, 10);

        let targets: Vec<u32> = assignments(&log).into_iter().map(|(_, t)| t).collect();
        assert_eq!(targets, (10..20).collect::<Vec<_>>());
        assert_eq!(done.len(), 10);
    }

    #[test]
    fn queued_jobs_fill_idle_slots_in_index_order() {
        let (mut pool, log) = pool(3);
        let mut done = Vec::new();
        pool.on_message(0, WorkerReply::Ready, &mut done).unwrap();
        pool.queue_job(job(1));
        pool.on_message(1, WorkerReply::Ready, &mut done).unwrap();
        pool.on_message(2, WorkerReply::Ready, &mut done).unwrap();
        assert_eq!(pool.running(), 1);

        pool.queue_job(job(2));
        pool.queue_job(job(3));
        assert_eq!(assignments(&log), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn failing_callback_does_not_strand_the_slot() {
        let (mut pool, _log) = pool(1);
        let mut done = Vec::new();
        ready_all(&mut pool, &mut done);

        pool.queue_job(Job::new(Settings::default(), 1, |_: &mut Vec<u32>, _| {
            Err(RadarError::SplitBeforeStart)
        }));
        pool.queue_job(job(2));

        assert_eq!(
            pool.on_message(0, finished(1), &mut done),
            Err(RadarError::SplitBeforeStart)
        );
        assert_eq!(pool.in_flight(0), Some(2));
    }

    #[test]
    fn unsolicited_results_are_dropped() {
        let (mut pool, _log) = pool(1);
        let mut done = Vec::new();
        pool.on_message(0, finished(7), &mut done).unwrap();
        assert!(done.is_empty());
        assert_eq!(pool.status(0), Some(SlotStatus::Init));

        pool.on_message(5, WorkerReply::Ready, &mut done).unwrap();
        assert_eq!(pool.status(5), None);
    }

    #[test]
    fn lost_workers_are_never_reassigned() {
        let (mut pool, _log) = pool(2);
        let mut done = Vec::new();
        ready_all(&mut pool, &mut done);
        pool.queue_job(job(1));

        assert_eq!(
            pool.on_worker_lost(0),
            Err(RadarError::WorkerLost {
                slot: 0,
                target: Some(1)
            })
        );
        assert_eq!(pool.status(0), Some(SlotStatus::Init));

        // the lost slot never receives work again
        pool.queue_job(job(2));
        pool.queue_job(job(3));
        assert_eq!(pool.in_flight(1), Some(2));
        assert_eq!(pool.in_flight(0), None);
    }

    #[test]
    fn losing_every_worker_with_work_queued_fails() {
        let (mut pool, _log) = pool(1);
        pool.queue_job(job(1));
        assert_eq!(
            pool.on_worker_lost(0),
            Err(RadarError::WorkerLost {
                slot: 0,
                target: None
            })
        );
    }
}
