//! The conductor: owns the live settings, turns a run into jobs and routes
//! worker messages through the pool into the aggregator.

use log::{error, info, warn};

use crate::aggregator::{Listener, ProgressState, ResultAggregator, ResultSet};
use crate::pool::{Job, SlotHandle, WorkerPool};
use crate::protocol::{Command, ConductorEvent, WorkerReply};
use crate::settings::{Settings, SettingsKey};
use crate::RadarError;

pub struct Orchestrator<H: SlotHandle> {
    settings: Settings,
    pool: WorkerPool<H, ResultAggregator>,
    results: ResultAggregator,
}

impl<H: SlotHandle> Orchestrator<H> {
    pub fn new(pool: WorkerPool<H, ResultAggregator>, listener: Listener) -> Self {
        Self::with_settings(Settings::default(), pool, listener)
    }

    pub fn with_settings(
        settings: Settings,
        pool: WorkerPool<H, ResultAggregator>,
        listener: Listener,
    ) -> Self {
        Self {
            settings,
            pool,
            results: ResultAggregator::new(listener),
        }
    }

    /// Current value of `param`, or `None` for an unknown name.
    pub fn get(&self, param: &str) -> Option<f64> {
        match param.parse::<SettingsKey>() {
            Ok(key) => Some(self.settings.get(key)),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Update `param`. Unknown names and unusable values are logged and ignored.
    pub fn set(&mut self, param: &str, val: f64) {
        let key = match param.parse::<SettingsKey>() {
            Ok(key) => key,
            Err(e) => {
                error!("unknown config set parameter: {}", e);
                return;
            }
        };
        if let Err(e) = self.settings.set(key, val) {
            error!("{}", e);
        }
    }

    /// Queue one job per chain length in `chain_start..=chain_max`, each
    /// carrying its own copy of the current settings. Returns the number
    /// of jobs queued.
    pub fn run(&mut self) -> Result<usize, RadarError> {
        self.settings.engine_config()?;

        let total = self.settings.chain_count();
        info!("starting run with worker pool: {:?}", self.settings);
        let run_id = self.results.start(total);

        if total > 0 {
            for target in self.settings.chain_start..=self.settings.chain_max {
                let job = Job::new(
                    self.settings.clone(),
                    target,
                    move |results: &mut ResultAggregator, reply| results.on_result(run_id, reply),
                );
                self.pool.queue_job(job);
            }
        }

        Ok(total)
    }

    /// Handle one conductor command. Only a failing `RUN` is an error.
    pub fn handle_command(&mut self, command: Command) -> Result<(), RadarError> {
        match command {
            Command::Get { param } => {
                let val = self.get(&param);
                self.results.notify(ConductorEvent::GetConfig { id: param, val });
                Ok(())
            }
            Command::Set { param, val } => {
                self.set(&param, val);
                Ok(())
            }
            Command::Run => self.run().map(|_| ()),
        }
    }

    pub fn on_worker_message(
        &mut self,
        slot: usize,
        message: WorkerReply,
    ) -> Result<(), RadarError> {
        self.pool.on_message(slot, message, &mut self.results)
    }

    pub fn on_worker_lost(&mut self, slot: usize) -> Result<(), RadarError> {
        self.pool.on_worker_lost(slot)
    }

    /// Tell the renderer that the current operation failed.
    pub fn report_failure(&mut self, err: &RadarError) {
        self.results.notify(ConductorEvent::RunFailed {
            reason: err.to_string(),
        });
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn results(&self) -> &ResultSet {
        self.results.results()
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.results
    }

    pub fn progress(&self) -> &ProgressState {
        self.results.progress()
    }

    pub fn pool(&self) -> &WorkerPool<H, ResultAggregator> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SlotStatus;
    use crate::protocol::{RunReply, RunRequest};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Posted = Rc<RefCell<Vec<(usize, RunRequest)>>>;

    struct RecordingSlot {
        idx: usize,
        posted: Posted,
    }

    impl SlotHandle for RecordingSlot {
        fn post(&self, request: RunRequest) {
            self.posted.borrow_mut().push((self.idx, request));
        }
    }

    struct Harness {
        conductor: Orchestrator<RecordingSlot>,
        posted: Posted,
        events: Rc<RefCell<Vec<ConductorEvent>>>,
    }

    fn harness(slots: usize) -> Harness {
        let posted: Posted = Rc::default();
        let events: Rc<RefCell<Vec<ConductorEvent>>> = Rc::default();
        let pool = {
            let posted = posted.clone();
            WorkerPool::new(slots, move |idx| RecordingSlot {
                idx,
                posted: posted.clone(),
            })
        };
        let sink = events.clone();
        let listener: Listener = Box::new(move |ev: ConductorEvent| sink.borrow_mut().push(ev));
        let mut conductor = Orchestrator::new(pool, listener);
        for slot in 0..slots {
            conductor.on_worker_message(slot, WorkerReply::Ready).unwrap();
        }
        Harness {
            conductor,
            posted,
            events,
        }
    }

    fn answer(h: &mut Harness, slot: usize) {
        let target = h.conductor.pool().in_flight(slot).unwrap();
        let reply = RunReply {
            chain_len: target,
            raw: Ok(vec![target as f64; 5]),
        };
        h.conductor
            .on_worker_message(slot, WorkerReply::Finished(reply))
            .unwrap();
    }

    fn drain(h: &mut Harness) {
        loop {
            let pool = h.conductor.pool();
            let Some(slot) = (0..pool.len()).find(|s| pool.in_flight(*s).is_some()) else {
                break;
            };
            answer(h, slot);
        }
    }

    #[test]
    fn get_and_set_by_field_key() {
        let mut h = harness(1);
        assert_eq!(h.conductor.get("chainMax"), Some(40.0));
        h.conductor.set("chainMax", 12.0);
        assert_eq!(h.conductor.get("chainMax"), Some(12.0));
        h.conductor.set("pkmnWildrate", 2.5);
        assert_eq!(h.conductor.get("pkmnWildrate"), Some(2.5));
        assert_eq!(h.conductor.settings().wildrate_permille(), 25);
    }

    #[test]
    fn unknown_params_are_not_fatal() {
        let mut h = harness(1);
        assert_eq!(h.conductor.get("nope"), None);
        h.conductor.set("nope", 3.0);
        h.conductor.set("sampleSize", -4.0);
        assert_eq!(h.conductor.settings(), &Settings::default());

        h.conductor
            .handle_command(Command::Get {
                param: "nope".into(),
            })
            .unwrap();
        assert_eq!(
            h.events.borrow().last(),
            Some(&ConductorEvent::GetConfig {
                id: "nope".into(),
                val: None
            })
        );
    }

    #[test]
    fn three_slots_five_targets() {
        let mut h = harness(3);
        h.conductor.set("chainStart", 1.0);
        h.conductor.set("chainMax", 5.0);
        assert_eq!(h.conductor.run(), Ok(5));

        let first: Vec<(usize, u32)> = h
            .posted
            .borrow()
            .iter()
            .map(|(s, r)| (*s, r.target))
            .collect();
        assert_eq!(first, vec![(0, 1), (1, 2), (2, 3)]);

        answer(&mut h, 1);
        answer(&mut h, 2);
        drain(&mut h);

        let lens: Vec<u32> = h.conductor.results().chain_lens().collect();
        assert_eq!(lens, vec![1, 2, 3, 4, 5]);
        assert_eq!(h.conductor.progress().splits(), 5);
        assert!(h.conductor.progress().finished());
        assert_eq!(h.conductor.pool().statuses(), vec![SlotStatus::Ready; 3]);
    }

    #[test]
    fn full_range_has_no_gaps() {
        let mut h = harness(4);
        h.conductor.set("chainStart", 3.0);
        h.conductor.set("chainMax", 17.0);
        h.conductor.run().unwrap();
        drain(&mut h);

        let lens: Vec<u32> = h.conductor.results().chain_lens().collect();
        assert_eq!(lens, (3..=17).collect::<Vec<_>>());
        assert_eq!(h.conductor.progress().total(), 15);
    }

    #[test]
    fn single_target_run() {
        let mut h = harness(2);
        h.conductor.set("chainStart", 7.0);
        h.conductor.set("chainMax", 7.0);
        assert_eq!(h.conductor.run(), Ok(1));
        assert_eq!(h.conductor.progress().total(), 1);
        assert!(!h.conductor.progress().finished());

        answer(&mut h, 0);
        assert!(h.conductor.progress().finished());
        assert_eq!(h.conductor.results().len(), 1);
    }

    #[test]
    fn inverted_range_finishes_with_no_jobs() {
        let mut h = harness(2);
        h.conductor.set("chainStart", 9.0);
        h.conductor.set("chainMax", 2.0);
        assert_eq!(h.conductor.run(), Ok(0));
        assert!(h.posted.borrow().is_empty());
        assert!(h.conductor.progress().finished());
        assert!(h.conductor.results().is_empty());
        assert!(matches!(
            h.events.borrow().last(),
            Some(ConductorEvent::RunComplete { chains: 0, .. })
        ));
    }

    #[test]
    fn invalid_settings_queue_nothing() {
        let mut h = harness(1);
        h.conductor.set("sampleSize", 0.0);
        assert_eq!(h.conductor.run(), Err(RadarError::EmptySample));
        assert!(h.posted.borrow().is_empty());
        assert!(!h.conductor.progress().started());
    }

    #[test]
    fn oversized_chain_max_is_refused() {
        let mut h = harness(2);
        h.conductor.set("chainMax", 3_000_000.0);
        assert_eq!(h.conductor.get("chainMax"), Some(40.0));
        assert_eq!(h.conductor.run(), Ok(40));
        assert_eq!(h.conductor.pool().queued_len(), 38);
    }

    #[test]
    fn later_settings_changes_do_not_reach_queued_jobs() {
        let mut h = harness(1);
        h.conductor.set("chainStart", 1.0);
        h.conductor.set("chainMax", 3.0);
        h.conductor.set("sampleSize", 100.0);
        h.conductor.run().unwrap();

        h.conductor.set("sampleSize", 9_999.0);
        h.conductor.set("pkmnWildrate", 50.0);

        assert_eq!(h.posted.borrow()[0].1.settings.sample_size, 100);
        for job in h.conductor.pool().queued() {
            assert_eq!(job.settings().sample_size, 100);
            assert_eq!(job.settings().pkmn_wildrate, 10.0);
        }
        drain(&mut h);
        assert!(h
            .posted
            .borrow()
            .iter()
            .all(|(_, r)| r.settings.sample_size == 100));
    }

    #[test]
    fn rerun_discards_the_previous_runs_results() {
        let mut h = harness(1);
        h.conductor.set("chainStart", 1.0);
        h.conductor.set("chainMax", 2.0);
        h.conductor.run().unwrap();
        h.conductor.run().unwrap();

        // chain 1 of the first run is in flight; its result is stale
        answer(&mut h, 0);
        assert_eq!(h.conductor.progress().splits(), 0);
        drain(&mut h);
        assert!(h.conductor.progress().finished());
        assert_eq!(h.conductor.results().len(), 2);
    }

    #[test]
    fn run_command_reports_invalid_settings() {
        let mut h = harness(1);
        h.conductor
            .handle_command(Command::Set {
                param: "totalShinies".into(),
                val: 0.0,
            })
            .unwrap();
        let err = h.conductor.handle_command(Command::Run).unwrap_err();
        assert_eq!(err, RadarError::NoShiniesRequested);
        h.conductor.report_failure(&err);
        assert!(matches!(
            h.events.borrow().last(),
            Some(ConductorEvent::RunFailed { .. })
        ));
    }
}
