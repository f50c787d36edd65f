//! Browser hosting: the conductor lives on the page, each slot is a
//! `RadarTask` web worker reached through a yew-agent bridge.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};
use log::{error, info, warn};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use yew_agent::Spawnable;

use crate::aggregator::Listener;
use crate::config::WORKER_SCRIPT;
use crate::orchestrator::Orchestrator;
use crate::pool::{SlotHandle, WorkerPool};
use crate::protocol::{Command, ConductorEvent, RunRequest, WorkerReply};
use crate::utils::{detected_parallelism, init_logging, worker_count};
use crate::worker_agent::RadarTask;
use crate::RadarError;

pub struct WebSlot {
    slot: usize,
    requests: UnboundedSender<RunRequest>,
}

impl SlotHandle for WebSlot {
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

struct Shared {
    orchestrator: RefCell<Orchestrator<WebSlot>>,
    outbox: Rc<RefCell<VecDeque<ConductorEvent>>>,
    on_event: js_sys::Function,
}

impl Shared {
    /// Hand queued events to JS. No borrow is held during the call, so
    /// the listener may call back into the conductor.
    fn flush(&self) {
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        loop {
            let Some(event) = self.outbox.borrow_mut().pop_front() else {
                break;
            };
            match event.serialize(&serializer) {
                Ok(value) => {
                    if let Err(e) = self.on_event.call1(&JsValue::NULL, &value) {
                        error!("event listener threw: {:?}", e);
                    }
                }
                Err(e) => error!("failed to serialize event: {}", e),
            }
        }
    }

    fn fail(&self, err: &RadarError) {
        error!("{}", err);
        self.orchestrator.borrow_mut().report_failure(err);
    }

    fn deliver(&self, slot: usize, reply: WorkerReply) {
        let result = self.orchestrator.borrow_mut().on_worker_message(slot, reply);
        if let Err(e) = result {
            self.fail(&e);
        }
        self.flush();
    }

    fn lost(&self, slot: usize) {
        let result = self.orchestrator.borrow_mut().on_worker_lost(slot);
        if let Err(e) = result {
            self.fail(&e);
        }
        self.flush();
    }
}

/// Wire slot `slot` to a freshly spawned worker.
fn connect(slot: usize, script: &str, mut inbox: UnboundedReceiver<RunRequest>, shared: Weak<Shared>) {
    let bridge = <RadarTask as Spawnable>::spawner().spawn(script);
    let (mut sink, mut stream) = bridge.split();

    spawn_local(async move {
        while let Some(request) = inbox.next().await {
            if sink.send(request).await.is_err() {
                error!("worker slot {} refused a request", slot);
                break;
            }
        }
    });

    spawn_local(async move {
        while let Some(reply) = stream.next().await {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            shared.deliver(slot, reply);
        }
        if let Some(shared) = shared.upgrade() {
            shared.lost(slot);
        }
    });
}

/// Conductor exposed to JavaScript.
///
/// `onEvent` receives plain objects tagged by `kind`: `GET_CONFIG`,
/// `FINISHED_CHAIN`, `CHAIN_FAILED`, `RUN_COMPLETE` and `RUN_FAILED`.
#[wasm_bindgen]
pub struct WebConductor {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl WebConductor {
    #[wasm_bindgen(constructor)]
    pub fn new(worker_script: Option<String>, on_event: js_sys::Function) -> WebConductor {
        console_error_panic_hook::set_once();
        init_logging();

        let script = worker_script.unwrap_or_else(|| WORKER_SCRIPT.to_string());
        let workers = worker_count(detected_parallelism());
        info!("starting {} workers from {}", workers, script);

        let outbox: Rc<RefCell<VecDeque<ConductorEvent>>> = Rc::default();
        let listener: Listener = {
            let outbox = outbox.clone();
            Box::new(move |event| outbox.borrow_mut().push_back(event))
        };

        let mut inboxes = Vec::with_capacity(workers);
        let pool = WorkerPool::new(workers, |slot| {
            let (requests, inbox) = unbounded();
            inboxes.push(inbox);
            WebSlot { slot, requests }
        });

        let shared = Rc::new(Shared {
            orchestrator: RefCell::new(Orchestrator::new(pool, listener)),
            outbox,
            on_event,
        });
        for (slot, inbox) in inboxes.into_iter().enumerate() {
            connect(slot, &script, inbox, Rc::downgrade(&shared));
        }

        WebConductor { shared }
    }

    /// Current value of `param`, or `null` if the name is unknown.
    pub fn get(&self, param: &str) -> JsValue {
        self.shared
            .orchestrator
            .borrow()
            .get(param)
            .map(JsValue::from_f64)
            .unwrap_or(JsValue::NULL)
    }

    pub fn set(&self, param: &str, val: f64) {
        self.shared.orchestrator.borrow_mut().set(param, val);
    }

    /// Start a run; resolves to the number of chains queued.
    pub fn run(&self) -> Result<usize, JsValue> {
        let result = self.shared.orchestrator.borrow_mut().run();
        let outcome = result.map_err(|e| {
            self.shared.fail(&e);
            JsValue::from_str(&e.to_string())
        });
        self.shared.flush();
        outcome
    }

    /// Accept a `{cmd: "GET" | "SET" | "RUN", ...}` message.
    pub fn command(&self, msg: JsValue) -> Result<(), JsValue> {
        let command: Command = match serde_wasm_bindgen::from_value(msg) {
            Ok(command) => command,
            Err(e) => {
                error!("unknown event message: {}", e);
                return Ok(());
            }
        };

        let result = self.shared.orchestrator.borrow_mut().handle_command(command);
        let outcome = result.map_err(|e| {
            self.shared.fail(&e);
            JsValue::from_str(&e.to_string())
        });
        self.shared.flush();
        outcome
    }

    #[wasm_bindgen(js_name = workerCount)]
    pub fn worker_count(&self) -> usize {
        self.shared.orchestrator.borrow().pool().len()
    }
}
