// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Stage registry and process-wide stop flag.
//!
//! The scheduler does not run anything on its own. The host decides which
//! stages run and in what order; `run(id)` is just a lookup plus `tick()`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::cancel::{CancelSource, CancelToken};
use crate::clock::{Clock, MonotonicClock};
use crate::config::RuntimeConfig;
use crate::continuation::Continuation;
use crate::stage::{Stage, StageId, TickReport};
use crate::trace::TraceLog;

pub struct Scheduler {
    clock: Rc<dyn Clock>,
    stages: RefCell<BTreeMap<StageId, Rc<Stage>>>,
    stop: CancelSource,
    traces: TraceLog,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("stages", &self.stage_ids())
            .field("stop_requested", &self.stop_requested())
            .field("traces", &self.traces.len())
            .finish()
    }
}

impl Scheduler {
    /// Wall-clock scheduler with default configuration.
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self::with_config(&RuntimeConfig::default(), clock)
    }

    /// Builds the scheduler and registers the built-in stages plus every
    /// stage listed in `config.extra_stages`.
    pub fn with_config(config: &RuntimeConfig, clock: impl Clock + 'static) -> Self {
        let scheduler = Self {
            clock: Rc::new(clock),
            stages: RefCell::new(BTreeMap::new()),
            stop: CancelSource::new(),
            traces: TraceLog::with_capacity(config.trace_capacity),
        };
        for id in [
            StageId::STARTUP,
            StageId::UPDATE,
            StageId::RENDER,
            StageId::CLEANUP,
        ] {
            scheduler.stage(id);
        }
        for name in &config.extra_stages {
            scheduler.stage_named(name);
        }
        scheduler
    }

    /// The stage for `id`, registering it on first use.
    pub fn stage(&self, id: StageId) -> Rc<Stage> {
        let name = match id.builtin_name() {
            Some(name) => name.to_string(),
            None => id.to_string(),
        };
        self.register(id, name)
    }

    /// The user stage called `name`, registering it on first use.
    pub fn stage_named(&self, name: &str) -> Rc<Stage> {
        let stage = self.register(StageId::named(name), name.to_string());
        if names_collide(stage.name(), name) {
            log::warn!(
                "stage name `{}` hashes to the same id as `{}`; both share one stage",
                name,
                stage.name()
            );
        }
        stage
    }

    fn register(&self, id: StageId, name: String) -> Rc<Stage> {
        let mut stages = self.stages.borrow_mut();
        let stage = stages.entry(id).or_insert_with(|| {
            log::debug!("registered stage `{}` ({})", name, id);
            Rc::new(Stage::new(
                id,
                name,
                Rc::clone(&self.clock),
                self.traces.clone(),
            ))
        });
        Rc::clone(stage)
    }

    /// Tick one stage.
    pub fn run(&self, id: StageId) -> TickReport {
        self.stage(id).tick()
    }

    /// Suspend the running task until stage `id` next runs.
    #[track_caller]
    pub fn on_stage(&self, id: StageId) -> OnStage {
        OnStage {
            stage: self.stage(id),
            at: Location::caller(),
            parked: false,
        }
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.borrow().keys().copied().collect()
    }

    pub fn stages(&self) -> Vec<Rc<Stage>> {
        self.stages.borrow().values().cloned().collect()
    }

    pub fn stop_source(&self) -> &CancelSource {
        &self.stop
    }

    pub fn stop_token(&self) -> CancelToken {
        self.stop.token()
    }

    pub fn request_stop(&self) -> bool {
        let first = self.stop.request_stop();
        if first {
            log::debug!("stop requested");
        }
        first
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.stop_requested()
    }

    pub fn traces(&self) -> &TraceLog {
        &self.traces
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Destroy every task still parked on a stage. Returns the count.
    pub fn shutdown(&self) -> usize {
        let dropped: usize = self.stages().iter().map(|stage| stage.drain()).sum();
        if dropped > 0 {
            log::debug!("shutdown destroyed {} parked continuation(s)", dropped);
        }
        dropped
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`Scheduler::on_stage`].
#[must_use = "futures do nothing unless awaited"]
pub struct OnStage {
    stage: Rc<Stage>,
    at: &'static Location<'static>,
    parked: bool,
}

impl Future for OnStage {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.parked {
            return Poll::Ready(());
        }
        let cont = Continuation::capture(self.at);
        self.stage.schedule(cont);
        self.parked = true;
        Poll::Pending
    }
}

/// Two different user-stage names that hash to the same id. A stage first
/// registered by id carries a placeholder name and never collides.
fn names_collide(registered: &str, requested: &str) -> bool {
    registered != requested && StageId::named(registered) == StageId::named(requested)
}
