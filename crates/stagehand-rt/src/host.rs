// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Host loop.
//!
//! Runs `startup` once, then the frame stages in order every frame until a
//! stop is requested or the frame limit is hit, then `cleanup` once. The
//! frame in which a stop is requested still runs all of its stages, so
//! tasks can notice the stop and move themselves onto `cleanup`.

use std::thread;
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::scheduler::Scheduler;
use crate::stage::StageId;

/// Totals for one host-loop run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub resumed: usize,
}

pub struct HostLoop<'a> {
    scheduler: &'a Scheduler,
    frame_stages: Vec<StageId>,
    frame_sleep: Duration,
    max_frames: Option<u64>,
}

impl<'a> HostLoop<'a> {
    /// `update` then `render` each frame, no pause, no frame limit.
    pub fn new(scheduler: &'a Scheduler) -> Self {
        Self {
            scheduler,
            frame_stages: vec![StageId::UPDATE, StageId::RENDER],
            frame_sleep: Duration::ZERO,
            max_frames: None,
        }
    }

    /// Frame pause and limit from `config`; its extra stages run after
    /// `render`.
    pub fn from_config(scheduler: &'a Scheduler, config: &RuntimeConfig) -> Self {
        let mut frame_stages = vec![StageId::UPDATE, StageId::RENDER];
        frame_stages.extend(config.extra_stages.iter().map(|name| StageId::named(name)));
        Self {
            scheduler,
            frame_stages,
            frame_sleep: Duration::from_millis(config.frame_sleep_ms),
            max_frames: config.max_frames,
        }
    }

    pub fn frame_stages(mut self, stages: Vec<StageId>) -> Self {
        self.frame_stages = stages;
        self
    }

    pub fn frame_sleep(mut self, pause: Duration) -> Self {
        self.frame_sleep = pause;
        self
    }

    pub fn max_frames(mut self, limit: Option<u64>) -> Self {
        self.max_frames = limit;
        self
    }

    pub fn run(self) -> LoopSummary {
        self.run_with(|_, _| {})
    }

    /// Like `run`, calling `on_frame(scheduler, frame)` at the top of every
    /// frame, before any stage runs. That is where a host polls its input
    /// and may request a stop.
    pub fn run_with<F>(self, mut on_frame: F) -> LoopSummary
    where
        F: FnMut(&Scheduler, u64),
    {
        let scheduler = self.scheduler;
        let mut summary = LoopSummary::default();

        summary.resumed += scheduler.run(StageId::STARTUP).resumed;
        while !scheduler.stop_requested() {
            if self.max_frames.is_some_and(|max| summary.frames >= max) {
                scheduler.request_stop();
                break;
            }
            on_frame(scheduler, summary.frames);
            if self.max_frames.is_some_and(|max| summary.frames + 1 >= max) {
                log::debug!("frame limit reached after frame {}", summary.frames);
                scheduler.request_stop();
            }
            for &stage in &self.frame_stages {
                summary.resumed += scheduler.run(stage).resumed;
            }
            summary.frames += 1;
            if !self.frame_sleep.is_zero() && !scheduler.stop_requested() {
                thread::sleep(self.frame_sleep);
            }
        }
        summary.resumed += scheduler.run(StageId::CLEANUP).resumed;
        log::debug!(
            "host loop finished: {} frame(s), {} resumption(s)",
            summary.frames,
            summary.resumed
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::task::spawn;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn lifecycle_task(scheduler: &Rc<Scheduler>, log: &Rc<RefCell<Vec<String>>>) {
        let sched = Rc::clone(scheduler);
        let log = Rc::clone(log);
        spawn(async move {
            sched.on_stage(StageId::STARTUP).await;
            log.borrow_mut().push("startup".into());
            loop {
                sched.on_stage(StageId::UPDATE).await;
                if sched.stop_requested() {
                    break;
                }
                log.borrow_mut().push("update".into());
                sched.on_stage(StageId::RENDER).await;
                log.borrow_mut().push("render".into());
            }
            sched.on_stage(StageId::CLEANUP).await;
            log.borrow_mut().push("cleanup".into());
        });
    }

    #[test]
    fn frame_limit_runs_cleanup_last() {
        let scheduler = Rc::new(Scheduler::with_clock(ManualClock::new()));
        let log = Rc::new(RefCell::new(Vec::new()));
        lifecycle_task(&scheduler, &log);

        let summary = HostLoop::new(&scheduler).max_frames(Some(3)).run();
        assert_eq!(summary.frames, 3);
        assert_eq!(
            *log.borrow(),
            vec!["startup", "update", "render", "update", "render", "cleanup"]
        );
    }

    #[test]
    fn frame_hook_can_request_stop() {
        let scheduler = Rc::new(Scheduler::with_clock(ManualClock::new()));
        let log = Rc::new(RefCell::new(Vec::new()));
        lifecycle_task(&scheduler, &log);

        let summary = HostLoop::new(&scheduler).run_with(|sched, frame| {
            if frame == 1 {
                sched.request_stop();
            }
        });
        assert_eq!(summary.frames, 2);
        assert_eq!(log.borrow().last().map(String::as_str), Some("cleanup"));
    }

    #[test]
    fn zero_frame_limit_skips_frames() {
        let scheduler = Scheduler::with_clock(ManualClock::new());
        let summary = HostLoop::new(&scheduler).max_frames(Some(0)).run();
        assert_eq!(summary.frames, 0);
        assert!(scheduler.stop_requested());
    }

    #[test]
    fn config_extra_stages_run_each_frame() {
        let config = RuntimeConfig {
            frame_sleep_ms: 0,
            max_frames: Some(2),
            extra_stages: vec!["physics".to_string()],
            ..RuntimeConfig::default()
        };
        let scheduler = Rc::new(Scheduler::with_config(&config, ManualClock::new()));
        let ticks = Rc::new(RefCell::new(0));

        let sched = Rc::clone(&scheduler);
        let count = Rc::clone(&ticks);
        spawn(async move {
            while !sched.stop_requested() {
                sched.on_stage(StageId::named("physics")).await;
                *count.borrow_mut() += 1;
            }
        });

        HostLoop::from_config(&scheduler, &config).run();
        assert_eq!(*ticks.borrow(), 2);
    }
}
