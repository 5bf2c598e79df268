// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Headless demo: `stagehand demo [--frames N] [--profile] [--simulated] [--file <path>]`.
//!
//! A handful of scenes run side by side as tasks. Each one leans on a
//! different runtime primitive and signals a latch when it is done; a
//! director waits for every latch (with a deadline), then stops the show.

use std::cell::Cell;
use std::fmt::Display;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use stagehand_rt::bridge::file::FileLoader;
use stagehand_rt::{
    spawn, timeout, with_timeout, Event, ExclusiveEvent, HostLoop, ManualClock, MonotonicClock,
    PermanentEvent, Race, Scheduler, Stage, StageId,
};

use super::{profile, CommandArgs};
use crate::output;

/// Clock step per frame in `--simulated` mode.
const SIMULATED_FRAME_MS: u64 = 16;
const SHOW_DEADLINE_MS: u64 = 5_000;
const PATROL_SPEED: f64 = 0.5;
const PATROL_ROUTE: [(f64, f64); 4] = [(100.0, 0.0), (100.0, 100.0), (0.0, 100.0), (0.0, 0.0)];
const TYPEWRITER_CHAR_MS: u64 = 30;
const SCRIPT: [&str; 3] = [
    "Is this a dagger which I see before me?",
    "Out, out, brief candle!",
    "Exit, pursued by a bear.",
];
const LINE_GAP_MS: u64 = 150;

pub fn cmd_demo(args: &[String]) -> Result<()> {
    let args = CommandArgs::parse(args)?;
    let config = args.runtime_config()?;

    let manual = ManualClock::new();
    let scheduler = Rc::new(if args.simulated {
        Scheduler::with_config(&config, manual.clone())
    } else {
        Scheduler::with_config(&config, MonotonicClock::new())
    });

    let prop_file = args
        .file
        .clone()
        .or_else(|| args.positional.first().map(PathBuf::from));
    let loader = match prop_file {
        Some(_) => Some(Rc::new(
            FileLoader::new().context("Failed to start the file worker")?,
        )),
        None => None,
    };

    let show = Show::new(Rc::clone(&scheduler));
    let mut scenes = vec![
        show.curtain_up(),
        show.patrol(),
        show.typewriter("The stage is set."),
        show.countdown(),
        show.dialogue(),
        show.choice(),
    ];
    if let (Some(loader), Some(path)) = (&loader, prop_file) {
        loader.run_on(Rc::clone(&show.update), scheduler.stop_token());
        scenes.push(show.prop_check(Rc::clone(loader), path));
    }
    show.director(scenes);

    let summary = HostLoop::from_config(&scheduler, &config).run_with(|_, _| {
        if args.simulated {
            manual.advance(SIMULATED_FRAME_MS);
        }
    });
    let leftover = scheduler.shutdown();
    if leftover > 0 {
        log::debug!("{} task(s) were still parked when the show ended", leftover);
    }

    println!(
        "{}",
        output::banner_ok(&format!(
            "Demo: {} frame(s), {} resumption(s)",
            summary.frames, summary.resumed
        ))
    );
    if args.profile {
        profile::print_report(scheduler.traces(), 15);
    }
    Ok(())
}

fn say(stage: &Stage, who: &str, line: impl Display) {
    println!("{} {}: {}", output::stage_stamp(stage), output::actor(who), line);
}

struct Show {
    scheduler: Rc<Scheduler>,
    update: Rc<Stage>,
    render: Rc<Stage>,
}

impl Show {
    fn new(scheduler: Rc<Scheduler>) -> Self {
        let update = scheduler.stage(StageId::UPDATE);
        let render = scheduler.stage(StageId::RENDER);
        Self {
            scheduler,
            update,
            render,
        }
    }

    fn latch(&self) -> Rc<PermanentEvent> {
        Rc::new(PermanentEvent::new(Rc::clone(&self.update)))
    }

    fn curtain_up(&self) -> Rc<PermanentEvent> {
        let done = self.latch();
        let latch = Rc::clone(&done);
        let sched = Rc::clone(&self.scheduler);
        let startup = self.scheduler.stage(StageId::STARTUP);
        spawn(async move {
            sched.on_stage(StageId::STARTUP).await;
            say(&startup, "stagehand", "curtain up");
            latch.trigger();
        });
        done
    }

    /// Walks a square at a fixed speed using each frame's delta, and reports
    /// every corner from the render stage.
    fn patrol(&self) -> Rc<PermanentEvent> {
        let done = self.latch();
        let latch = Rc::clone(&done);
        let sched = Rc::clone(&self.scheduler);
        let update = Rc::clone(&self.update);
        let render = Rc::clone(&self.render);
        spawn(async move {
            let mut pos = (0.0_f64, 0.0_f64);
            for (corner, &target) in PATROL_ROUTE.iter().enumerate() {
                loop {
                    update.next_tick().await;
                    if sched.stop_requested() {
                        return;
                    }
                    let step = PATROL_SPEED * update.delta() as f64;
                    let (dx, dy) = (target.0 - pos.0, target.1 - pos.1);
                    let distance = dx.hypot(dy);
                    if distance <= step {
                        pos = target;
                        break;
                    }
                    pos = (pos.0 + dx / distance * step, pos.1 + dy / distance * step);
                }
                render.next_tick().await;
                say(
                    &render,
                    "patrol",
                    format!("reached corner {} at ({:.0}, {:.0})", corner + 1, pos.0, pos.1),
                );
            }
            latch.trigger();
        });
        done
    }

    fn typewriter(&self, text: &'static str) -> Rc<PermanentEvent> {
        let done = self.latch();
        let latch = Rc::clone(&done);
        let update = Rc::clone(&self.update);
        spawn(async move {
            let start = update.now();
            let mut shown = String::new();
            for ch in text.chars() {
                update.sleep(TYPEWRITER_CHAR_MS).await;
                shown.push(ch);
            }
            say(
                &update,
                "typewriter",
                format!(
                    "\"{}\" ({} chars in {}ms)",
                    shown,
                    shown.chars().count(),
                    update.now() - start
                ),
            );
            latch.trigger();
        });
        done
    }

    /// Three growing sleeps against a 350ms deadline; the third one overruns.
    fn countdown(&self) -> Rc<PermanentEvent> {
        let done = self.latch();
        let latch = Rc::clone(&done);
        let update = Rc::clone(&self.update);
        spawn(async move {
            let token = timeout(&update, 350);
            for (round, ms) in [100_u64, 200, 300].into_iter().enumerate() {
                update.sleep(ms).await;
                if token.is_cancelled() {
                    say(
                        &update,
                        "timeout",
                        format!("cancelled after {} sleep(s)", round + 1),
                    );
                    latch.trigger();
                    return;
                }
                say(&update, "timeout", format!("sleep {} finished in time", round + 1));
            }
            say(&update, "timeout", "finished before the deadline");
            latch.trigger();
        });
        done
    }

    /// A narrator broadcasts lines; every listener hears each one.
    fn dialogue(&self) -> Rc<PermanentEvent> {
        const LISTENERS: [&str; 2] = ["audience", "prompter"];

        let done = self.latch();
        let lines: Rc<Event<Option<&'static str>>> = Rc::new(Event::new(Rc::clone(&self.update)));
        let finished = Rc::new(Cell::new(0));

        for listener in LISTENERS {
            let lines = Rc::clone(&lines);
            let update = Rc::clone(&self.update);
            let finished = Rc::clone(&finished);
            let latch = Rc::clone(&done);
            spawn(async move {
                let mut heard = 0;
                while let Some(line) = lines.wait().await {
                    heard += 1;
                    say(&update, listener, format!("hears \"{}\"", line));
                }
                say(&update, listener, format!("heard {} line(s)", heard));
                finished.set(finished.get() + 1);
                if finished.get() == LISTENERS.len() {
                    latch.trigger();
                }
            });
        }

        let update = Rc::clone(&self.update);
        spawn(async move {
            for line in SCRIPT {
                update.sleep(LINE_GAP_MS).await;
                let woken = lines.trigger(Some(line));
                say(&update, "narrator", format!("line delivered to {} listener(s)", woken));
            }
            update.sleep(LINE_GAP_MS).await;
            lines.trigger(None);
        });
        done
    }

    /// A race decides between the player and an auto-pick; the result goes
    /// to the one chooser allowed to wait on the exclusive event.
    fn choice(&self) -> Rc<PermanentEvent> {
        let done = self.latch();
        let picked: Rc<ExclusiveEvent<u32>> = Rc::new(ExclusiveEvent::new(Rc::clone(&self.update)));

        let event = Rc::clone(&picked);
        let update = Rc::clone(&self.update);
        let latch = Rc::clone(&done);
        spawn(async move {
            match event.wait().await {
                Ok(option) => say(&update, "chooser", format!("goes with option {}", option)),
                Err(err) => say(&update, "chooser", err),
            }
            latch.trigger();
        });

        let event = Rc::clone(&picked);
        let update = Rc::clone(&self.update);
        spawn(async move {
            update.next_tick().await;
            if let Err(err) = event.wait().await {
                say(&update, "understudy", format!("turned away: {}", err));
            }
        });

        let update = Rc::clone(&self.update);
        spawn(async move {
            let decision = Race::scope(Rc::clone(&update), |race| {
                let handle = race.handle();
                let stage = Rc::clone(&update);
                race.spawn(async move {
                    for _ in 0..3 {
                        handle.yield_now().await;
                    }
                    stage.sleep(120).await;
                });
                let stage = Rc::clone(&update);
                race.spawn(async move { stage.sleep(400).await });
            });
            let winner = decision.await;
            let who = if winner == 0 { "player" } else { "auto-pick" };
            say(&update, "race", format!("{} decided first (candidate {})", who, winner));
            picked.trigger(winner);
        });
        done
    }

    fn prop_check(&self, loader: Rc<FileLoader>, path: PathBuf) -> Rc<PermanentEvent> {
        let done = self.latch();
        let latch = Rc::clone(&done);
        let update = Rc::clone(&self.update);
        spawn(async move {
            match loader.read(path.clone()).await {
                Ok(bytes) => say(
                    &update,
                    "props",
                    format!("loaded {} ({} bytes)", path.display(), bytes.len()),
                ),
                Err(err) => say(
                    &update,
                    "props",
                    format!("could not load {}: {}", path.display(), err),
                ),
            }
            latch.trigger();
        });
        done
    }

    fn director(&self, scenes: Vec<Rc<PermanentEvent>>) {
        let sched = Rc::clone(&self.scheduler);
        let update = Rc::clone(&self.update);
        let cleanup = self.scheduler.stage(StageId::CLEANUP);
        spawn(async move {
            let total = scenes.len();
            let wrapped = async move {
                for scene in &scenes {
                    scene.wait().await;
                }
            };
            match with_timeout(Rc::clone(&update), SHOW_DEADLINE_MS, wrapped).await {
                Ok(()) => say(&update, "director", format!("all {} scenes wrapped", total)),
                Err(err) => say(&update, "director", format!("{}; wrapping up anyway", err)),
            }
            sched.request_stop();
            cleanup.next_tick().await;
            say(&cleanup, "stagehand", "curtain down");
        });
    }
}
