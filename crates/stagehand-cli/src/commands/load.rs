// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Load command: read files on the worker thread and resume on `update`.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use stagehand_rt::bridge::file::FileLoader;
use stagehand_rt::{spawn, HostLoop, MonotonicClock, Scheduler, StageId};

use super::{profile, CommandArgs};
use crate::output;

pub fn cmd_load(args: &[String]) -> Result<()> {
    let args = CommandArgs::parse(args)?;
    let mut paths: Vec<PathBuf> = args.positional.iter().map(PathBuf::from).collect();
    paths.extend(args.file.clone());
    if paths.is_empty() {
        bail!("load needs at least one file");
    }
    let config = args.runtime_config()?;

    let scheduler = Rc::new(Scheduler::with_config(&config, MonotonicClock::new()));
    let update = scheduler.stage(StageId::UPDATE);
    let loader = Rc::new(FileLoader::new().context("Failed to start the file worker")?);
    loader.run_on(Rc::clone(&update), scheduler.stop_token());

    let total = paths.len();
    let failed = Rc::new(Cell::new(0_usize));
    let remaining = Rc::new(Cell::new(total));

    for path in paths {
        let loader = Rc::clone(&loader);
        let update = Rc::clone(&update);
        let sched = Rc::clone(&scheduler);
        let failed = Rc::clone(&failed);
        let remaining = Rc::clone(&remaining);
        spawn(async move {
            let started = update.now();
            let shown = path.display().to_string();
            match loader.read(path).await {
                Ok(bytes) => println!(
                    "  {} {} ({} bytes, {})",
                    output::status_pass(),
                    output::file_path(&shown),
                    bytes.len(),
                    output::duration_ms(update.now() - started)
                ),
                Err(err) => {
                    failed.set(failed.get() + 1);
                    println!("  {} {}: {}", output::status_fail(), output::file_path(&shown), err);
                }
            }
            remaining.set(remaining.get() - 1);
            if remaining.get() == 0 {
                sched.request_stop();
            }
        });
    }

    let summary = HostLoop::from_config(&scheduler, &config).run();
    scheduler.shutdown();

    if remaining.get() > 0 {
        bail!(
            "loop stopped after {} frame(s) with {} file(s) still loading",
            summary.frames,
            remaining.get()
        );
    }
    if args.profile {
        profile::print_report(scheduler.traces(), 10);
    }
    if failed.get() > 0 {
        println!("{}", output::banner_fail("Load", failed.get()));
        bail!("{} of {} file(s) failed to load", failed.get(), total);
    }
    println!(
        "{}",
        output::banner_ok(&format!("Load: {} file(s) in {} frame(s)", total, summary.frames))
    );
    Ok(())
}
