// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Stages command: show the registered stages and the per-frame order.

use anyhow::Result;
use stagehand_rt::{MonotonicClock, Scheduler, StageId};

use super::CommandArgs;
use crate::output;

pub fn cmd_stages(args: &[String]) -> Result<()> {
    let args = CommandArgs::parse(args)?;
    let config = args.runtime_config()?;
    let scheduler = Scheduler::with_config(&config, MonotonicClock::new());

    println!("{}", output::section_header("Stages:"));
    for stage in scheduler.stages() {
        let kind = if stage.id().is_builtin() { "built-in" } else { "custom" };
        println!(
            "  {:#010x}  {} {}",
            stage.id().raw(),
            output::command(&format!("{:<12}", stage.name())),
            output::hint_text(kind)
        );
    }

    let mut frame = vec!["update".to_string(), "render".to_string()];
    frame.extend(config.extra_stages.iter().cloned());
    println!();
    println!(
        "{} {} once, then each frame: {}, then {} once",
        output::section_header("Order:"),
        StageId::STARTUP,
        frame.join(" -> "),
        StageId::CLEANUP
    );
    match config.max_frames {
        Some(limit) => println!("  frame limit {}, {}ms pause", limit, config.frame_sleep_ms),
        None => println!("  no frame limit, {}ms pause", config.frame_sleep_ms),
    }
    Ok(())
}
