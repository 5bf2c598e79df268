// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Help text for CLI commands.

use crate::output;

pub fn print_usage() {
    println!(
        "{} {} - Staged cooperative tasks for frame loops",
        output::title("Stagehand"),
        output::version(env!("CARGO_PKG_VERSION"))
    );
    println!();
    println!(
        "{}: {} {} {}",
        output::section_header("Usage"),
        output::command("stagehand"),
        output::arg("<command>"),
        output::arg("[args]")
    );
    println!();
    println!("{}", output::section_header("Commands:"));
    println!("  {}              Run the headless demo show", output::command("demo"));
    println!("  {} {}   Read files through the worker bridge", output::command("load"), output::arg("<file>..."));
    println!("  {}            List stages and the frame order", output::command("stages"));
    println!("  {}              Show this help", output::command("help"));
    println!("  {}           Show version", output::command("version"));

    println!();
    println!("{}", output::section_header("Options:"));
    println!("  {} {}  Config file (default: stagehand.toml if present)", output::arg("--config"), output::arg("<path>"));
    println!("  {} {}        Stop after N frames", output::arg("--frames"), output::arg("<n>"));
    println!("  {}          Print await-site timings after the run", output::arg("--profile"));
    println!("  {}        Drive the clock 16ms per frame instead of wall time", output::arg("--simulated"));
    println!("  {} {}    File for the demo to load", output::arg("--file"), output::arg("<path>"));

    println!();
    println!("{}", output::section_header("Environment:"));
    println!("  {}    Log filter, e.g. debug or stagehand_rt=trace", output::arg("STAGEHAND_LOG"));
    println!("  {}  Log colors: auto, always, never", output::arg("STAGEHAND_LOG_STYLE"));
    println!("  {}         Disable colored output", output::arg("NO_COLOR"));
}
