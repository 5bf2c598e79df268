// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Stagehand CLI - demo show, file loader and stage listing.

mod commands;
mod config;
mod help;
mod output;

use std::env;
use std::process;

use help::print_usage;

const LOG_ENV: &str = "STAGEHAND_LOG";
const LOG_STYLE_ENV: &str = "STAGEHAND_LOG_STYLE";

fn main() {
    init_logging();
    output::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    let rest = &args[2..];
    let result = match args[1].as_str() {
        "demo" => commands::demo::cmd_demo(rest),
        "load" => commands::load::cmd_load(rest),
        "stages" => commands::stages::cmd_stages(rest),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("stagehand {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            eprintln!("{}: unknown command '{}'", output::error_label(), other);
            eprintln!(
                "{}: {}",
                output::hint_label(),
                output::hint_text("run `stagehand help` for the list of commands")
            );
            process::exit(1);
        }
    };

    if let Err(err) = result {
        eprintln!("{}: {:#}", output::error_label(), err);
        process::exit(1);
    }
}

/// Logging stays off unless `STAGEHAND_LOG` is set.
fn init_logging() {
    if env::var_os(LOG_ENV).is_none() {
        return;
    }
    let env = env_logger::Env::new()
        .filter(LOG_ENV)
        .write_style(LOG_STYLE_ENV);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();
}
