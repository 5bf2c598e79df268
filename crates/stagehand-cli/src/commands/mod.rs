// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! CLI command implementations.

pub mod demo;
pub mod load;
pub mod profile;
pub mod stages;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use stagehand_rt::RuntimeConfig;

use crate::config;

/// Flags shared by the runtime commands. Anything that is not a flag is
/// collected as a positional argument.
#[derive(Debug, Default)]
pub struct CommandArgs {
    pub config: Option<PathBuf>,
    pub frames: Option<u64>,
    pub profile: bool,
    pub simulated: bool,
    pub file: Option<PathBuf>,
    pub positional: Vec<String>,
}

impl CommandArgs {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut parsed = Self::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => parsed.config = Some(PathBuf::from(value(&mut iter, arg)?)),
                "--file" => parsed.file = Some(PathBuf::from(value(&mut iter, arg)?)),
                "--frames" => {
                    let raw = value(&mut iter, arg)?;
                    let frames = raw
                        .parse()
                        .with_context(|| format!("--frames expects a number, got '{}'", raw))?;
                    parsed.frames = Some(frames);
                }
                "--profile" => parsed.profile = true,
                "--simulated" => parsed.simulated = true,
                flag if flag.starts_with("--") => bail!("unknown option '{}'", flag),
                _ => parsed.positional.push(arg.clone()),
            }
        }
        Ok(parsed)
    }

    /// Config file contents with command-line overrides applied.
    pub fn runtime_config(&self) -> Result<RuntimeConfig> {
        let mut config = config::load(self.config.as_deref())?;
        if self.frames.is_some() {
            config.max_frames = self.frames;
        }
        if self.simulated {
            config.frame_sleep_ms = 0;
        }
        Ok(config)
    }
}

fn value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<&'a String> {
    match iter.next() {
        Some(value) => Ok(value),
        None => bail!("{} needs a value", flag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_positionals() {
        let parsed = CommandArgs::parse(&args(&[
            "a.txt", "--frames", "12", "--profile", "b.txt", "--simulated",
        ]))
        .unwrap();
        assert_eq!(parsed.frames, Some(12));
        assert!(parsed.profile);
        assert!(parsed.simulated);
        assert_eq!(parsed.positional, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(CommandArgs::parse(&args(&["--frames"])).is_err());
        assert!(CommandArgs::parse(&args(&["--frames", "lots"])).is_err());
        assert!(CommandArgs::parse(&args(&["--loud"])).is_err());
    }
}
