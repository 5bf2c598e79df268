// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Config file loading: `stagehand.toml` or `--config <path>`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use stagehand_rt::RuntimeConfig;

pub const DEFAULT_CONFIG_FILE: &str = "stagehand.toml";

/// Load the runtime config. An explicit path must exist; the default file
/// is optional and its absence means defaults.
pub fn load(explicit: Option<&Path>) -> Result<RuntimeConfig> {
    match explicit {
        Some(path) => load_from_file(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if !path.exists() {
                log::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                return Ok(RuntimeConfig::default());
            }
            load_from_file(path)
        }
    }
}

fn load_from_file(path: &Path) -> Result<RuntimeConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: RuntimeConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    log::debug!("loaded config from {}: {:?}", path.display(), config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_frames = 10\nframe_sleep_ms = 0").unwrap();
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.max_frames, Some(10));
        assert_eq!(config.frame_sleep_ms, 0);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_frames = \"many\"").unwrap();
        let err = load(Some(file.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }
}
