//! Store configuration, read from `config.vidb` in the data directory.

use crate::diagnostics::Diagnostics;
use crate::error::{Result, VidbError};
use crate::util::write_atomic;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.vidb";

/// Default seconds between background reloads.
pub const DEFAULT_POLL_DELAY: u64 = 10;

const POLL_DELAY_KEY: &str = "pollDelay";

/// Configuration for a database directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Seconds to sleep between background reloads.
    #[serde(rename = "pollDelay")]
    pub poll_delay: u64,

    /// Keys this version does not interpret, kept so they survive a rewrite.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_delay: DEFAULT_POLL_DELAY,
            extra: serde_json::Map::new(),
        }
    }
}

impl Config {
    /// Sets the poll delay in seconds.
    #[must_use]
    pub fn with_poll_delay(mut self, seconds: u64) -> Self {
        self.poll_delay = seconds;
        self
    }

    /// Sleep between poll cycles. Never shorter than one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_delay.max(1))
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outcome of parsing a config document.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Every recognized field was present and well-typed.
    Complete(Config),
    /// Some recognized field was missing or ill-typed and got its default.
    Repaired(Config),
}

impl Parsed {
    pub fn into_config(self) -> Config {
        match self {
            Parsed::Complete(config) | Parsed::Repaired(config) => config,
        }
    }
}

/// Parse config text, filling in defaults for missing or ill-typed fields.
/// Fails only when the text is not a JSON object.
pub fn parse_config_str(content: &str) -> Result<Parsed> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| VidbError::ConfigLoad(format!("malformed {CONFIG_FILE}: {e}")))?;
    let serde_json::Value::Object(mut map) = value else {
        return Err(VidbError::ConfigLoad(format!(
            "{CONFIG_FILE} must be a JSON object"
        )));
    };

    let complete = map.get(POLL_DELAY_KEY).and_then(|v| v.as_u64()).is_some();
    if !complete {
        map.insert(POLL_DELAY_KEY.to_string(), DEFAULT_POLL_DELAY.into());
    }

    let config: Config = serde_json::from_value(serde_json::Value::Object(map))?;
    Ok(if complete {
        Parsed::Complete(config)
    } else {
        Parsed::Repaired(config)
    })
}

/// Load the config at `path`, never failing.
///
/// A missing file or an incomplete document is replaced with defaults and
/// written back. A malformed document is reported and defaults are used in
/// memory, but the file is left for the operator to fix.
pub fn load_or_default(path: &Path, diagnostics: &Diagnostics) -> Config {
    let config = match std::fs::read_to_string(path) {
        Ok(content) => match parse_config_str(&content) {
            Ok(Parsed::Complete(config)) => return config,
            Ok(Parsed::Repaired(config)) => {
                diagnostics.notice(&format!(
                    "{CONFIG_FILE} found, but some necessary parameters are missing, replacing with default"
                ));
                config
            }
            Err(e) => {
                diagnostics.report("Config", &e);
                return Config::default();
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            diagnostics.notice(&format!("No {CONFIG_FILE} found, replacing with default"));
            Config::default()
        }
        Err(e) => {
            let err = VidbError::ConfigLoad(format!("failed to read {}: {e}", path.display()));
            diagnostics.report("Config", &err);
            return Config::default();
        }
    };

    if let Err(e) = write_config(path, &config) {
        diagnostics.report("Config", &e);
    }
    config
}

fn write_config(path: &Path, config: &Config) -> Result<()> {
    let text = config.to_json_string()?;
    write_atomic(path, &text).map_err(|source| VidbError::Persist {
        path: path.display().to_string(),
        source,
    })
}
