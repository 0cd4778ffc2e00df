//! Configuration file handling
//!
//! The runner is configured by a JSON descriptor next to the test script:
//!
//! ```json
//! {
//!   "keyMap": { "enter": 13, "down": 40 },
//!   "timeout": 3000,
//!   "testFile": "./login.json",
//!   "delayBetween": 250,
//!   "clearLocalStorage": true
//! }
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Error, Result};

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "tests/testingLib.config.json";

/// Runner configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Symbolic key name to key code, used by `keyPress`
    #[serde(default)]
    pub key_map: HashMap<String, u32>,

    /// How long element lookups wait, in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Location of the test script (JSON array of command strings)
    pub test_file: PathBuf,

    /// Delay inserted after every reported command, in milliseconds
    #[serde(default)]
    pub delay_between: u64,

    /// Clear the document's local storage once the run finishes
    #[serde(default)]
    pub clear_local_storage: bool,

    /// Abandon the rest of the script after the first failed command
    #[serde(default)]
    pub stop_on_failure: bool,

    /// Directory the config was loaded from; relative paths resolve against it
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_timeout() -> u64 {
    5000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            key_map: HashMap::new(),
            timeout: default_timeout(),
            test_file: PathBuf::new(),
            delay_between: 0,
            clear_local_storage: false,
            stop_on_failure: false,
            base_dir: PathBuf::from("."),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        let mut config = Self::from_json(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        tracing::debug!(
            path = %path.display(),
            keys = config.key_map.len(),
            timeout_ms = config.timeout,
            delay_ms = config.delay_between,
            "Loaded runner configuration"
        );

        Ok(config)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let mut config: Self =
            serde_json::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.base_dir = PathBuf::from(".");
        Ok(config)
    }

    /// Element lookup timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Inter-command delay
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_between)
    }

    /// Path of the test script, resolved against the config directory
    pub fn script_path(&self) -> PathBuf {
        if self.test_file.is_relative() {
            self.base_dir.join(&self.test_file)
        } else {
            self.test_file.clone()
        }
    }

    /// Load the test script this configuration points at
    pub fn load_script(&self) -> Result<Vec<String>> {
        load_script(&self.script_path())
    }
}

/// Load a test script: a JSON array of command strings
pub fn load_script(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;

    let lines: Vec<String> = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Test script '{}' must be a JSON array of strings: {}",
            path.display(),
            e
        ))
    })?;

    if lines.is_empty() {
        return Err(Error::Config(format!(
            "Test script '{}' contains no commands",
            path.display()
        )));
    }

    Ok(lines)
}
