//! Error types for the UI-test runner
//!
//! Action errors (element lookups, key dispatch, assertions, focus) are
//! turned into report outcomes by the engine. Everything else is a load or
//! boundary failure and propagates to the caller.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the UI-test runner
#[derive(Error, Debug)]
pub enum Error {
    // === Action Errors ===
    #[error("Could not find {selector} after {timeout_ms} ms")]
    ElementNotFound { selector: String, timeout_ms: u64 },

    #[error("Could not press {key}: {reason}")]
    KeyDispatchFailed { key: String, reason: String },

    #[error("No on-screen key for '{glyph}' in {selector}")]
    UnknownKeyGlyph { selector: String, glyph: String },

    #[error("Value in {selector} does not match {expected} (found '{actual}')")]
    AssertionMismatch {
        selector: String,
        expected: String,
        actual: String,
    },

    #[error("Focus lost after pressing {key}")]
    FocusLost { key: String },

    // === Script Errors ===
    #[error("Unknown command '{0}'. Use 'uitest commands' to list available commands")]
    UnknownCommand(String),

    #[error("Invalid arguments for '{command}': {reason}")]
    InvalidArguments { command: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Script line {line}: {source}")]
    ScriptLine {
        line: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("{failed} command(s) failed, {incomplete} not completed")]
    RunFailed { failed: usize, incomplete: usize },

    // === Driver Errors ===
    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Element {0} no longer exists")]
    StaleElement(u64),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an element not found error
    pub fn element_not_found(selector: &str, timeout_ms: u64) -> Self {
        Self::ElementNotFound {
            selector: selector.to_string(),
            timeout_ms,
        }
    }

    /// Create a key dispatch error
    pub fn key_dispatch_failed(key: &str, reason: &str) -> Self {
        Self::KeyDispatchFailed {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid arguments error
    pub fn invalid_arguments(command: &str, reason: &str) -> Self {
        Self::InvalidArguments {
            command: command.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid selector error
    pub fn selector(selector: &str, reason: &str) -> Self {
        Self::Selector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Attach a 1-based script line number
    pub fn at_line(self, line: usize) -> Self {
        Self::ScriptLine {
            line,
            source: Box::new(self),
        }
    }

    /// Whether this error ends the run instead of being recorded and skipped
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::FocusLost { .. })
    }
}
