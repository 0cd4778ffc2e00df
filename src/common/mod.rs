//! Common utilities shared by the runner, the drivers and the CLI

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
