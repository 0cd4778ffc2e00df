//! CLI command definitions
//!
//! Defines the clap commands for the uitest CLI.

use clap::Subcommand;
use std::path::PathBuf;

use crate::common::config::DEFAULT_CONFIG_PATH;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the test script named by a configuration file against a page fixture
    Run {
        /// Runner configuration (JSON)
        #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Page fixture (YAML) describing the document to run against
        #[arg(long, short)]
        page: PathBuf,

        /// Run this script instead of the config's testFile
        #[arg(long)]
        script: Option<PathBuf>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a test script without running it
    Check {
        /// Path to the test script (JSON array of commands)
        script: PathBuf,
    },

    /// List the commands scripts can use
    Commands {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
