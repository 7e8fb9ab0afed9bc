//! Command-line arguments

use async_runtime::LoopConfig;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// Reads a file, waits, strips its vowels and prints a preview.
#[derive(Debug, Parser)]
#[command(name = "deferred-demo", version, about)]
pub struct Cli {
    /// File to read
    pub file: PathBuf,

    /// How long to wait before printing, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub delay_ms: u64,

    /// Number of characters of the stripped text to print
    #[arg(long, default_value_t = 200)]
    pub preview: usize,

    /// Abort after this many event loop steps
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Abort if the background read takes longer than this, in milliseconds
    #[arg(long)]
    pub idle_timeout_ms: Option<u64>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The event loop limits requested on the command line.
    pub fn loop_config(&self) -> LoopConfig {
        let mut config = LoopConfig::new();
        if let Some(limit) = self.max_steps {
            config = config.with_max_steps(limit);
        }
        if let Some(ms) = self.idle_timeout_ms {
            config = config.with_idle_timeout(Duration::from_millis(ms));
        }
        config
    }

    /// The pause between reading and printing.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}
