//! Runtime orchestration for the file pipeline
//!
//! The Runtime owns the event loop and wires the pipeline as one deferred
//! chain:
//! 1. read the file on a background job
//! 2. report its length, strip its vowels and wait
//! 3. print a preview
//! 4. report any failure on stderr
//! 5. print a closing line whatever happened

use crate::cli::Cli;
use crate::console::{Console, Line};
use crate::error::{CliResult, PipelineError};
use async_runtime::{Deferred, EventLoop, LoopConfig};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Strips the lowercase vowels `a e i o u`.
///
/// # Example
/// ```
/// use deferred_cli::strip_vowels;
///
/// assert_eq!(strip_vowels("deferred value"), "dfrrd vl");
/// ```
pub fn strip_vowels(text: &str) -> String {
    static VOWELS: OnceLock<Regex> = OnceLock::new();
    VOWELS
        .get_or_init(|| Regex::new("[aieou]").expect("vowel pattern is valid"))
        .replace_all(text, "")
        .into_owned()
}

/// Drives the pipeline on its own event loop
pub struct Runtime {
    /// Event loop the pipeline runs on
    event_loop: EventLoop,
    /// Pause between reading and printing
    delay: Duration,
    /// Number of characters to print
    preview: usize,
    /// Whether output also goes to the process streams
    echo: bool,
}

impl Runtime {
    /// Create a runtime with the default delay and preview length
    ///
    /// # Example
    /// ```
    /// use async_runtime::LoopConfig;
    /// use deferred_cli::Runtime;
    ///
    /// let runtime = Runtime::new(LoopConfig::new());
    /// ```
    pub fn new(config: LoopConfig) -> Self {
        Self {
            event_loop: EventLoop::with_config(config),
            delay: Duration::from_millis(2000),
            preview: 200,
            echo: false,
        }
    }

    /// Create a runtime from parsed arguments
    pub fn from_cli(cli: &Cli) -> Self {
        Self::new(cli.loop_config())
            .with_delay(cli.delay())
            .with_preview(cli.preview)
    }

    /// Set the pause between reading and printing
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set how many characters of the stripped text are printed
    pub fn with_preview(mut self, preview: usize) -> Self {
        self.preview = preview;
        self
    }

    /// Also write output to stdout and stderr
    pub fn with_echo(mut self, enabled: bool) -> Self {
        self.echo = enabled;
        self
    }

    /// Run the pipeline over the file at `path`
    ///
    /// A read failure is not an error here: it is reported on the transcript's
    /// stderr and the closing line is still printed.
    ///
    /// # Errors
    /// Returns `CliError::Loop` if the event loop gives up before the chain
    /// settles.
    ///
    /// # Example
    /// ```no_run
    /// use async_runtime::LoopConfig;
    /// use deferred_cli::Runtime;
    ///
    /// let mut runtime = Runtime::new(LoopConfig::new());
    /// let transcript = runtime.run_file("notes.txt").unwrap();
    /// ```
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> CliResult<Vec<Line>> {
        let path = path.as_ref().to_path_buf();
        let handle = self.event_loop.handle();
        let console = Console::new(self.echo);
        tracing::info!(path = %path.display(), "starting pipeline");

        let text: Deferred<String, PipelineError> = handle.spawn_blocking(move || {
            fs::read_to_string(&path).map_err(|err| PipelineError::read(&path, &err))
        });

        let out = console.clone();
        let delay = self.delay;
        let stripped: Deferred<String, PipelineError> = text.then(move |text| {
            out.println(format!("{} characters read", text.chars().count()));
            handle.delay::<_, PipelineError>(delay, strip_vowels(&text))
        });

        let out = console.clone();
        let preview = self.preview;
        let printed: Deferred<(), PipelineError> = stripped.then(move |text| {
            out.println(text.chars().take(preview).collect::<String>());
            Ok(())
        });

        let err = console.clone();
        let caught = printed.catch(move |reason| {
            tracing::debug!(%reason, "pipeline rejected");
            err.eprintln(format!("Error: {reason}"));
            Ok(())
        });

        let out = console.clone();
        let done = caught.finally(move || out.println("---All done---"));

        self.event_loop.run_until_settled(&done)?;
        Ok(console.transcript())
    }
}
