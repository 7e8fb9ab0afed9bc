//! Output sink for the pipeline.
//!
//! Pipeline stages run on the event loop and print as they go. The console
//! records every line so a run can be inspected afterwards, and echoes to
//! the real stdout/stderr when the binary is driving it.

use parking_lot::Mutex;
use std::sync::Arc;

/// One printed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Written to stdout
    Out(String),
    /// Written to stderr
    Err(String),
}

impl Line {
    /// The text without its stream.
    pub fn text(&self) -> &str {
        match self {
            Line::Out(text) | Line::Err(text) => text,
        }
    }
}

/// A shared, recording console.
#[derive(Debug, Clone, Default)]
pub struct Console {
    lines: Arc<Mutex<Vec<Line>>>,
    echo: bool,
}

impl Console {
    /// Creates a console; `echo` also writes lines to the process streams.
    pub fn new(echo: bool) -> Self {
        Self {
            lines: Arc::default(),
            echo,
        }
    }

    /// Prints a line to stdout.
    pub fn println(&self, text: impl Into<String>) {
        let text = text.into();
        if self.echo {
            println!("{text}");
        }
        self.lines.lock().push(Line::Out(text));
    }

    /// Prints a line to stderr.
    pub fn eprintln(&self, text: impl Into<String>) {
        let text = text.into();
        if self.echo {
            eprintln!("{text}");
        }
        self.lines.lock().push(Line::Err(text));
    }

    /// Everything printed so far, in order.
    pub fn transcript(&self) -> Vec<Line> {
        self.lines.lock().clone()
    }
}
