//! Phase spinner for interactive runs
//!
//! A single indicatif spinner on stderr showing which phase the scan is in
//! and how long it has been running. Quiet runs get a hidden spinner so the
//! engine can report phases unconditionally. Log lines go through
//! [`LogWriter`], which lifts the spinner while each line is written.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing_subscriber::fmt::MakeWriter;

const TICK_INTERVAL: Duration = Duration::from_millis(120);

/// Spinner tracking the current scan phase
pub struct ScanProgress {
    spinner: ProgressBar,
    start_time: Instant,
    enabled: bool,
}

impl ScanProgress {
    /// Create a visible spinner drawing to stderr
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} [{elapsed}] {msg}") {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(TICK_INTERVAL);

        Self {
            spinner,
            start_time: Instant::now(),
            enabled: true,
        }
    }

    /// Create a hidden spinner (quiet mode)
    pub fn disabled() -> Self {
        Self {
            spinner: ProgressBar::hidden(),
            start_time: Instant::now(),
            enabled: false,
        }
    }

    /// Show the phase currently running
    pub fn set_phase(&self, phase: &str) {
        self.spinner.set_message(phase.to_string());
    }

    /// Time since the spinner was created
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Is the spinner drawn
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stop and clear the spinner
    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    /// Run `f` with the spinner cleared from the terminal
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.spinner.suspend(f)
    }

    /// Stderr writer for the log subscriber that does not tear the spinner
    pub fn log_writer(&self) -> LogWriter {
        LogWriter {
            spinner: self.spinner.clone(),
        }
    }
}

/// Stderr log writer sharing the terminal with a [`ScanProgress`] spinner
#[derive(Clone)]
pub struct LogWriter {
    spinner: ProgressBar,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.spinner.suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.spinner.suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Drop for ScanProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}
