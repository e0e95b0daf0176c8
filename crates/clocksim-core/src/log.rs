//! Injected logging side-channel.
//!
//! The simulation writes free-form progress and debug lines to a [`LogSink`]
//! without knowing where they end up. [`TracingSink`] forwards to `tracing`;
//! [`MemorySink`] keeps lines for inspection; [`NullSink`] drops them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
        };
        f.write_str(name)
    }
}

/// Receiver for simulation log lines. Messages are forwarded, never parsed.
pub trait LogSink: fmt::Debug {
    fn log(&mut self, level: LogLevel, message: &str);
}

/// Forwards every line to the `tracing` macros under the `clocksim` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "clocksim", "{message}"),
            LogLevel::Debug => tracing::debug!(target: "clocksim", "{message}"),
            LogLevel::Info => tracing::info!(target: "clocksim", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "clocksim", "{message}"),
        }
    }
}

/// Keeps every line in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Vec<(LogLevel, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[(LogLevel, String)] {
        &self.lines
    }

    /// Lines at or above `level`.
    pub fn at_least(&self, level: LogLevel) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(move |(l, _)| *l >= level)
            .map(|(_, m)| m.as_str())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl LogSink for MemorySink {
    fn log(&mut self, level: LogLevel, message: &str) {
        self.lines.push((level, message.to_string()));
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&mut self, _level: LogLevel, _message: &str) {}
}

/// A sink shared with the caller, so lines can be read back while the
/// simulation still owns its handle.
impl<S: LogSink> LogSink for Rc<RefCell<S>> {
    fn log(&mut self, level: LogLevel, message: &str) {
        self.borrow_mut().log(level, message);
    }
}
