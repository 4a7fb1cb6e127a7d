//! Textual progress sink shared by every operation.

use std::fmt::Display;

/// Prefix of lines reporting a recoverable problem.
pub const WARNING_PREFIX: &str = "WARNING: ";
/// Prefix of lines reporting a failed step.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Receives one human readable line per step.
///
/// Called synchronously on the thread running the operation; front-ends that
/// display the lines elsewhere are responsible for marshaling them.
pub trait LogSink {
    fn log(&mut self, line: &str);
}

impl<F> LogSink for F
where
    F: FnMut(&str),
{
    fn log(&mut self, line: &str) {
        self(line)
    }
}

pub(crate) fn info(sink: &mut dyn LogSink, message: impl Display) {
    sink.log(&message.to_string());
}

pub(crate) fn warning(sink: &mut dyn LogSink, message: impl Display) {
    sink.log(&format!("{WARNING_PREFIX}{message}"));
}

pub(crate) fn error(sink: &mut dyn LogSink, message: impl Display) {
    sink.log(&format!("{ERROR_PREFIX}{message}"));
}

/// Sink collecting lines in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Lines(pub Vec<String>);

#[cfg(test)]
impl LogSink for Lines {
    fn log(&mut self, line: &str) {
        self.0.push(line.to_string());
    }
}

#[cfg(test)]
impl Lines {
    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.0.iter().any(|line| line.contains(needle))
    }

    pub(crate) fn count_prefixed(&self, prefix: &str) -> usize {
        self.0.iter().filter(|line| line.starts_with(prefix)).count()
    }
}
