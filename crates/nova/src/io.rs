//! Replaceable stdio sinks.
//!
//! The interpreter never talks to the process's stdio directly; every
//! `print`/`println` goes through an [`OutputSink`] and every
//! `readLine`/`input` through an [`InputSource`]. Embedders swap these to
//! capture or feed script I/O; child interpreters inherit their parent's
//! sinks.

use std::{
    collections::VecDeque,
    io::{self, BufRead as _, Write as _},
    sync::{Arc, Mutex},
};

/// Shared, thread-safe handle to an output sink.
pub type SharedSink = Arc<Mutex<dyn OutputSink + Send>>;

/// Shared, thread-safe handle to an input source.
pub type SharedInput = Arc<Mutex<dyn InputSource + Send>>;

/// Destination for `print`/`println` output (and error reporting on stderr).
pub trait OutputSink {
    /// Writes a chunk of text without adding separators or newlines.
    fn write_str(&mut self, text: &str);

    /// Writes a single character; used for the trailing newline of `println`.
    fn write_char(&mut self, ch: char) {
        let mut buffer = [0_u8; 4];
        self.write_str(ch.encode_utf8(&mut buffer));
    }
}

/// Source for `readLine`/`input`.
pub trait InputSource {
    /// Reads one line without its trailing newline; `None` on end of input.
    fn read_line(&mut self) -> Option<String>;
}

/// Default sink writing to the process stdout.
#[derive(Debug, Default)]
pub struct StdSink;

impl OutputSink for StdSink {
    fn write_str(&mut self, text: &str) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        let _ = lock.write_all(text.as_bytes());
        let _ = lock.flush();
    }
}

/// Sink writing to the process stderr.
#[derive(Debug, Default)]
pub struct StdErrSink;

impl OutputSink for StdErrSink {
    fn write_str(&mut self, text: &str) {
        let stderr = io::stderr();
        let mut lock = stderr.lock();
        let _ = lock.write_all(text.as_bytes());
        let _ = lock.flush();
    }
}

/// Sink that collects all output into a string; useful in tests and when
/// capturing script output programmatically.
///
/// Clones share the same buffer, so the embedder can keep a handle while the
/// interpreter (and its children) write through another.
#[derive(Debug, Default, Clone)]
pub struct CollectSink(Arc<Mutex<String>>);

impl CollectSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the collected output so far.
    #[must_use]
    pub fn output(&self) -> String {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Clears the buffer, returning what was collected.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner))
    }
}

impl OutputSink for CollectSink {
    fn write_str(&mut self, text: &str) {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_str(text);
    }
}

/// Sink that discards all output.
#[derive(Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_str(&mut self, _text: &str) {}
}

/// Default input source reading from the process stdin.
#[derive(Debug, Default)]
pub struct StdInput;

impl InputSource for StdInput {
    fn read_line(&mut self) -> Option<String> {
        let stdin = io::stdin();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Some(line)
            }
        }
    }
}

/// Input source fed from a fixed queue of lines; `None` once drained.
#[derive(Debug, Default)]
pub struct QueuedInput(VecDeque<String>);

impl QueuedInput {
    #[must_use]
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(lines.into_iter().map(Into::into).collect())
    }
}

impl InputSource for QueuedInput {
    fn read_line(&mut self) -> Option<String> {
        self.0.pop_front()
    }
}

/// Input source that is always at end of input.
#[derive(Debug, Default)]
pub struct EmptyInput;

impl InputSource for EmptyInput {
    fn read_line(&mut self) -> Option<String> {
        None
    }
}

/// Wraps a sink into a shared handle.
pub fn shared_sink(sink: impl OutputSink + Send + 'static) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// Wraps an input source into a shared handle.
pub fn shared_input(input: impl InputSource + Send + 'static) -> SharedInput {
    Arc::new(Mutex::new(input))
}

/// Writes through a shared sink, tolerating a poisoned lock.
pub(crate) fn sink_write(sink: &SharedSink, text: &str) {
    let mut guard = sink.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard.write_str(text);
}

/// Writes a single char through a shared sink.
pub(crate) fn sink_write_char(sink: &SharedSink, ch: char) {
    let mut guard = sink.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard.write_char(ch);
}

/// Reads one line through a shared input source.
pub(crate) fn input_read_line(input: &SharedInput) -> Option<String> {
    let mut guard = input.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard.read_line()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_sink_accumulates_through_clones() {
        let sink = CollectSink::new();
        let mut writer = sink.clone();
        writer.write_str("hello");
        writer.write_char(' ');
        writer.write_str("world");
        assert_eq!(sink.output(), "hello world");
        assert_eq!(sink.take(), "hello world");
        assert_eq!(sink.output(), "");
    }

    #[test]
    fn queued_input_drains_in_order() {
        let mut input = QueuedInput::new(["a", "b"]);
        assert_eq!(input.read_line().as_deref(), Some("a"));
        assert_eq!(input.read_line().as_deref(), Some("b"));
        assert_eq!(input.read_line(), None);
    }
}
