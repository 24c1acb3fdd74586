use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for diagnostic aspect output
pub trait LogSink: Send + Sync {
    fn write(&self, line: &str);
}

/// Shared sink handle carried in [`crate::AspectConfig`]
pub type SharedSink = Arc<dyn LogSink>;

/// Writes each line to standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write(&self, line: &str) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        if let Err(e) = writeln!(lock, "{line}") {
            log::warn!("Failed to write aspect output: {e}");
        }
    }
}

/// Collects lines in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of captured lines
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Drain captured lines
    pub fn take(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|mut lines| std::mem::take(&mut *lines))
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn write(&self, line: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
    }
}

/// Forwards lines to the `log` facade
#[derive(Debug, Clone, Copy)]
pub struct LogCrateSink {
    level: log::Level,
}

impl LogCrateSink {
    #[must_use]
    pub const fn new(level: log::Level) -> Self {
        Self { level }
    }
}

impl Default for LogCrateSink {
    fn default() -> Self {
        Self::new(log::Level::Info)
    }
}

impl LogSink for LogCrateSink {
    fn write(&self, line: &str) {
        log::log!(target: "aspects", self.level, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_shares_lines_between_clones() {
        let sink = MemorySink::new();
        let writer = sink.clone();
        writer.write("first");
        writer.write("second");
        assert_eq!(sink.lines(), vec!["first", "second"]);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.lines().is_empty());
    }
}
