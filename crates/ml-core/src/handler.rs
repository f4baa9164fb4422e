//! Record sinks.
//!
//! - [`MemoryHandler`]: keeps records in memory, for tests and inspection.
//! - [`JsonLinesHandler`]: one JSON object per line to any writer or file.
//! - [`TracingHandler`]: forwards records as `tracing` events.
//! - [`NullHandler`]: accepts everything and keeps nothing.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ml_common::{Handler, Level, LogError, LogRecord, Result};

/// Stores every handled record.
#[derive(Debug, Default)]
pub struct MemoryHandler {
    level: Level,
    records: Mutex<Vec<LogRecord>>,
    resets: AtomicUsize,
    closes: AtomicUsize,
}

impl MemoryHandler {
    pub fn new() -> Self {
        MemoryHandler::default()
    }

    /// Only accept records at `level` or above.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<LogRecord> {
        self.records.lock().ok().and_then(|r| r.last().cloned())
    }

    pub fn has_message(&self, message: &str) -> bool {
        self.records
            .lock()
            .map(|r| r.iter().any(|record| record.message == message))
            .unwrap_or(false)
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Handler for MemoryHandler {
    fn is_handling(&self, level: Level) -> bool {
        level.is_within(self.level)
    }

    fn handle(&self, record: &LogRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| LogError::runtime("memory handler lock poisoned"))?
            .push(record.clone());
        Ok(())
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Writes each record as a single JSON line.
pub struct JsonLinesHandler {
    level: Level,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesHandler {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        JsonLinesHandler {
            level: Level::Debug,
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Append to the file at `path`, creating it if needed.
    pub fn file(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(JsonLinesHandler::new(file))
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Handler for JsonLinesHandler {
    fn is_handling(&self, level: Level) -> bool {
        level.is_within(self.level)
    }

    fn handle(&self, record: &LogRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&record.to_json())?;
        line.push(b'\n');
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| LogError::runtime("json lines writer lock poisoned"))?;
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }

    fn close(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

impl std::fmt::Debug for JsonLinesHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesHandler")
            .field("level", &self.level)
            .finish()
    }
}

/// Emits records as `tracing` events under the `masklog` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHandler {
    level: Level,
}

impl TracingHandler {
    pub fn new() -> Self {
        TracingHandler::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Handler for TracingHandler {
    fn is_handling(&self, level: Level) -> bool {
        level.is_within(self.level)
    }

    fn handle(&self, record: &LogRecord) -> Result<()> {
        let context = serde_json::to_string(&record.context)?;
        let channel = record.channel.as_str();
        let level_name = record.level.name();
        let message = record.message.as_str();
        match record.level {
            Level::Debug => {
                tracing::debug!(target: "masklog", channel, level_name, context = %context, "{}", message)
            }
            Level::Info | Level::Notice => {
                tracing::info!(target: "masklog", channel, level_name, context = %context, "{}", message)
            }
            Level::Warning => {
                tracing::warn!(target: "masklog", channel, level_name, context = %context, "{}", message)
            }
            Level::Error | Level::Critical | Level::Alert | Level::Emergency => {
                tracing::error!(target: "masklog", channel, level_name, context = %context, "{}", message)
            }
        }
        Ok(())
    }
}

/// Swallows every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

impl Handler for NullHandler {
    fn is_handling(&self, _level: Level) -> bool {
        true
    }

    fn handle(&self, _record: &LogRecord) -> Result<()> {
        Ok(())
    }
}
