//! Handling of failures raised while logging.
//!
//! A processor or handler error inside `log()` is normally returned to the
//! caller. With a [`LoggerExceptionHandler`] configured the error is handed
//! to it instead, together with the raw record that failed, so an
//! application that logs its own errors does not loop.

use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::Local;
use ml_common::{Level, LogError, Map};
use serde::Serialize;

/// The record as the caller submitted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawLog {
    pub level: Level,
    pub message: String,
    pub context: Map,
}

pub trait LoggerExceptionHandler: Send + Sync {
    fn handle(&self, error: &LogError, raw: &RawLog);
}

pub type SharedExceptionHandler = Arc<dyn LoggerExceptionHandler>;

/// Writes one JSON object per failure to stderr, or to an injected writer.
pub struct StderrExceptionHandler {
    writer: Option<Mutex<Box<dyn Write + Send>>>,
}

impl StderrExceptionHandler {
    pub fn new() -> Self {
        StderrExceptionHandler { writer: None }
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        StderrExceptionHandler {
            writer: Some(Mutex::new(Box::new(writer))),
        }
    }

    /// The JSON document written for a failure.
    pub fn render(error: &LogError, raw: &RawLog) -> serde_json::Value {
        serde_json::json!({
            "datetime": Local::now().format("%Y-%m-%dT%H:%M:%S%.6f%:z").to_string(),
            "level": "ERROR",
            "class": error.kind(),
            "code": error.code(),
            "message": error.to_string(),
            "log": {
                "level": raw.level.name(),
                "message": raw.message,
                "context": raw.context,
            },
        })
    }
}

impl Default for StderrExceptionHandler {
    fn default() -> Self {
        StderrExceptionHandler::new()
    }
}

impl LoggerExceptionHandler for StderrExceptionHandler {
    fn handle(&self, error: &LogError, raw: &RawLog) {
        let line = format!("{}\n", StderrExceptionHandler::render(error, raw));
        match &self.writer {
            Some(writer) => {
                if let Ok(mut writer) = writer.lock() {
                    let _ = writer.write_all(line.as_bytes());
                    let _ = writer.flush();
                }
            }
            None => {
                let _ = std::io::stderr().write_all(line.as_bytes());
            }
        }
    }
}

/// Keeps every reported failure; useful in tests.
#[derive(Debug, Default)]
pub struct CollectingExceptionHandler {
    reports: Mutex<Vec<(String, RawLog)>>,
}

impl CollectingExceptionHandler {
    pub fn new() -> Self {
        CollectingExceptionHandler::default()
    }

    /// Error messages and raw records, oldest first.
    pub fn reports(&self) -> Vec<(String, RawLog)> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LoggerExceptionHandler for CollectingExceptionHandler {
    fn handle(&self, error: &LogError, raw: &RawLog) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push((error.to_string(), raw.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_common::map;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn raw() -> RawLog {
        RawLog {
            level: Level::Warning,
            message: "disk {path} full".into(),
            context: map! { "path" => "/var" },
        }
    }

    #[test]
    fn test_stderr_handler_writes_json() {
        let buf = SharedBuf::default();
        let handler = StderrExceptionHandler::with_writer(buf.clone());
        handler.handle(&LogError::runtime("sink down"), &raw());

        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(doc["level"], "ERROR");
        assert_eq!(doc["class"], "Runtime");
        assert_eq!(doc["message"], "runtime error: sink down");
        assert_eq!(doc["log"]["level"], "WARNING");
        assert_eq!(doc["log"]["message"], "disk {path} full");
        assert_eq!(doc["log"]["context"]["path"], "/var");
    }

    #[test]
    fn test_collecting_handler() {
        let handler = CollectingExceptionHandler::new();
        handler.handle(&LogError::logic("bad"), &raw());
        let reports = handler.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].1, raw());
    }
}
