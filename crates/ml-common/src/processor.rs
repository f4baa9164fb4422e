//! Processor and handler capabilities.

use std::sync::Arc;

use crate::error::Result;
use crate::level::Level;
use crate::record::LogRecord;

/// Transforms a record on its way to the handlers.
pub trait Processor: Send + Sync {
    fn process(&self, record: LogRecord) -> Result<LogRecord>;

    /// Name used to identify the processor in a chain.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Masking processors redact data; only these may fill masking slots.
    fn is_masking(&self) -> bool {
        false
    }

    fn reset(&self) {}
}

/// A sink for fully processed records.
pub trait Handler: Send + Sync {
    fn is_handling(&self, level: Level) -> bool;

    fn handle(&self, record: &LogRecord) -> Result<()>;

    fn reset(&self) {}

    fn close(&self) {}
}

pub type SharedProcessor = Arc<dyn Processor>;
pub type SharedHandler = Arc<dyn Handler>;

type ProcessFn = dyn Fn(LogRecord) -> Result<LogRecord> + Send + Sync;

/// A processor backed by a closure.
pub struct FnProcessor {
    name: String,
    masking: bool,
    func: Box<ProcessFn>,
}

impl FnProcessor {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(LogRecord) -> Result<LogRecord> + Send + Sync + 'static,
    {
        FnProcessor {
            name: name.into(),
            masking: false,
            func: Box::new(func),
        }
    }

    /// A closure that redacts data and may be registered as a masking rule.
    pub fn masking<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(LogRecord) -> Result<LogRecord> + Send + Sync + 'static,
    {
        FnProcessor {
            masking: true,
            ..FnProcessor::new(name, func)
        }
    }

    pub fn shared(self) -> SharedProcessor {
        Arc::new(self)
    }
}

impl std::fmt::Debug for FnProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProcessor")
            .field("name", &self.name)
            .field("masking", &self.masking)
            .finish()
    }
}

impl Processor for FnProcessor {
    fn process(&self, record: LogRecord) -> Result<LogRecord> {
        (self.func)(record)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_masking(&self) -> bool {
        self.masking
    }
}
