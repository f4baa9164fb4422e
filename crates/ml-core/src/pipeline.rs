//! Concrete logging pipelines.
//!
//! A [`Pipeline`] is the underlying logger a facade delegates to: a channel
//! name, an ordered processor list and an ordered handler list. Pushing a
//! processor or handler puts it at the front, so the most recently pushed
//! one runs first.

use ml_common::{Level, LogRecord, Map, Result, SharedHandler, SharedProcessor};

#[derive(Clone)]
pub struct Pipeline {
    name: String,
    processors: Vec<SharedProcessor>,
    handlers: Vec<SharedHandler>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Pipeline {
            name: name.into(),
            processors: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of this pipeline writing to another channel.
    pub fn with_name(&self, name: impl Into<String>) -> Pipeline {
        Pipeline {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy of this pipeline with the same processors and no handlers.
    pub fn without_handlers(&self) -> Pipeline {
        Pipeline {
            handlers: Vec::new(),
            ..self.clone()
        }
    }

    pub fn push_processor(&mut self, processor: SharedProcessor) -> &mut Self {
        self.processors.insert(0, processor);
        self
    }

    pub fn push_handler(&mut self, handler: SharedHandler) -> &mut Self {
        self.handlers.insert(0, handler);
        self
    }

    /// Builder form of [`Pipeline::push_processor`].
    pub fn with_processor(mut self, processor: SharedProcessor) -> Self {
        self.push_processor(processor);
        self
    }

    /// Builder form of [`Pipeline::push_handler`].
    pub fn with_handler(mut self, handler: SharedHandler) -> Self {
        self.push_handler(handler);
        self
    }

    /// Processors in execution order.
    pub fn processors(&self) -> &[SharedProcessor] {
        &self.processors
    }

    /// Handlers in execution order.
    pub fn handlers(&self) -> &[SharedHandler] {
        &self.handlers
    }

    pub fn is_handling(&self, level: Level) -> bool {
        self.handlers.iter().any(|h| h.is_handling(level))
    }

    pub fn log(&self, level: Level, message: impl Into<String>, context: Map) -> Result<bool> {
        self.add_record(LogRecord::new(self.name.clone(), level, message, context))
    }

    /// Run the record through every processor, then hand it to every
    /// interested handler. Returns false when no handler wanted the level,
    /// in which case the processors are skipped.
    pub fn add_record(&self, record: LogRecord) -> Result<bool> {
        if !self.is_handling(record.level) {
            return Ok(false);
        }
        let mut record = record;
        for processor in &self.processors {
            record = processor.process(record)?;
        }
        for handler in &self.handlers {
            if handler.is_handling(record.level) {
                handler.handle(&record)?;
            }
        }
        Ok(true)
    }

    /// Clear buffered state in handlers and processors.
    pub fn reset(&self) {
        for handler in &self.handlers {
            handler.reset();
        }
        for processor in &self.processors {
            processor.reset();
        }
    }

    pub fn close(&self) {
        for handler in &self.handlers {
            handler.close();
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field(
                "processors",
                &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
