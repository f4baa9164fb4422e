//! The dual masked/unmasked logger facade.
//!
//! A [`MaskingLogger`] is an immutable value: every `with_*` method returns a
//! new logger. Each logger lazily builds up to two concrete [`Pipeline`]s
//! from its factory's base pipeline:
//!
//! - the masking pipeline, carrying the factory masking processors, the
//!   logger's own processors with masking entries merged into the slots
//!   they were registered at, the logger's handlers and the object
//!   converter;
//! - the unmasking pipeline, built only when unmasking handlers exist,
//!   which receives the original record with the generic processors only.
//!
//! Both are submitted to from the same `log()` call.

use std::sync::{Arc, Mutex};

use ml_common::{Level, LogError, Map, Result, SharedHandler, SharedProcessor};
use ml_redact::{MaskingKind, ObjectConverterProcessor, RuleSet};

use crate::chain::{self, MaskingEntry};
use crate::exception::{RawLog, SharedExceptionHandler};
use crate::factory::{FactoryState, ManagedLoggerFactory};
use crate::http::ObjectProcessor;
use crate::masked_error::MaskedError;
use crate::pipeline::Pipeline;
use crate::source::{ExtraModifierProcessor, SourceLocation};

/// Anything `log()` accepts as a level: a [`Level`], its name, or its
/// numeric code.
pub trait IntoLevel {
    fn into_level(self) -> Result<Level>;
}

fn unknown_level(level: impl std::fmt::Display) -> LogError {
    LogError::invalid_argument(format!("The specified logging level was not found: {}", level))
}

impl IntoLevel for Level {
    fn into_level(self) -> Result<Level> {
        Ok(self)
    }
}

impl IntoLevel for &str {
    fn into_level(self) -> Result<Level> {
        Level::parse_str(self).ok_or_else(|| unknown_level(self))
    }
}

impl IntoLevel for String {
    fn into_level(self) -> Result<Level> {
        self.as_str().into_level()
    }
}

impl IntoLevel for u16 {
    fn into_level(self) -> Result<Level> {
        Level::from_code(self).ok_or_else(|| unknown_level(self))
    }
}

/// Lazily built pipeline shared by clones until one of them changes it.
#[derive(Default)]
struct PipelineCell(Mutex<Option<Arc<Pipeline>>>);

impl PipelineCell {
    fn get(&self) -> Option<Arc<Pipeline>> {
        self.0.lock().ok().and_then(|cell| cell.clone())
    }

    fn set(&self, pipeline: Option<Arc<Pipeline>>) {
        if let Ok(mut cell) = self.0.lock() {
            *cell = pipeline;
        }
    }

    fn get_or_try_init(&self, build: impl FnOnce() -> Result<Arc<Pipeline>>) -> Result<Arc<Pipeline>> {
        let mut cell = self
            .0
            .lock()
            .map_err(|_| LogError::runtime("pipeline cache lock poisoned"))?;
        if let Some(pipeline) = cell.as_ref() {
            return Ok(Arc::clone(pipeline));
        }
        let pipeline = build()?;
        *cell = Some(Arc::clone(&pipeline));
        Ok(pipeline)
    }
}

impl Clone for PipelineCell {
    fn clone(&self) -> Self {
        PipelineCell(Mutex::new(self.get()))
    }
}

#[derive(Clone)]
pub struct MaskingLogger {
    factory: Arc<ManagedLoggerFactory>,
    name: Option<String>,
    max_level: Level,
    masking_enabled: bool,
    deduplicate: bool,
    /// Generic processors, newest first. `None` marks a masking slot.
    processors: Vec<Option<SharedProcessor>>,
    /// Masking entries, newest first.
    masking_entries: Vec<MaskingEntry>,
    handlers: Vec<SharedHandler>,
    unmasking_handlers: Vec<SharedHandler>,
    exception_handler: Option<SharedExceptionHandler>,
    masking: PipelineCell,
    unmasking: PipelineCell,
}

impl MaskingLogger {
    pub fn new(factory: Arc<ManagedLoggerFactory>) -> Self {
        let config = factory.config().clone();
        MaskingLogger {
            factory,
            name: None,
            max_level: config.max_level,
            masking_enabled: config.masking_enabled,
            deduplicate: config.deduplicate,
            processors: Vec::new(),
            masking_entries: Vec::new(),
            handlers: Vec::new(),
            unmasking_handlers: Vec::new(),
            exception_handler: None,
            masking: PipelineCell::default(),
            unmasking: PipelineCell::default(),
        }
    }

    pub fn factory(&self) -> &Arc<ManagedLoggerFactory> {
        &self.factory
    }

    pub fn max_level(&self) -> Level {
        self.max_level
    }

    pub fn masking_enabled(&self) -> bool {
        self.masking_enabled
    }

    // ========================================================================
    // Builders
    // ========================================================================

    pub fn with_masking_processor(&self, entry: impl Into<MaskingEntry>) -> Self {
        self.with_masking_processors([entry.into()])
    }

    /// Register a masking processor built from `rules`.
    pub fn with_masking_rules(&self, kind: MaskingKind, rules: RuleSet) -> Self {
        self.with_masking_processors([MaskingEntry::rules(kind, rules)])
    }

    /// Register masking entries. Ignored when masking is disabled. With
    /// deduplication on, rules for a kind already registered are merged
    /// into the existing entry instead of adding a processor.
    pub fn with_masking_processors(&self, entries: impl IntoIterator<Item = MaskingEntry>) -> Self {
        let mut new = self.clone();
        if !self.masking_enabled {
            return new;
        }
        for entry in entries {
            if let MaskingEntry::Rules { kind, rules } = &entry {
                if self.deduplicate {
                    if let Some(merged) = chain::remove_duplicates(&new.masking_entries, *kind, rules) {
                        new.masking_entries = merged;
                        continue;
                    }
                }
            }
            new.masking_entries.insert(0, entry);
            new.processors.insert(0, None);
        }
        new.masking.set(None);
        new
    }

    /// Register masking entries declared in JSON, such as
    /// `{"password": ["password", "pass"]}`.
    pub fn with_masking_declarations(&self, declarations: &serde_json::Value) -> Result<Self> {
        let entries = MaskingEntry::from_json(declarations)?;
        Ok(self.with_masking_processors(entries))
    }

    /// Add a generic processor. It runs before the processors added earlier.
    pub fn with_processor(&self, processor: SharedProcessor) -> Self {
        let mut new = self.clone();
        new.processors.insert(0, Some(Arc::clone(&processor)));
        new.extend_cached(&new.unmasking, |p| {
            p.push_processor(Arc::clone(&processor));
        });
        new.extend_cached(&new.masking, |p| {
            p.push_processor(Arc::clone(&processor));
        });
        new
    }

    /// Add a handler receiving masked records.
    pub fn with_handler(&self, handler: SharedHandler) -> Self {
        let mut new = self.clone();
        new.handlers.insert(0, Arc::clone(&handler));
        new.extend_cached(&new.masking, |p| {
            p.push_handler(handler);
        });
        new
    }

    /// Add a handler receiving the original, unmasked records.
    pub fn with_unmasking_handler(&self, handler: SharedHandler) -> Self {
        let mut new = self.clone();
        new.unmasking_handlers.insert(0, Arc::clone(&handler));
        new.extend_cached(&new.unmasking, |p| {
            p.push_handler(handler);
        });
        new
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        let mut new = self.clone();
        for cell in [&new.masking, &new.unmasking] {
            if let Some(pipeline) = cell.get() {
                let renamed = Arc::new(pipeline.with_name(name.clone()));
                self.factory.register(&renamed);
                cell.set(Some(renamed));
            }
        }
        new.name = Some(name);
        new
    }

    /// Override the factory's exception handler. `None` falls back to it.
    pub fn with_exception_handler(&self, handler: Option<SharedExceptionHandler>) -> Self {
        let mut new = self.clone();
        new.exception_handler = handler;
        new
    }

    /// Tag records with the caller's file and line.
    #[track_caller]
    pub fn with_source(&self) -> Self {
        let location = SourceLocation::caller();
        self.with_source_at(location.file, location.line)
    }

    /// Tag records with `file:line`, replacing any earlier source tag.
    pub fn with_source_at(&self, file: impl Into<String>, line: u32) -> Self {
        let location = SourceLocation::new(file, line);
        self.remove_processors(ExtraModifierProcessor::NAME)
            .with_processor(Arc::new(ExtraModifierProcessor::source(&location)))
    }

    /// Remove generic processors named `name`. Masking processors cannot be
    /// removed this way.
    pub fn without_processor(&self, name: &str) -> Result<Self> {
        let is_masking = MaskingKind::ALL.iter().any(|kind| kind.processor_name() == name)
            || self.masking_entries.iter().any(|entry| {
                matches!(entry, MaskingEntry::Processor(p) if p.is_masking() && p.name() == name)
            });
        if is_masking {
            return Err(LogError::logic("Not supported for masking processors"));
        }
        Ok(self.remove_processors(name))
    }

    fn remove_processors(&self, name: &str) -> Self {
        let mut new = self.clone();
        new.masking.set(None);
        new.unmasking.set(None);
        new.processors
            .retain(|slot| !matches!(slot, Some(p) if p.name() == name));
        new
    }

    /// Clone a cached pipeline, change the clone and keep it in `cell`.
    fn extend_cached(&self, cell: &PipelineCell, change: impl FnOnce(&mut Pipeline)) {
        if let Some(pipeline) = cell.get() {
            let mut extended = pipeline.as_ref().clone();
            change(&mut extended);
            let extended = Arc::new(extended);
            self.factory.register(&extended);
            cell.set(Some(extended));
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn exception_handler(&self) -> Option<SharedExceptionHandler> {
        self.exception_handler
            .clone()
            .or_else(|| self.factory.exception_handler().ok().flatten())
    }

    pub fn has_exception_handler(&self) -> bool {
        self.exception_handler().is_some()
    }

    /// The processors masking data for this logger, object converter first.
    pub fn masking_processors(&self) -> Result<Vec<SharedProcessor>> {
        let converter = |masked: bool| -> SharedProcessor { Arc::new(converter_processor(masked)) };
        if !self.masking_enabled {
            return Ok(if self.factory.mask_objects() {
                vec![converter(false)]
            } else {
                Vec::new()
            });
        }
        self.masking_pipeline()?;
        let mut processors = Vec::new();
        if self.factory.mask_objects() {
            processors.push(converter(true));
        }
        processors.extend(chain::convert(&self.masking_entries));
        processors.extend(self.factory.masking_processors()?);
        Ok(processors)
    }

    /// Whether a record at `level` would reach any handler.
    pub fn is_handling(&self, level: impl IntoLevel) -> Result<bool> {
        let level = level.into_level()?;
        if !level.is_within(self.max_level) {
            return Ok(false);
        }
        if self.handlers.iter().any(|h| h.is_handling(level)) {
            return Ok(true);
        }
        if self.all_unmasking_handlers()?.iter().any(|h| h.is_handling(level)) {
            return Ok(true);
        }
        if self.masking_pipeline()?.is_handling(level) {
            return Ok(true);
        }
        Ok(self
            .unmasking_pipeline()?
            .is_some_and(|pipeline| pipeline.is_handling(level)))
    }

    /// A copy of the masking pipeline, tracked by the factory.
    pub fn masking_logger(&self) -> Result<Arc<Pipeline>> {
        let pipeline = Arc::new(self.masking_pipeline()?.as_ref().clone());
        self.factory.register(&pipeline);
        Ok(pipeline)
    }

    pub fn has_unmasking_logger(&self) -> Result<bool> {
        Ok(self.unmasking.get().is_some() || !self.all_unmasking_handlers()?.is_empty())
    }

    /// A copy of the unmasking pipeline, if this logger has one.
    pub fn unmasking_logger(&self) -> Result<Option<Arc<Pipeline>>> {
        let Some(pipeline) = self.unmasking_pipeline()? else {
            return Ok(None);
        };
        let pipeline = Arc::new(pipeline.as_ref().clone());
        self.factory.register(&pipeline);
        Ok(Some(pipeline))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Reset every pipeline derived from the factory.
    pub fn reset(&self) {
        self.factory.reset();
    }

    /// Reset this logger's own pipelines.
    pub fn reset_current(&self) {
        for pipeline in [self.masking.get(), self.unmasking.get()].into_iter().flatten() {
            pipeline.reset();
        }
    }

    /// Close every pipeline derived from the factory.
    pub fn close(&self) {
        self.factory.close();
    }

    /// Close this logger's own pipelines.
    pub fn close_current(&self) {
        for pipeline in [self.masking.get(), self.unmasking.get()].into_iter().flatten() {
            pipeline.close();
        }
    }

    // ========================================================================
    // Masked errors
    // ========================================================================

    /// Attach this logger's masking processors to `error` and finalize it.
    pub fn create_masked_error(&self, mut error: MaskedError) -> Result<MaskedError> {
        for processor in self.masking_processors()?.into_iter().rev() {
            error.push_masking_processor(processor)?;
        }
        error.finalize(self.masking_enabled)?;
        Ok(error)
    }

    /// `Err` with the finalized `error`. If finalizing fails, the returned
    /// error describes that failure instead.
    pub fn masked_error<T>(&self, error: MaskedError) -> std::result::Result<T, MaskedError> {
        match self.create_masked_error(error) {
            Ok(error) => Err(error),
            Err(failure) => Err(MaskedError::sealed(failure.to_string())),
        }
    }

    // ========================================================================
    // Logging
    // ========================================================================

    /// Log `message` at `level`. Records below the configured level are
    /// dropped. Failures go to the exception handler when one is set and
    /// are returned otherwise.
    pub fn log(&self, level: impl IntoLevel, message: impl Into<String>, context: Map) -> Result<()> {
        let level = level.into_level()?;
        if !level.is_within(self.max_level) {
            return Ok(());
        }
        let message = message.into();
        match self.send(level, &message, &context) {
            Ok(()) => Ok(()),
            Err(error) => self.handle_logger_error(
                error,
                RawLog {
                    level,
                    message,
                    context,
                },
            ),
        }
    }

    pub fn emergency(&self, message: impl Into<String>, context: Map) -> Result<()> {
        self.log(Level::Emergency, message, context)
    }

    pub fn alert(&self, message: impl Into<String>, context: Map) -> Result<()> {
        self.log(Level::Alert, message, context)
    }

    pub fn critical(&self, message: impl Into<String>, context: Map) -> Result<()> {
        self.log(Level::Critical, message, context)
    }

    pub fn error(&self, message: impl Into<String>, context: Map) -> Result<()> {
        self.log(Level::Error, message, context)
    }

    pub fn warning(&self, message: impl Into<String>, context: Map) -> Result<()> {
        self.log(Level::Warning, message, context)
    }

    pub fn notice(&self, message: impl Into<String>, context: Map) -> Result<()> {
        self.log(Level::Notice, message, context)
    }

    pub fn info(&self, message: impl Into<String>, context: Map) -> Result<()> {
        self.log(Level::Info, message, context)
    }

    pub fn debug(&self, message: impl Into<String>, context: Map) -> Result<()> {
        self.log(Level::Debug, message, context)
    }

    /// Submit to the masking pipeline, then always to the unmasking one.
    /// The first failure is returned.
    fn send(&self, level: Level, message: &str, context: &Map) -> Result<()> {
        let masked = self.send_masked(level, message, context);
        let unmasked = self.send_unmasked(level, message, context);
        masked.and(unmasked)
    }

    fn send_masked(&self, level: Level, message: &str, context: &Map) -> Result<()> {
        let pipeline = self.masking_pipeline()?;
        let context = self.update_context(context.clone(), self.masking_enabled)?;
        pipeline.log(level, message, context)?;
        Ok(())
    }

    fn send_unmasked(&self, level: Level, message: &str, context: &Map) -> Result<()> {
        let Some(pipeline) = self.unmasking_pipeline()? else {
            return Ok(());
        };
        let context = self.update_context(context.clone(), false)?;
        pipeline.log(level, message, context)?;
        Ok(())
    }

    /// Normalize objects in `context` the way the pipelines would.
    fn update_context(&self, context: Map, masked: bool) -> Result<Map> {
        if context.is_empty() {
            return Ok(context);
        }
        let state = self.factory.state()?;
        let mut context = context;
        for processor in &state.object_processors {
            context = processor.update(context)?;
        }
        if self.factory.mask_objects() {
            context = converter_processor(masked).convert_context(context);
        }
        Ok(context)
    }

    fn handle_logger_error(&self, error: LogError, raw: RawLog) -> Result<()> {
        match self.exception_handler() {
            Some(handler) => {
                tracing::debug!(
                    kind = error.kind(),
                    level = raw.level.as_str(),
                    "logging failure routed to exception handler"
                );
                handler.handle(&error, &raw);
                Ok(())
            }
            None => Err(error),
        }
    }

    // ========================================================================
    // Pipeline construction
    // ========================================================================

    fn base_pipeline(&self, state: &FactoryState) -> Pipeline {
        match &self.name {
            Some(name) => state.base.with_name(name.clone()),
            None => state.base.as_ref().clone(),
        }
    }

    fn all_unmasking_handlers(&self) -> Result<Vec<SharedHandler>> {
        let mut handlers = self.factory.unmasking_handlers()?;
        handlers.extend(self.unmasking_handlers.iter().cloned());
        Ok(handlers)
    }

    fn masking_pipeline(&self) -> Result<Arc<Pipeline>> {
        self.masking.get_or_try_init(|| self.build_masking())
    }

    fn unmasking_pipeline(&self) -> Result<Option<Arc<Pipeline>>> {
        if let Some(pipeline) = self.unmasking.get() {
            return Ok(Some(pipeline));
        }
        let handlers = self.all_unmasking_handlers()?;
        if handlers.is_empty() {
            return Ok(None);
        }
        self.unmasking
            .get_or_try_init(|| self.build_unmasking(handlers))
            .map(Some)
    }

    fn build_masking(&self) -> Result<Arc<Pipeline>> {
        let state = self.factory.state()?;
        let mut pipeline = self.base_pipeline(&state);

        let mut processors = state.masking_processors.clone();
        processors.extend(chain::merge(&self.processors, &self.masking_entries));
        for processor in processors.into_iter().rev() {
            pipeline.push_processor(processor);
        }
        for handler in self.handlers.iter().rev() {
            pipeline.push_handler(Arc::clone(handler));
        }
        if self.factory.mask_objects() {
            pipeline.push_processor(Arc::new(converter_processor(self.masking_enabled)));
        }
        for processor in &state.object_processors {
            pipeline.push_processor(Arc::clone(processor) as SharedProcessor);
        }

        tracing::debug!(
            channel = pipeline.name(),
            processors = pipeline.processors().len(),
            handlers = pipeline.handlers().len(),
            "masking pipeline built"
        );
        let pipeline = Arc::new(pipeline);
        self.factory.register(&pipeline);
        Ok(pipeline)
    }

    fn build_unmasking(&self, handlers: Vec<SharedHandler>) -> Result<Arc<Pipeline>> {
        let state = self.factory.state()?;
        let mut pipeline = self.base_pipeline(&state).without_handlers();

        for processor in self.processors.iter().flatten().rev() {
            pipeline.push_processor(Arc::clone(processor));
        }
        for handler in handlers.into_iter().rev() {
            pipeline.push_handler(handler);
        }
        if self.factory.mask_objects() {
            pipeline.push_processor(Arc::new(converter_processor(false)));
        }
        for processor in &state.object_processors {
            pipeline.push_processor(Arc::clone(processor) as SharedProcessor);
        }

        tracing::debug!(
            channel = pipeline.name(),
            handlers = pipeline.handlers().len(),
            "unmasking pipeline built"
        );
        let pipeline = Arc::new(pipeline);
        self.factory.register(&pipeline);
        Ok(pipeline)
    }
}

fn converter_processor(masked: bool) -> ObjectConverterProcessor {
    if masked {
        ObjectConverterProcessor::masked()
    } else {
        ObjectConverterProcessor::plain()
    }
}

impl std::fmt::Debug for MaskingLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskingLogger")
            .field("name", &self.name)
            .field("max_level", &self.max_level)
            .field("masking_enabled", &self.masking_enabled)
            .field("processors", &self.processors.len())
            .field("masking_entries", &self.masking_entries)
            .field("handlers", &self.handlers.len())
            .field("unmasking_handlers", &self.unmasking_handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FactoryConfig;
    use crate::factory::FactorySetup;
    use crate::handler::MemoryHandler;
    use ml_common::{map, FnProcessor, LogRecord, Value};

    fn factory(config: FactoryConfig) -> Arc<ManagedLoggerFactory> {
        ManagedLoggerFactory::new(config, |_: &mut FactorySetup| -> Result<Pipeline> {
            Ok(Pipeline::new("app"))
        })
    }

    fn tag(name: &'static str) -> SharedProcessor {
        FnProcessor::new(name, move |record: LogRecord| {
            let message = format!("{}{}", record.message, name);
            Ok(record.with_message(message))
        })
        .shared()
    }

    #[test]
    fn test_level_input_forms() {
        assert_eq!("warning".into_level().unwrap(), Level::Warning);
        assert_eq!(String::from("INFO").into_level().unwrap(), Level::Info);
        assert_eq!(550u16.into_level().unwrap(), Level::Alert);
        let err = "loud".into_level().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument: The specified logging level was not found: loud"
        );
        assert!(7u16.into_level().is_err());
    }

    #[test]
    fn test_log_rejects_unknown_level() {
        let logger = factory(FactoryConfig::default()).logger();
        assert!(matches!(
            logger.log("verbose", "m", Map::new()),
            Err(LogError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_below_max_level_is_dropped() {
        let handler = Arc::new(MemoryHandler::new());
        let logger = factory(FactoryConfig::new(Level::Warning, true))
            .logger()
            .with_handler(handler.clone());
        logger.info("quiet", Map::new()).unwrap();
        logger.error("loud", Map::new()).unwrap();
        assert_eq!(handler.len(), 1);
        assert!(!logger.is_handling(Level::Notice).unwrap());
        assert!(logger.is_handling("critical").unwrap());
    }

    #[test]
    fn test_builders_leave_original_untouched() {
        let handler = Arc::new(MemoryHandler::new());
        let base = factory(FactoryConfig::default()).logger();
        let derived = base.with_handler(handler.clone());
        base.info("base", Map::new()).unwrap();
        derived.info("derived", Map::new()).unwrap();
        assert_eq!(handler.len(), 1);
        assert!(handler.has_message("derived"));
    }

    #[test]
    fn test_masking_slot_keeps_registration_position() {
        let handler = Arc::new(MemoryHandler::new());
        let logger = factory(FactoryConfig::default().with_mask_objects(false))
            .logger()
            .with_handler(handler.clone())
            .with_processor(tag("-a"))
            .with_masking_processor(FnProcessor::masking("m", |record: LogRecord| {
                let message = format!("{}-m", record.message);
                Ok(record.with_message(message))
            })
            .shared())
            .with_processor(tag("-b"));
        logger.info(">", Map::new()).unwrap();
        assert_eq!(handler.records()[0].message, ">-b-m-a");
    }

    #[test]
    fn test_masking_disabled_ignores_rules() {
        let handler = Arc::new(MemoryHandler::new());
        let logger = factory(FactoryConfig::new(Level::Debug, false))
            .logger()
            .with_handler(handler.clone())
            .with_masking_rules(MaskingKind::Password, RuleSet::keys(["password"]));
        logger
            .info("m", map! { "password" => "secret_password" })
            .unwrap();
        assert_eq!(
            handler.records()[0].context.get_str("password"),
            Some(&Value::from("secret_password"))
        );
        assert_eq!(logger.masking_processors().unwrap().len(), 1);
    }

    #[test]
    fn test_deduplicated_rules_build_one_processor() {
        let logger = factory(FactoryConfig::default().with_mask_objects(false))
            .logger()
            .with_masking_rules(MaskingKind::Password, RuleSet::keys(["a", "b"]))
            .with_masking_rules(MaskingKind::Password, RuleSet::keys(["b", "c"]));
        let processors = logger.masking_processors().unwrap();
        assert_eq!(processors.len(), 1);
        assert_eq!(processors[0].name(), "PasswordMaskingProcessor");

        let no_dedup = factory(
            FactoryConfig::default()
                .with_mask_objects(false)
                .with_deduplicate(false),
        )
        .logger()
        .with_masking_rules(MaskingKind::Password, RuleSet::keys(["a"]))
        .with_masking_rules(MaskingKind::Password, RuleSet::keys(["b"]));
        assert_eq!(no_dedup.masking_processors().unwrap().len(), 2);
    }

    #[test]
    fn test_with_processor_extends_built_pipeline() {
        let handler = Arc::new(MemoryHandler::new());
        let logger = factory(FactoryConfig::default())
            .logger()
            .with_handler(handler.clone());
        let built = logger.masking_logger().unwrap();
        let extended = logger.with_processor(tag("!"));
        extended.info("hi", Map::new()).unwrap();
        logger.info("hi", Map::new()).unwrap();
        let messages: Vec<String> = handler.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, ["hi!", "hi"]);
        assert_eq!(built.processors().len() + 1, extended.masking_logger().unwrap().processors().len());
    }

    #[test]
    fn test_without_processor() {
        let handler = Arc::new(MemoryHandler::new());
        let logger = factory(FactoryConfig::default())
            .logger()
            .with_handler(handler.clone())
            .with_processor(tag("-x"));
        let stripped = logger.without_processor("-x").unwrap();
        stripped.info("m", Map::new()).unwrap();
        assert_eq!(handler.records()[0].message, "m");
        assert!(matches!(
            logger.without_processor("PasswordMaskingProcessor"),
            Err(LogError::Logic(_))
        ));
    }

    #[test]
    fn test_with_name_renames_channel() {
        let handler = Arc::new(MemoryHandler::new());
        let logger = factory(FactoryConfig::default())
            .logger()
            .with_handler(handler.clone());
        logger.info("first", Map::new()).unwrap();
        logger.with_name("audit").info("second", Map::new()).unwrap();
        let channels: Vec<String> = handler.records().into_iter().map(|r| r.channel).collect();
        assert_eq!(channels, ["app", "audit"]);
    }
}
