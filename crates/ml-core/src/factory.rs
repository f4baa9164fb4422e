//! Managed logger factories.
//!
//! A [`ManagedLoggerFactory`] owns the settings every facade shares and
//! lazily builds the base [`Pipeline`] they all derive from. While the base
//! pipeline is built, the [`PipelineBuilder`] may also register
//! factory-wide masking processors, unmasking handlers, object processors
//! and an exception handler through [`FactorySetup`].
//!
//! Every concrete pipeline derived from the factory is recorded in a
//! registry of weak references so `reset()` and `close()` can reach all of
//! them; pipelines that were dropped are skipped and pruned.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use ml_common::{Level, LogError, Result, SharedHandler, SharedProcessor};

use crate::config::FactoryConfig;
use crate::exception::SharedExceptionHandler;
use crate::handler::NullHandler;
use crate::http::ObjectProcessor;
use crate::logger::MaskingLogger;
use crate::pipeline::Pipeline;

/// Creates the base pipeline of a factory. Called at most once per factory
/// unless it fails.
pub trait PipelineBuilder: Send + Sync {
    fn build(&self, setup: &mut FactorySetup) -> Result<Pipeline>;
}

impl<F> PipelineBuilder for F
where
    F: Fn(&mut FactorySetup) -> Result<Pipeline> + Send + Sync,
{
    fn build(&self, setup: &mut FactorySetup) -> Result<Pipeline> {
        self(setup)
    }
}

/// Factory-wide resources registered while the base pipeline is built.
/// Each push puts the new entry first.
pub struct FactorySetup {
    config: FactoryConfig,
    masking_processors: Vec<SharedProcessor>,
    unmasking_handlers: Vec<SharedHandler>,
    object_processors: Vec<Arc<dyn ObjectProcessor>>,
    exception_handler: Option<SharedExceptionHandler>,
}

impl FactorySetup {
    fn new(config: FactoryConfig) -> Self {
        FactorySetup {
            config,
            masking_processors: Vec::new(),
            unmasking_handlers: Vec::new(),
            object_processors: Vec::new(),
            exception_handler: None,
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Mask every record of every logger from this factory. Ignored when
    /// masking is disabled.
    pub fn push_masking_processor(&mut self, processor: SharedProcessor) -> Result<()> {
        if !processor.is_masking() {
            return Err(LogError::invalid_argument(format!(
                "the processor `{}` must be a masking processor",
                processor.name()
            )));
        }
        if self.config.masking_enabled {
            self.masking_processors.insert(0, processor);
        }
        Ok(())
    }

    /// Handler receiving unmasked records from every logger.
    pub fn push_unmasking_handler(&mut self, handler: SharedHandler) {
        self.unmasking_handlers.insert(0, handler);
    }

    /// Processor normalizing specific objects before generic conversion.
    pub fn push_object_processor(&mut self, processor: Arc<dyn ObjectProcessor>) {
        self.object_processors.insert(0, processor);
    }

    /// Default handler for failures inside the logger itself.
    pub fn set_exception_handler(&mut self, handler: SharedExceptionHandler) {
        self.exception_handler = Some(handler);
    }
}

/// What a factory knows once its base pipeline exists.
pub(crate) struct FactoryState {
    pub(crate) base: Arc<Pipeline>,
    pub(crate) masking_processors: Vec<SharedProcessor>,
    pub(crate) unmasking_handlers: Vec<SharedHandler>,
    pub(crate) object_processors: Vec<Arc<dyn ObjectProcessor>>,
    pub(crate) exception_handler: Option<SharedExceptionHandler>,
}

pub struct ManagedLoggerFactory {
    config: FactoryConfig,
    builder: Box<dyn PipelineBuilder>,
    state: Mutex<Option<Arc<FactoryState>>>,
    registry: Mutex<Vec<Weak<Pipeline>>>,
}

impl ManagedLoggerFactory {
    pub fn new(config: FactoryConfig, builder: impl PipelineBuilder + 'static) -> Arc<Self> {
        Arc::new(ManagedLoggerFactory {
            config,
            builder: Box::new(builder),
            state: Mutex::new(None),
            registry: Mutex::new(Vec::new()),
        })
    }

    /// Factory whose loggers discard every record.
    pub fn null(config: FactoryConfig) -> Arc<Self> {
        ManagedLoggerFactory::new(config, |_: &mut FactorySetup| -> Result<Pipeline> {
            Ok(Pipeline::new("null").with_handler(Arc::new(NullHandler)))
        })
    }

    /// A facade bound to this factory.
    pub fn logger(self: &Arc<Self>) -> MaskingLogger {
        MaskingLogger::new(Arc::clone(self))
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn max_level(&self) -> Level {
        self.config.max_level
    }

    pub fn masking_enabled(&self) -> bool {
        self.config.masking_enabled
    }

    pub fn should_remove_duplicates(&self) -> bool {
        self.config.deduplicate
    }

    pub fn mask_objects(&self) -> bool {
        self.config.mask_objects
    }

    pub fn is_built(&self) -> bool {
        self.lock_state().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Factory-wide masking processors, building the base pipeline if needed.
    pub fn masking_processors(&self) -> Result<Vec<SharedProcessor>> {
        Ok(self.state()?.masking_processors.clone())
    }

    pub fn unmasking_handlers(&self) -> Result<Vec<SharedHandler>> {
        Ok(self.state()?.unmasking_handlers.clone())
    }

    pub fn exception_handler(&self) -> Result<Option<SharedExceptionHandler>> {
        Ok(self.state()?.exception_handler.clone())
    }

    pub(crate) fn state(&self) -> Result<Arc<FactoryState>> {
        let mut state = self.lock_state()?;
        if let Some(built) = state.as_ref() {
            return Ok(Arc::clone(built));
        }
        let mut setup = FactorySetup::new(self.config.clone());
        let base = Arc::new(self.builder.build(&mut setup)?);
        tracing::debug!(
            channel = base.name(),
            masking_processors = setup.masking_processors.len(),
            unmasking_handlers = setup.unmasking_handlers.len(),
            "base pipeline built"
        );
        self.register(&base);
        let built = Arc::new(FactoryState {
            base,
            masking_processors: setup.masking_processors,
            unmasking_handlers: setup.unmasking_handlers,
            object_processors: setup.object_processors,
            exception_handler: setup.exception_handler,
        });
        *state = Some(Arc::clone(&built));
        Ok(built)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, Option<Arc<FactoryState>>>> {
        self.state
            .lock()
            .map_err(|_| LogError::runtime("logger factory state lock poisoned"))
    }

    /// Track a pipeline for `reset()` and `close()`. Entries for dropped
    /// pipelines are pruned on every registration.
    pub fn register(&self, pipeline: &Arc<Pipeline>) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.retain(|weak| weak.strong_count() > 0);
            registry.push(Arc::downgrade(pipeline));
        }
    }

    /// Pipelines from this factory that are still alive.
    pub fn live_pipelines(&self) -> Vec<Arc<Pipeline>> {
        let Ok(mut registry) = self.registry.lock() else {
            return Vec::new();
        };
        let before = registry.len();
        registry.retain(|weak| weak.strong_count() > 0);
        if registry.len() != before {
            tracing::trace!(pruned = before - registry.len(), "pipeline registry pruned");
        }
        registry.iter().filter_map(Weak::upgrade).collect()
    }

    /// Reset every live pipeline derived from this factory.
    pub fn reset(&self) {
        for pipeline in self.live_pipelines() {
            pipeline.reset();
        }
    }

    /// Close every live pipeline derived from this factory.
    pub fn close(&self) {
        for pipeline in self.live_pipelines() {
            pipeline.close();
        }
    }

    /// Reset the base pipeline only.
    pub fn reset_once(&self) {
        if let Ok(Some(state)) = self.lock_state().map(|s| s.clone()) {
            state.base.reset();
        }
    }

    /// Close the base pipeline only.
    pub fn close_once(&self) {
        if let Ok(Some(state)) = self.lock_state().map(|s| s.clone()) {
            state.base.close();
        }
    }
}

impl std::fmt::Debug for ManagedLoggerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedLoggerFactory")
            .field("config", &self.config)
            .field("built", &self.is_built())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MemoryHandler;
    use ml_common::FnProcessor;
    use ml_redact::{PasswordMaskingProcessor, RuleSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_base_pipeline_built_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let factory = ManagedLoggerFactory::new(FactoryConfig::default(), move |_: &mut FactorySetup| -> Result<Pipeline> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Pipeline::new("app"))
        });
        assert!(!factory.is_built());
        factory.state().unwrap();
        factory.state().unwrap();
        assert!(factory.is_built());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_build_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let factory = ManagedLoggerFactory::new(FactoryConfig::default(), move |_: &mut FactorySetup| -> Result<Pipeline> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(LogError::runtime("not yet"));
            }
            Ok(Pipeline::new("app"))
        });
        assert!(factory.state().is_err());
        assert!(factory.state().is_ok());
    }

    #[test]
    fn test_masking_processors_ignored_when_disabled() {
        let build = |setup: &mut FactorySetup| -> Result<Pipeline> {
            setup.push_masking_processor(Arc::new(PasswordMaskingProcessor::new(RuleSet::keys(["p"]))))?;
            Ok(Pipeline::new("app"))
        };
        let enabled = ManagedLoggerFactory::new(FactoryConfig::default(), build);
        let disabled = ManagedLoggerFactory::new(FactoryConfig::new(Level::Debug, false), build);
        assert_eq!(enabled.masking_processors().unwrap().len(), 1);
        assert!(disabled.masking_processors().unwrap().is_empty());
    }

    #[test]
    fn test_push_masking_processor_rejects_generic() {
        let factory = ManagedLoggerFactory::new(FactoryConfig::default(), |setup: &mut FactorySetup| -> Result<Pipeline> {
            setup.push_masking_processor(FnProcessor::new("generic", Ok).shared())?;
            Ok(Pipeline::new("app"))
        });
        assert!(matches!(factory.state(), Err(LogError::InvalidArgument(_))));
    }

    #[test]
    fn test_registry_skips_dropped_pipelines() {
        let handler = Arc::new(MemoryHandler::new());
        let shared = Arc::clone(&handler);
        let factory = ManagedLoggerFactory::new(FactoryConfig::default(), move |_: &mut FactorySetup| -> Result<Pipeline> {
            Ok(Pipeline::new("app").with_handler(shared.clone()))
        });
        factory.state().unwrap();
        let derived = Arc::new(Pipeline::new("derived").with_handler(handler.clone()));
        factory.register(&derived);
        {
            let dropped = Arc::new(Pipeline::new("dropped").with_handler(handler.clone()));
            factory.register(&dropped);
        }
        assert_eq!(factory.live_pipelines().len(), 2);
        factory.reset();
        assert_eq!(handler.reset_count(), 2);
        factory.close_once();
        assert_eq!(handler.close_count(), 1);
    }

    #[test]
    fn test_registry_stays_bounded_for_short_lived_loggers() {
        let handler = Arc::new(MemoryHandler::new());
        let shared = Arc::clone(&handler);
        let factory = ManagedLoggerFactory::new(FactoryConfig::default(), move |_: &mut FactorySetup| -> Result<Pipeline> {
            Ok(Pipeline::new("app").with_handler(shared.clone()))
        });
        let logger = factory.logger();
        logger.info("warm", ml_common::Map::new()).unwrap();

        for i in 0..1000 {
            let tag = format!("request-{}", i);
            logger
                .with_processor(FnProcessor::new(tag, Ok).shared())
                .info("per request", ml_common::Map::new())
                .unwrap();
        }

        let registered = factory.registry.lock().unwrap().len();
        assert!(registered <= 3, "registry grew to {}", registered);
        assert_eq!(factory.live_pipelines().len(), 2);
        assert_eq!(handler.len(), 1001);
    }

    #[test]
    fn test_null_factory_discards() {
        let factory = ManagedLoggerFactory::null(FactoryConfig::default());
        let state = factory.state().unwrap();
        assert!(state.base.is_handling(Level::Emergency));
        assert!(state.base.log(Level::Info, "gone", ml_common::Map::new()).unwrap());
    }
}
