//! Errors whose messages are masked like log records.
//!
//! A [`MaskedError`] is built from a message template with `{key}`
//! placeholders and a context. Once the masking processors of a logger are
//! attached, [`MaskedError::finalize`] runs them over the context and renders
//! the message, so the error can be shown or propagated without exposing the
//! values it was built from. The raw template and context stay available
//! for [`MaskedError::send_to_log`].

use std::error::Error;

use ml_common::{Level, LogError, LogRecord, Map, Result, SharedProcessor};
use ml_redact::render;

use crate::logger::{IntoLevel, MaskingLogger};

pub type BoxedError = Box<dyn Error + Send + Sync>;

pub struct MaskedError {
    message: String,
    raw_message: String,
    context: Map,
    processors: Vec<SharedProcessor>,
    finalized: bool,
    source: Option<BoxedError>,
}

impl MaskedError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        MaskedError {
            raw_message: message.clone(),
            message,
            context: Map::new(),
            processors: Vec::new(),
            finalized: false,
            source: None,
        }
    }

    /// Error that is already final and carries no context.
    pub(crate) fn sealed(message: impl Into<String>) -> Self {
        MaskedError {
            finalized: true,
            ..MaskedError::new(message)
        }
    }

    pub fn with_context(mut self, context: Map) -> Result<Self> {
        self.set_context(context)?;
        Ok(self)
    }

    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn set_context(&mut self, context: Map) -> Result<()> {
        if self.finalized {
            return Err(LogError::logic("Unable to add context after finalization"));
        }
        self.context = context;
        Ok(())
    }

    /// Attach a processor; the most recently pushed one runs first.
    pub fn push_masking_processor(&mut self, processor: SharedProcessor) -> Result<()> {
        if self.finalized {
            return Err(LogError::logic("Unable to add processors after finalization"));
        }
        self.processors.insert(0, processor);
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The rendered message after finalization, the template before.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn raw_message(&self) -> &str {
        &self.raw_message
    }

    /// The unmasked context.
    pub fn context(&self) -> &Map {
        &self.context
    }

    pub fn processors(&self) -> &[SharedProcessor] {
        &self.processors
    }

    /// Mask the context and render the message. Runs once; later calls are
    /// no-ops. A masked source error is finalized first.
    pub fn finalize(&mut self, masking_enabled: bool) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        if let Some(source) = self.source.as_mut() {
            if let Some(masked) = source.downcast_mut::<MaskedError>() {
                masked.finalize(masking_enabled)?;
            }
        }

        let mut record = LogRecord::new(
            "exception",
            Level::Error,
            self.raw_message.clone(),
            self.context.clone(),
        );
        if masking_enabled {
            for processor in &self.processors {
                record = processor.process(record)?;
            }
        }
        let mut message = record.message;
        for (key, value) in record.context.iter() {
            message = message.replace(&format!("{{{}}}", key), &render(value));
        }
        self.message = message;
        Ok(())
    }

    /// Log the raw template and context through `logger`, with this error's
    /// processors attached.
    pub fn send_to_log(&self, logger: &MaskingLogger, level: impl IntoLevel) -> Result<()> {
        let logger = if self.processors.is_empty() {
            logger.clone()
        } else {
            logger.with_masking_processors(self.processors.iter().cloned().map(Into::into))
        };
        logger.log(level, self.raw_message.clone(), self.context.clone())
    }
}

impl std::fmt::Display for MaskedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::fmt::Debug for MaskedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskedError")
            .field("message", &self.message)
            .field("finalized", &self.finalized)
            .field("processors", &self.processors.len())
            .finish()
    }
}

impl Error for MaskedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_common::map;
    use ml_redact::{PasswordMaskingProcessor, RuleSet};
    use std::sync::Arc;

    fn password_processor() -> SharedProcessor {
        Arc::new(PasswordMaskingProcessor::new(RuleSet::keys(["password"])))
    }

    #[test]
    fn test_finalize_masks_placeholders() {
        let mut err = MaskedError::new("login failed for {user} with {password}")
            .with_context(map! { "user" => "bob", "password" => "hunter2hunter2" })
            .unwrap();
        err.push_masking_processor(password_processor()).unwrap();
        err.finalize(true).unwrap();
        assert_eq!(err.to_string(), "login failed for bob with *REDACTED.PASSWORD*");
        assert_eq!(err.raw_message(), "login failed for {user} with {password}");
        assert_eq!(
            err.context().get_str("password"),
            Some(&ml_common::Value::from("hunter2hunter2"))
        );
    }

    #[test]
    fn test_finalize_without_masking_renders_raw_values() {
        let mut err = MaskedError::new("token {password}")
            .with_context(map! { "password" => "abc" })
            .unwrap();
        err.push_masking_processor(password_processor()).unwrap();
        err.finalize(false).unwrap();
        assert_eq!(err.message(), "token abc");
    }

    #[test]
    fn test_mutation_after_finalize_is_logic_error() {
        let mut err = MaskedError::new("m");
        err.finalize(true).unwrap();
        err.finalize(true).unwrap();
        assert!(matches!(
            err.set_context(Map::new()),
            Err(LogError::Logic(ref m)) if m == "Unable to add context after finalization"
        ));
        assert!(matches!(
            err.push_masking_processor(password_processor()),
            Err(LogError::Logic(ref m)) if m == "Unable to add processors after finalization"
        ));
    }

    #[test]
    fn test_finalize_cascades_to_source() {
        let mut inner = MaskedError::new("inner {password}")
            .with_context(map! { "password" => "12345678" })
            .unwrap();
        inner.push_masking_processor(password_processor()).unwrap();
        let mut outer = MaskedError::new("outer").with_source(inner);
        outer.finalize(true).unwrap();

        let source = outer.source().unwrap();
        assert_eq!(source.to_string(), "inner *REDACTED.PASSWORD*");
        assert!(source.downcast_ref::<MaskedError>().unwrap().is_finalized());
    }
}
