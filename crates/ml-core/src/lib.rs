//! Dual masked/unmasked logging for masklog.
//!
//! A [`ManagedLoggerFactory`] builds one base [`Pipeline`] and shares it with
//! every [`MaskingLogger`] it hands out. Each logger adds its own processors,
//! masking rules and handlers, and sends every record down two paths: a
//! masking pipeline whose handlers only ever see redacted data, and an
//! optional unmasking pipeline for restricted sinks that need the original.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use ml_common::{map, Result, Value};
//! use ml_core::{FactoryConfig, FactorySetup, ManagedLoggerFactory, MemoryHandler, Pipeline};
//! use ml_redact::{MaskingKind, PlaceholderProcessor, RuleSet};
//!
//! let handler = Arc::new(MemoryHandler::new());
//! let sink = Arc::clone(&handler);
//! let factory = ManagedLoggerFactory::new(FactoryConfig::default(), move |_: &mut FactorySetup| -> Result<Pipeline> {
//!     Ok(Pipeline::new("app")
//!         .with_processor(Arc::new(PlaceholderProcessor::new()))
//!         .with_handler(sink.clone()))
//! });
//!
//! let logger = factory
//!     .logger()
//!     .with_masking_rules(MaskingKind::Password, RuleSet::keys(["password"]));
//! logger.info("User {password}", map! { "password" => "secret_password" })?;
//!
//! let record = handler.last().unwrap();
//! assert_eq!(record.message, "User *REDACTED.PASSWORD*");
//! assert_eq!(record.context.get_str("password"), Some(&Value::from("*REDACTED.PASSWORD*")));
//! # Ok::<(), ml_common::LogError>(())
//! ```

pub mod chain;
pub mod config;
pub mod exception;
pub mod factory;
pub mod handler;
pub mod http;
pub mod logger;
pub mod logging;
pub mod masked_error;
pub mod pipeline;
pub mod source;

pub use chain::MaskingEntry;
pub use config::FactoryConfig;
pub use exception::{
    CollectingExceptionHandler, LoggerExceptionHandler, RawLog, SharedExceptionHandler,
    StderrExceptionHandler,
};
pub use factory::{FactorySetup, ManagedLoggerFactory, PipelineBuilder};
pub use handler::{JsonLinesHandler, MemoryHandler, NullHandler, TracingHandler};
pub use http::{
    BodyStream, HttpRequest, HttpRequestProcessor, HttpResponse, HttpResponseProcessor,
    MemoryBody, ObjectProcessor, ServerParams,
};
pub use logger::{IntoLevel, MaskingLogger};
pub use masked_error::MaskedError;
pub use pipeline::Pipeline;
pub use source::{ExtraModifierProcessor, SourceLocation};
