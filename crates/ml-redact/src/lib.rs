//! Masking engine for masklog.
//!
//! This crate turns declarative masking rules into processors that redact
//! sensitive values from a record's context before it reaches a handler.
//!
//! # Key Features
//!
//! - **Rule trees**: [`RuleSet`] describes which context entries to mask,
//!   either by name at any depth or by explicit path.
//! - **Masking strategies**: plain replacement, password sentinels, partial
//!   string reveal and URL query parameter masking ([`Masker`]).
//! - **Rule merging**: [`merge_rules`] combines two rule sets without
//!   duplicating entries.
//! - **Object conversion**: [`ObjectConverterProcessor`] turns application
//!   objects into inspectable field maps, honouring field-level mask
//!   annotations in its masked variant.
//!
//! # Example
//!
//! ```
//! use ml_common::{map, Level, LogRecord, Processor, Value};
//! use ml_redact::{PasswordMaskingProcessor, RuleSet, MASKED_PASSWORD};
//!
//! let processor = PasswordMaskingProcessor::new(RuleSet::keys(["password"]));
//! let record = LogRecord::new("app", Level::Info, "login", map! { "password" => "hunter2hunter2" });
//! let masked = processor.process(record).unwrap();
//! assert_eq!(masked.context.get_str("password"), Some(&Value::from(MASKED_PASSWORD)));
//! ```

pub mod config;
pub mod context;
pub mod convert;
pub mod masker;
pub mod merge;
pub mod placeholder;
pub mod rules;
pub mod walker;

pub use config::ConfigMaskingProcessor;
pub use context::{
    ContextMaskingProcessor, MaskingKind, MaskingProcessor, PasswordMaskingProcessor,
    StringMaskingProcessor, UrlMaskingProcessor,
};
pub use convert::{ObjectConverter, ObjectConverterProcessor};
pub use masker::{
    invalid_type_sentinel, masker_for, Masker, PasswordMasker, PasswordStatus, ReplaceMasker,
    StringMasker, UrlMasker, MASKED_PASSWORD, MIN_PASSWORD_LENGTH, REPLACEMENT, URL_REPLACEMENT,
};
pub use merge::merge_rules;
pub use placeholder::{interpolate, placeholders, render, PlaceholderProcessor};
pub use rules::{RuleSet, RuleValue};
pub use walker::ContextWalker;
