//! Context masking processors.
//!
//! A [`ContextMaskingProcessor`] pairs a [`RuleSet`] with a [`Masker`] and
//! runs the [`ContextWalker`] over every record's context.

use std::sync::Arc;

use ml_common::{Key, LogError, LogRecord, Map, MaskerKind, Processor, Result, SharedProcessor, Value};
use serde::{Deserialize, Serialize};

use crate::config::ConfigMaskingProcessor;
use crate::masker::{Masker, PasswordMasker, ReplaceMasker, StringMasker, UrlMasker};
use crate::placeholder::interpolate;
use crate::rules::RuleSet;
use crate::walker::ContextWalker;

/// Masks context values selected by a rule set.
pub struct ContextMaskingProcessor<M: Masker> {
    rules: RuleSet,
    masker: M,
    interpolate: bool,
}

/// Replaces matched values with `*REDACTED*`.
pub type MaskingProcessor = ContextMaskingProcessor<ReplaceMasker>;
/// Password-aware sentinels.
pub type PasswordMaskingProcessor = ContextMaskingProcessor<PasswordMasker>;
/// Partial reveal of long strings.
pub type StringMaskingProcessor = ContextMaskingProcessor<StringMasker>;
/// Query-parameter masking of URL strings.
pub type UrlMaskingProcessor = ContextMaskingProcessor<UrlMasker>;

impl<M: Masker + Default> ContextMaskingProcessor<M> {
    pub fn new(rules: RuleSet) -> Self {
        ContextMaskingProcessor::with_masker(M::default(), rules)
    }

    /// Processor masking every leaf of the context.
    pub fn mask_all() -> Self {
        ContextMaskingProcessor::new(RuleSet::new())
    }
}

impl<M: Masker> ContextMaskingProcessor<M> {
    pub fn with_masker(masker: M, rules: RuleSet) -> Self {
        ContextMaskingProcessor {
            rules,
            masker,
            interpolate: false,
        }
    }

    /// Also substitute `{key}` placeholders in the message with the masked
    /// context values.
    pub fn interpolate_message(mut self, enabled: bool) -> Self {
        self.interpolate = enabled;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn masker(&self) -> &M {
        &self.masker
    }

    /// Mask a single value outside of any rule.
    pub fn add_mask(&self, value: impl Into<Value>) -> Value {
        self.masker.add_mask(None, value.into())
    }

    pub fn mask_context(&self, context: Map) -> Map {
        ContextWalker::new(&self.masker).apply(&self.rules, context)
    }
}

impl UrlMaskingProcessor {
    /// Mask only the listed query parameters of the named context entries.
    /// The entries become this processor's rules; an empty list is ignored.
    pub fn with_masked_params(mut self, params: Vec<(Key, Vec<Key>)>) -> Self {
        if !params.is_empty() {
            self.rules = RuleSet::keys(params.iter().map(|(key, _)| key.clone()));
            self.masker = UrlMasker::new(params);
        }
        self
    }
}

impl<M: Masker> Processor for ContextMaskingProcessor<M> {
    fn process(&self, record: LogRecord) -> Result<LogRecord> {
        let context = self.mask_context(record.context.clone());
        if self.interpolate {
            let message = interpolate(&record.message, &context);
            return Ok(record.with_message(message).with_context(context));
        }
        Ok(record.with_context(context))
    }

    fn name(&self) -> &str {
        self.masker.processor_name()
    }

    fn is_masking(&self) -> bool {
        true
    }
}

/// Masking strategies that can be declared by name in rule entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskingKind {
    Replace,
    Password,
    String,
    Url,
    Config,
}

impl MaskingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MaskingKind::Replace => "replace",
            MaskingKind::Password => "password",
            MaskingKind::String => "string",
            MaskingKind::Url => "url",
            MaskingKind::Config => "config",
        }
    }

    pub const ALL: [MaskingKind; 5] = [
        MaskingKind::Replace,
        MaskingKind::Password,
        MaskingKind::String,
        MaskingKind::Url,
        MaskingKind::Config,
    ];

    /// Accepts the short kind name or the processor name, case-insensitive.
    pub fn parse_str(s: &str) -> Option<MaskingKind> {
        let by_processor = MaskingKind::ALL
            .into_iter()
            .find(|kind| kind.processor_name().eq_ignore_ascii_case(s));
        if by_processor.is_some() {
            return by_processor;
        }
        if s.eq_ignore_ascii_case("config") {
            return Some(MaskingKind::Config);
        }
        MaskerKind::parse_str(s).map(MaskingKind::from)
    }

    /// Name of the processor this kind builds.
    pub fn processor_name(self) -> &'static str {
        match self {
            MaskingKind::Replace => "MaskingProcessor",
            MaskingKind::Password => "PasswordMaskingProcessor",
            MaskingKind::String => "StringMaskingProcessor",
            MaskingKind::Url => "UrlMaskingProcessor",
            MaskingKind::Config => "ConfigMaskingProcessor",
        }
    }

    /// Construct the processor for `rules`.
    pub fn build(self, rules: RuleSet) -> SharedProcessor {
        match self {
            MaskingKind::Replace => Arc::new(MaskingProcessor::new(rules)),
            MaskingKind::Password => Arc::new(PasswordMaskingProcessor::new(rules)),
            MaskingKind::String => Arc::new(StringMaskingProcessor::new(rules)),
            MaskingKind::Url => Arc::new(UrlMaskingProcessor::new(rules)),
            MaskingKind::Config => Arc::new(ConfigMaskingProcessor::from_rules(&rules)),
        }
    }
}

impl From<MaskerKind> for MaskingKind {
    fn from(kind: MaskerKind) -> Self {
        match kind {
            MaskerKind::Replace => MaskingKind::Replace,
            MaskerKind::Password => MaskingKind::Password,
            MaskerKind::String => MaskingKind::String,
            MaskerKind::Url => MaskingKind::Url,
        }
    }
}

impl std::str::FromStr for MaskingKind {
    type Err = LogError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        MaskingKind::parse_str(s).ok_or_else(|| {
            LogError::invalid_argument(format!(
                "the processor `{}` being initialized must be a masking processor",
                s
            ))
        })
    }
}

impl std::fmt::Display for MaskingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
