//! Call-site tagging.
//!
//! `with_source` on the facade records where logging happens, which helps
//! when the logger is wrapped and the wrapper's own location is useless.

use std::panic::Location;

use ml_common::{LogRecord, Map, Processor, Result, Value};

/// A file and line pair. A zero line renders as the file alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        SourceLocation {
            file: file.into(),
            line,
        }
    }

    /// Location of the code calling this function. Functions marked
    /// `#[track_caller]` pass their own caller through.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        SourceLocation::new(location.file(), location.line())
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            f.write_str(&self.file)
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

/// Merges fixed entries into every record's `extra`.
#[derive(Debug, Clone)]
pub struct ExtraModifierProcessor {
    extra: Map,
}

impl ExtraModifierProcessor {
    pub const NAME: &'static str = "ExtraModifierProcessor";

    pub fn new(extra: Map) -> Self {
        ExtraModifierProcessor { extra }
    }

    pub fn source(location: &SourceLocation) -> Self {
        let mut extra = Map::new();
        extra.insert("source", Value::String(location.to_string()));
        ExtraModifierProcessor::new(extra)
    }
}

impl Processor for ExtraModifierProcessor {
    fn process(&self, record: LogRecord) -> Result<LogRecord> {
        let mut extra = record.extra.clone();
        extra.merge(self.extra.clone());
        Ok(record.with_extra(extra))
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
