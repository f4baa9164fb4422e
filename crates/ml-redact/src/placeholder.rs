//! `{name}` message placeholders.

use ml_common::{Key, LogRecord, Map, Processor, Result, Value};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}\s]+)\}").unwrap());

/// Placeholder names in order of appearance.
pub fn placeholders(message: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(message)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

fn lookup<'c>(context: &'c Map, name: &str) -> Option<&'c Value> {
    context
        .get_str(name)
        .or_else(|| context.get(&Key::from_text(name)))
}

/// Text substituted for a context value.
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => s.clone(),
        Value::Seq(_) | Value::Map(_) | Value::Object(_) => format!("array{}", value.to_json()),
        Value::Raw(raw) => format!("[object {}]", raw.display_name()),
    }
}

/// Replace every placeholder whose name is a context key. Matching is exact
/// and case-sensitive; unknown placeholders are left as they are.
pub fn interpolate(message: &str, context: &Map) -> String {
    if !message.contains('{') || context.is_empty() {
        return message.to_string();
    }
    PLACEHOLDER
        .replace_all(message, |caps: &Captures| match lookup(context, &caps[1]) {
            Some(value) => render(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Interpolates the message from the context, after masking has run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderProcessor {
    remove_used_fields: bool,
}

impl PlaceholderProcessor {
    pub fn new() -> Self {
        PlaceholderProcessor::default()
    }

    /// Drop context entries that were substituted into the message.
    pub fn remove_used_fields(mut self, remove: bool) -> Self {
        self.remove_used_fields = remove;
        self
    }
}

impl Processor for PlaceholderProcessor {
    fn process(&self, record: LogRecord) -> Result<LogRecord> {
        if !record.message.contains('{') {
            return Ok(record);
        }
        let message = interpolate(&record.message, &record.context);
        if !self.remove_used_fields {
            return Ok(record.with_message(message));
        }
        let mut context = record.context.clone();
        for name in placeholders(&record.message) {
            context.remove(&Key::Str(name.to_string()));
        }
        Ok(record.with_message(message).with_context(context))
    }

    fn name(&self) -> &str {
        "PlaceholderProcessor"
    }
}
