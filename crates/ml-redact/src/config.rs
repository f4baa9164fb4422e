//! Masking of configuration secrets wherever they show up.
//!
//! The processor is given the application's configuration, keeps every
//! distinct non-empty string in it, and replaces those strings in messages
//! (substring match) and in context values (exact match). Scanning every
//! record is costly, so by default it only runs for WARNING and above.

use ml_common::{Level, LogRecord, Map, Processor, Result, Value};

use crate::masker::{Masker, ReplaceMasker};
use crate::placeholder::render;
use crate::rules::{RuleSet, RuleValue};

/// Replaces known configuration values in messages and contexts.
pub struct ConfigMaskingProcessor {
    values: Vec<String>,
    levels: Vec<Level>,
    masker: Box<dyn Masker>,
}

impl ConfigMaskingProcessor {
    /// Levels masked when none are given.
    pub const DEFAULT_LEVELS: [Level; 5] = [
        Level::Warning,
        Level::Error,
        Level::Critical,
        Level::Alert,
        Level::Emergency,
    ];

    pub fn new(config: &Value) -> Self {
        let mut values = Vec::new();
        flatten_value(config, &mut values);
        ConfigMaskingProcessor::from_values(values)
    }

    pub fn from_json(config: &serde_json::Value) -> Self {
        ConfigMaskingProcessor::new(&Value::from(config.clone()))
    }

    /// Collect the string leaves of a rule declaration.
    pub fn from_rules(rules: &RuleSet) -> Self {
        let mut values = Vec::new();
        flatten_rules(rules, &mut values);
        ConfigMaskingProcessor::from_values(values)
    }

    fn from_values(values: Vec<String>) -> Self {
        ConfigMaskingProcessor {
            values,
            levels: Self::DEFAULT_LEVELS.to_vec(),
            masker: Box::new(ReplaceMasker),
        }
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    pub fn with_masker(mut self, masker: impl Masker + 'static) -> Self {
        self.masker = Box::new(masker);
        self
    }

    /// Distinct values being masked, in discovery order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    fn masked(&self, value: &str) -> Value {
        self.masker.add_mask(None, Value::from(value))
    }

    fn mask_message(&self, message: &str) -> String {
        let mut message = message.to_string();
        for value in &self.values {
            if message.contains(value.as_str()) {
                let replacement = render(&self.masked(value));
                message = message.replace(value.as_str(), &replacement);
            }
        }
        message
    }

    fn mask_values(&self, node: &mut Value) {
        match node {
            Value::Map(map) => {
                for (_, value) in map.iter_mut() {
                    self.mask_values(value);
                }
            }
            Value::Seq(items) => {
                for value in items.iter_mut() {
                    self.mask_values(value);
                }
            }
            Value::Object(obj) => {
                for (_, value) in obj.fields.iter_mut() {
                    self.mask_values(value);
                }
            }
            Value::String(s) if self.values.iter().any(|v| v == s) => {
                let masked = self.masked(s);
                *node = masked;
            }
            _ => {}
        }
    }
}

fn push_unique(s: &str, out: &mut Vec<String>) {
    if !s.is_empty() && !out.iter().any(|v| v == s) {
        out.push(s.to_string());
    }
}

fn flatten_value(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => push_unique(s, out),
        Value::Seq(items) => items.iter().for_each(|v| flatten_value(v, out)),
        Value::Map(map) => map.values().for_each(|v| flatten_value(v, out)),
        Value::Object(obj) => obj.fields.values().for_each(|v| flatten_value(v, out)),
        _ => {}
    }
}

fn flatten_rules(rules: &RuleSet, out: &mut Vec<String>) {
    for (_, rule) in rules.iter() {
        match rule {
            RuleValue::Key(key) => {
                if let Some(s) = key.as_str() {
                    push_unique(s, out);
                }
            }
            RuleValue::List(nested) => flatten_rules(nested, out),
        }
    }
}

impl Processor for ConfigMaskingProcessor {
    fn process(&self, record: LogRecord) -> Result<LogRecord> {
        if !self.levels.contains(&record.level) || self.values.is_empty() {
            return Ok(record);
        }
        let message = self.mask_message(&record.message);
        let mut context = Value::Map(record.context.clone());
        self.mask_values(&mut context);
        let context = match context {
            Value::Map(map) => map,
            _ => Map::new(),
        };
        Ok(record.with_message(message).with_context(context))
    }

    fn name(&self) -> &str {
        "ConfigMaskingProcessor"
    }

    fn is_masking(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masker::StringMasker;
    use ml_common::map;
    use serde_json::json;

    fn record(level: Level, message: &str, context: Map) -> LogRecord {
        LogRecord::new("app", level, message, context)
    }

    #[test]
    fn test_flatten_unique_strings() {
        let processor = ConfigMaskingProcessor::from_json(&json!({
            "db": { "password": "secret_value", "port": 5432, "user": "" },
            "level": ["secret_value", "_secret_value_", "other_value"],
        }));
        assert_eq!(
            processor.values(),
            ["secret_value", "_secret_value_", "other_value"]
        );
    }

    #[test]
    fn test_context_masks_exact_matches_only() {
        let processor = ConfigMaskingProcessor::from_json(&json!(["secret_value", {"level": ["secret_value"]}]));
        let out = processor
            .process(record(
                Level::Warning,
                "Test",
                map! {
                    "a" => "secret_value",
                    "b" => "_secret_value_",
                    "nested" => map! { "c" => "secret_value" },
                },
            ))
            .unwrap();
        assert_eq!(out.context.get_str("a"), Some(&Value::from("*REDACTED*")));
        assert_eq!(out.context.get_str("b"), Some(&Value::from("_secret_value_")));
        assert_eq!(
            out.context.get_str("nested").and_then(|v| v.get("c")),
            Some(&Value::from("*REDACTED*"))
        );
    }

    #[test]
    fn test_message_substring_replacement() {
        let processor = ConfigMaskingProcessor::from_json(&json!(["secret_value"]));
        let out = processor
            .process(record(Level::Error, "Test_secret_value", Map::new()))
            .unwrap();
        assert_eq!(out.message, "Test_*REDACTED*");
    }

    #[test]
    fn test_levels_below_threshold_untouched() {
        let processor = ConfigMaskingProcessor::from_json(&json!(["secret_value"]));
        let input = record(Level::Info, "secret_value", map! { "a" => "secret_value" });
        let out = processor.process(input.clone()).unwrap();
        assert_eq!(out, input);

        let processor = processor.with_levels([Level::Info]);
        let out = processor.process(input).unwrap();
        assert_eq!(out.message, "*REDACTED*");
    }

    #[test]
    fn test_custom_masker() {
        let processor =
            ConfigMaskingProcessor::from_json(&json!(["secret_value"])).with_masker(StringMasker);
        let out = processor
            .process(record(Level::Critical, "key=secret_value", Map::new()))
            .unwrap();
        assert_eq!(out.message, "key=sec*REDACTED*ue");
    }

    #[test]
    fn test_from_rules_collects_strings() {
        let rules = RuleSet::keys(["a"]).path("nested", RuleSet::keys(["b"]).field(5));
        assert_eq!(ConfigMaskingProcessor::from_rules(&rules).values(), ["a", "b"]);
    }
}
