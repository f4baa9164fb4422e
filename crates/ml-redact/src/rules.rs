//! Masking rule sets.
//!
//! A [`RuleSet`] is an ordered list of `key => rule` entries:
//!
//! - `int => name` masks every entry called `name` at any depth.
//! - `name => [...]` follows the path `name` and applies the nested rules
//!   to its value; `name => []` masks everything below it.
//! - `int => [...]` applies field names from the list at the current level.
//! - `int => [Type => [...]]` matches a converted object of type `Type` at
//!   that position and applies the nested rules to its fields.
//! - An empty rule set masks every leaf.

use ml_common::{Key, LogError, Result, ANONYMOUS_CLASS};

/// One rule: a bare key or a nested rule set.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    Key(Key),
    List(RuleSet),
}

impl RuleValue {
    pub fn as_list(&self) -> Option<&RuleSet> {
        match self {
            RuleValue::List(rules) => Some(rules),
            RuleValue::Key(_) => None,
        }
    }
}

impl From<&str> for RuleValue {
    fn from(s: &str) -> Self {
        RuleValue::Key(Key::from(s))
    }
}

impl From<i64> for RuleValue {
    fn from(n: i64) -> Self {
        RuleValue::Key(Key::Int(n))
    }
}

impl From<i32> for RuleValue {
    fn from(n: i32) -> Self {
        RuleValue::Key(Key::from(n))
    }
}

impl From<Key> for RuleValue {
    fn from(key: Key) -> Self {
        RuleValue::Key(key)
    }
}

impl From<RuleSet> for RuleValue {
    fn from(rules: RuleSet) -> Self {
        RuleValue::List(rules)
    }
}

/// Ordered collection of masking rules.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleSet {
    entries: Vec<(Key, RuleValue)>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet::default()
    }

    /// Rules masking each of `names` at any depth.
    pub fn keys<I, K>(names: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        names
            .into_iter()
            .fold(RuleSet::new(), |rules, name| rules.field(name))
    }

    /// Mask entries named `name` at any depth.
    pub fn field(self, name: impl Into<Key>) -> Self {
        self.push(RuleValue::Key(name.into()))
    }

    /// Positional nested list, e.g. `[2]` or `[]`.
    pub fn list(self, rules: RuleSet) -> Self {
        self.push(RuleValue::List(rules))
    }

    /// Follow `key` and apply `rules` to its value.
    pub fn path(self, key: impl Into<Key>, rules: RuleSet) -> Self {
        self.entry(key, RuleValue::List(rules))
    }

    /// `key => cell`: mask `cell` directly at the current level.
    pub fn path_key(self, key: impl Into<Key>, cell: impl Into<Key>) -> Self {
        self.entry(key, RuleValue::Key(cell.into()))
    }

    /// Positional class-shape rule matching converted objects of
    /// `type_name`.
    pub fn class_shape(self, type_name: impl Into<String>, rules: RuleSet) -> Self {
        let shape = RuleSet::new().entry(Key::Str(type_name.into()), RuleValue::List(rules));
        self.push(RuleValue::List(shape))
    }

    /// Insert or replace one entry.
    pub fn entry(mut self, key: impl Into<Key>, rule: RuleValue) -> Self {
        self.insert(key.into(), rule);
        self
    }

    /// Append under the next free integer key.
    pub fn push(mut self, rule: RuleValue) -> Self {
        let key = Key::Int(self.next_index());
        self.entries.push((key, rule));
        self
    }

    pub(crate) fn insert(&mut self, key: Key, rule: RuleValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = rule,
            None => self.entries.push((key, rule)),
        }
    }

    pub(crate) fn append(&mut self, rule: RuleValue) {
        let key = Key::Int(self.next_index());
        self.entries.push((key, rule));
    }

    pub(crate) fn into_entries(self) -> Vec<(Key, RuleValue)> {
        self.entries
    }

    pub(crate) fn get_mut(&mut self, key: &Key) -> Option<&mut RuleValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    fn next_index(&self) -> i64 {
        self.entries
            .iter()
            .filter_map(|(k, _)| k.as_int())
            .max()
            .map_or(0, |n| n + 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<&RuleValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &RuleValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys_iter(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// If this set is a class-shape rule, the type name and its inner rule.
    ///
    /// A shape is a single entry keyed by a type name whose rule is a nested
    /// list. The anonymous marker accepts any rule.
    pub fn as_class_shape(&self) -> Option<(&str, &RuleValue)> {
        let [(Key::Str(name), rule)] = self.entries.as_slice() else {
            return None;
        };
        if name == ANONYMOUS_CLASS || matches!(rule, RuleValue::List(_)) {
            return Some((name.as_str(), rule));
        }
        None
    }

    /// Parse rules from a JSON document.
    ///
    /// Arrays become positional entries, objects keyed entries (numeric keys
    /// become integer keys), strings and integers become bare keys. A bare
    /// string is shorthand for a single field.
    pub fn from_json(json: &serde_json::Value) -> Result<RuleSet> {
        match json {
            serde_json::Value::String(_) => Ok(RuleSet::new().push(rule_from_json(json)?)),
            serde_json::Value::Array(items) => items
                .iter()
                .try_fold(RuleSet::new(), |rules, item| Ok(rules.push(rule_from_json(item)?))),
            serde_json::Value::Object(entries) => {
                entries.iter().try_fold(RuleSet::new(), |rules, (key, item)| {
                    Ok(rules.entry(Key::from_text(key), rule_from_json(item)?))
                })
            }
            other => Err(LogError::invalid_argument(format!(
                "masking rules must be a field name, a list or a map, got {}",
                other
            ))),
        }
    }
}

fn rule_from_json(json: &serde_json::Value) -> Result<RuleValue> {
    match json {
        serde_json::Value::String(s) => Ok(RuleValue::Key(Key::Str(s.clone()))),
        serde_json::Value::Number(n) => n.as_i64().map(|n| RuleValue::Key(Key::Int(n))).ok_or_else(
            || LogError::invalid_argument(format!("masking rule key must be an integer, got {}", n)),
        ),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            Ok(RuleValue::List(RuleSet::from_json(json)?))
        }
        other => Err(LogError::invalid_argument(format!(
            "unsupported masking rule value: {}",
            other
        ))),
    }
}

impl<K: Into<Key>> FromIterator<K> for RuleSet {
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        RuleSet::keys(iter)
    }
}
