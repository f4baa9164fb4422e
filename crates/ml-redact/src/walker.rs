//! Applies a [`RuleSet`] to a context tree.
//!
//! Converted objects take part in path matching as a single entry keyed by
//! their type name, so `name => [Type => [...]]` rules reach their fields.

use ml_common::{Key, Map, Value, ANONYMOUS_CLASS};

use crate::masker::Masker;
use crate::rules::{RuleSet, RuleValue};

/// Walks context trees and masks the leaves selected by rules.
pub struct ContextWalker<'a> {
    masker: &'a dyn Masker,
}

impl<'a> ContextWalker<'a> {
    pub fn new(masker: &'a dyn Masker) -> Self {
        ContextWalker { masker }
    }

    /// Apply `rules` to a whole context. An empty rule set masks every leaf.
    pub fn apply(&self, rules: &RuleSet, context: Map) -> Map {
        let mut root = Value::Map(context);
        self.apply_value(rules, &mut root);
        match root {
            Value::Map(map) => map,
            _ => Map::new(),
        }
    }

    /// Apply `rules` to any container value in place.
    pub fn apply_value(&self, rules: &RuleSet, root: &mut Value) {
        if rules.is_empty() {
            self.mask_all(root);
            return;
        }
        for (key, rule) in rules.iter() {
            match (key, rule) {
                (Key::Int(_), RuleValue::Key(cell)) => self.mask_by_key(cell, root),
                _ => self.mask_by_path(key, rule, root),
            }
        }
    }

    fn mask(&self, cell: &Key, value: &mut Value) {
        let original = std::mem::take(value);
        *value = self.masker.add_mask(Some(cell), original);
    }

    /// Mask every entry named `cell` at any depth. Masked values are not
    /// descended into.
    fn mask_by_key(&self, cell: &Key, node: &mut Value) {
        for_each_entry(node, &mut |key, value| {
            if key.matches(cell) {
                self.mask(cell, value);
            } else if value.is_container() {
                self.mask_by_key(cell, value);
            }
        });
    }

    fn mask_all(&self, node: &mut Value) {
        for_each_entry(node, &mut |key, value| {
            if value.is_container() {
                self.mask_all(value);
            } else {
                self.mask(key, value);
            }
        });
    }

    fn mask_by_path(&self, key: &Key, rule: &RuleValue, node: &mut Value) {
        if matches!(node, Value::Object(_)) {
            with_wrapped_object(node, |wrapped| self.mask_by_path(key, rule, wrapped));
            return;
        }

        let rules = match rule {
            // Direct match at this level.
            RuleValue::Key(cell) => {
                if let Some(value) = entry_mut(node, cell) {
                    self.mask(cell, value);
                }
                return;
            }
            RuleValue::List(rules) => rules,
        };

        if rules.is_empty() {
            if let Some(value) = entry_mut(node, key) {
                if value.is_container() {
                    self.mask_all(value);
                }
            }
            return;
        }

        if key.is_int() {
            if let Some((type_name, inner)) = rules.as_class_shape() {
                if let Some(Value::Object(obj)) = entry_mut(node, key) {
                    if obj.display_name() == type_name && !obj.fields.is_empty() {
                        let mut fields = Value::Map(std::mem::take(&mut obj.fields));
                        self.mask_by_path(key, inner, &mut fields);
                        if let Value::Map(map) = fields {
                            obj.fields = map;
                        }
                    }
                }
                return;
            }
            for (k, c) in rules.iter() {
                let RuleValue::Key(cell) = c else {
                    continue;
                };
                if let Some(value) = entry_mut(node, cell) {
                    if value.is_container() {
                        self.mask_by_path(k, c, value);
                    } else {
                        self.mask(cell, value);
                    }
                }
            }
            return;
        }

        // Nested search.
        if let Some(value) = entry_mut(node, key) {
            if value.is_truthy() && !value.is_raw() {
                for (k, c) in rules.iter() {
                    self.mask_by_path(k, c, value);
                }
            }
        }
    }
}

fn entry_mut<'v>(node: &'v mut Value, key: &Key) -> Option<&'v mut Value> {
    match node {
        Value::Map(map) => map.get_mut(key),
        Value::Seq(items) => key.as_index().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

fn for_each_entry(node: &mut Value, f: &mut dyn FnMut(&Key, &mut Value)) {
    if matches!(node, Value::Object(_)) {
        with_wrapped_object(node, |wrapped| for_each_entry(wrapped, f));
        return;
    }
    match node {
        Value::Map(map) => {
            for (key, value) in map.iter_mut() {
                f(key, value);
            }
        }
        Value::Seq(items) => {
            for (i, value) in items.iter_mut().enumerate() {
                f(&Key::from(i), value);
            }
        }
        _ => {}
    }
}

/// Run `f` over the object as `{TypeName: fields}`, then restore it. If the
/// fields entry was masked to a scalar the object is replaced by that
/// scalar.
fn with_wrapped_object(node: &mut Value, f: impl FnOnce(&mut Value)) {
    let Value::Object(obj) = node else {
        return;
    };
    let type_name = obj.type_name.take();
    let fields = std::mem::take(&mut obj.fields);
    let name = type_name
        .clone()
        .unwrap_or_else(|| ANONYMOUS_CLASS.to_string());
    let mut wrapped = Value::Map(std::iter::once((Key::Str(name), Value::Map(fields))).collect());
    f(&mut wrapped);
    *node = match wrapped {
        Value::Map(map) => match map.into_iter().next() {
            Some((_, Value::Map(fields))) => Value::Object(ml_common::ObjectValue { type_name, fields }),
            Some((_, masked)) => masked,
            None => Value::Null,
        },
        other => other,
    };
}
