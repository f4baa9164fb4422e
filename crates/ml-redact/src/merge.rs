//! Merging of rule sets registered twice for the same masking strategy.

use ml_common::Key;

use crate::rules::{RuleSet, RuleValue};

/// Merge `added` into `original` and normalize the result.
///
/// Keyed entries present on both sides merge recursively (a bare key is
/// treated as a one-element list), positional entries are concatenated.
/// The merged set is then de-duplicated by value, keeping the first
/// occurrence, and reordered so that positional entries come first,
/// renumbered from zero, followed by keyed entries.
pub fn merge_rules(original: &RuleSet, added: &RuleSet) -> RuleSet {
    normalize(merge_recursive(original, added))
}

fn merge_recursive(original: &RuleSet, added: &RuleSet) -> RuleSet {
    let mut merged = original.clone();
    for (key, rule) in added.iter() {
        match key {
            Key::Int(_) => merged.append(rule.clone()),
            Key::Str(_) => match merged.get_mut(key) {
                Some(existing) => {
                    let combined = merge_recursive(&as_list(existing), &as_list(rule));
                    *existing = RuleValue::List(combined);
                }
                None => merged.insert(key.clone(), rule.clone()),
            },
        }
    }
    merged
}

fn as_list(rule: &RuleValue) -> RuleSet {
    match rule {
        RuleValue::List(rules) => rules.clone(),
        RuleValue::Key(key) => RuleSet::new().field(key.clone()),
    }
}

fn normalize(rules: RuleSet) -> RuleSet {
    let mut unique: Vec<(Key, RuleValue)> = Vec::new();
    for (key, rule) in rules.into_entries() {
        let rule = match rule {
            RuleValue::List(nested) => RuleValue::List(normalize(nested)),
            other => other,
        };
        if !unique.iter().any(|(_, seen)| *seen == rule) {
            unique.push((key, rule));
        }
    }

    let mut out = RuleSet::new();
    for (_, rule) in unique.iter().filter(|(key, _)| key.is_int()) {
        out.append(rule.clone());
    }
    for (key, rule) in unique.into_iter().filter(|(key, _)| !key.is_int()) {
        out.insert(key, rule);
    }
    out
}
