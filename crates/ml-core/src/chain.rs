//! Processor chain composition.
//!
//! A facade keeps two lists: generic processor slots, where `None` marks the
//! position a masking entry was registered at, and the masking entries
//! themselves, newest first. [`merge`] fills each empty slot with the next
//! masking entry so masking runs exactly where it was registered relative
//! to the generic processors.

use std::sync::Arc;

use ml_common::{Key, LogError, Processor, Result, SharedProcessor};
use ml_redact::{merge_rules, MaskingKind, RuleSet};

/// One registered masking entry: a rule declaration to be built on demand,
/// or a ready processor.
#[derive(Clone)]
pub enum MaskingEntry {
    Rules { kind: MaskingKind, rules: RuleSet },
    Processor(SharedProcessor),
}

impl MaskingEntry {
    pub fn rules(kind: MaskingKind, rules: RuleSet) -> Self {
        MaskingEntry::Rules { kind, rules }
    }

    pub fn processor(processor: impl Processor + 'static) -> Self {
        MaskingEntry::Processor(Arc::new(processor))
    }

    pub fn kind(&self) -> Option<MaskingKind> {
        match self {
            MaskingEntry::Rules { kind, .. } => Some(*kind),
            MaskingEntry::Processor(_) => None,
        }
    }

    /// Build the processor this entry stands for.
    pub fn to_processor(&self) -> SharedProcessor {
        match self {
            MaskingEntry::Rules { kind, rules } => kind.build(rules.clone()),
            MaskingEntry::Processor(processor) => Arc::clone(processor),
        }
    }

    /// Parse declarations of the form `{"password": ["password", "pass"]}`.
    /// Keys name a masking processor, values are a field name or a rule
    /// list. Entries come out sorted by processor name.
    pub fn from_json(declarations: &serde_json::Value) -> Result<Vec<MaskingEntry>> {
        check(declarations)?;
        let Some(entries) = declarations.as_object() else {
            return Ok(Vec::new());
        };
        entries
            .iter()
            .map(|(name, rules)| {
                let kind: MaskingKind = name.parse()?;
                Ok(MaskingEntry::rules(kind, RuleSet::from_json(rules)?))
            })
            .collect()
    }
}

impl From<SharedProcessor> for MaskingEntry {
    fn from(processor: SharedProcessor) -> Self {
        MaskingEntry::Processor(processor)
    }
}

impl std::fmt::Debug for MaskingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaskingEntry::Rules { kind, rules } => f
                .debug_struct("Rules")
                .field("kind", kind)
                .field("rules", rules)
                .finish(),
            MaskingEntry::Processor(p) => f.debug_tuple("Processor").field(&p.name()).finish(),
        }
    }
}

const SHAPE_ERROR: &str = "a masking declaration must map a masking processor name to a field \
                           name or a list of fields to be masked";

/// Validate untyped masking declarations before they are parsed.
pub fn check(declarations: &serde_json::Value) -> Result<()> {
    let serde_json::Value::Object(entries) = declarations else {
        return Err(LogError::invalid_argument(SHAPE_ERROR));
    };
    for (name, rules) in entries {
        if matches!(Key::from_text(name), Key::Int(_)) {
            return Err(LogError::invalid_argument(SHAPE_ERROR));
        }
        if !(rules.is_array() || rules.is_object() || rules.is_string()) {
            return Err(LogError::invalid_argument(SHAPE_ERROR));
        }
        name.parse::<MaskingKind>()?;
    }
    Ok(())
}

/// Build every entry, keeping order.
pub fn convert(entries: &[MaskingEntry]) -> Vec<SharedProcessor> {
    entries.iter().map(MaskingEntry::to_processor).collect()
}

/// Fill empty slots with masking entries, in order. Slots left empty once
/// the entries run out are dropped; generic processors always stay.
pub fn merge(slots: &[Option<SharedProcessor>], entries: &[MaskingEntry]) -> Vec<SharedProcessor> {
    let mut pending = entries.iter();
    slots
        .iter()
        .filter_map(|slot| match slot {
            Some(processor) => Some(Arc::clone(processor)),
            None => pending.next().map(MaskingEntry::to_processor),
        })
        .collect()
}

/// If an entry of the same `kind` was already registered, return the entry
/// list with `rules` merged into it. `None` means the caller should register
/// a new entry.
pub fn remove_duplicates(
    entries: &[MaskingEntry],
    kind: MaskingKind,
    rules: &RuleSet,
) -> Option<Vec<MaskingEntry>> {
    let position = entries.iter().position(|e| e.kind() == Some(kind))?;
    let mut updated = entries.to_vec();
    if let MaskingEntry::Rules { rules: existing, .. } = &mut updated[position] {
        *existing = merge_rules(existing, rules);
    }
    Some(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_common::FnProcessor;
    use serde_json::json;

    fn generic(name: &'static str) -> Option<SharedProcessor> {
        Some(FnProcessor::new(name, Ok).shared())
    }

    fn names(processors: &[SharedProcessor]) -> Vec<String> {
        processors.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn test_merge_fills_slots_in_order() {
        let slots = vec![None, generic("extra"), None, generic("tail")];
        let entries = vec![
            MaskingEntry::rules(MaskingKind::String, RuleSet::keys(["token"])),
            MaskingEntry::rules(MaskingKind::Password, RuleSet::keys(["password"])),
        ];
        assert_eq!(
            names(&merge(&slots, &entries)),
            ["StringMaskingProcessor", "extra", "PasswordMaskingProcessor", "tail"]
        );
    }

    #[test]
    fn test_merge_drops_unfilled_slots() {
        let slots = vec![None, None, generic("extra")];
        let entries = vec![MaskingEntry::rules(MaskingKind::Url, RuleSet::new())];
        assert_eq!(names(&merge(&slots, &entries)), ["UrlMaskingProcessor", "extra"]);
    }

    #[test]
    fn test_check_accepts_declarations() {
        check(&json!({"password": ["password", "pass"], "url": "link", "StringMaskingProcessor": {"user": ["token"]}}))
            .unwrap();
    }

    #[test]
    fn test_check_rejects_bad_shapes() {
        for bad in [
            json!(["password"]),
            json!({"password": 1}),
            json!({"0": ["password"]}),
            json!({"HttpRequestProcessor": ["body"]}),
        ] {
            let err = check(&bad).unwrap_err();
            assert!(matches!(err, LogError::InvalidArgument(_)), "{}", bad);
        }
    }

    #[test]
    fn test_from_json_builds_rules() {
        let entries = MaskingEntry::from_json(&json!({"password": "secret"})).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind(), Some(MaskingKind::Password));
        assert_eq!(entries[0].to_processor().name(), "PasswordMaskingProcessor");
    }

    #[test]
    fn test_remove_duplicates_merges_in_place() {
        let entries = vec![
            MaskingEntry::rules(MaskingKind::String, RuleSet::keys(["token"])),
            MaskingEntry::rules(MaskingKind::Password, RuleSet::keys(["a", "b"])),
        ];
        let updated = remove_duplicates(&entries, MaskingKind::Password, &RuleSet::keys(["b", "c"]))
            .unwrap();
        assert_eq!(updated.len(), 2);
        match &updated[1] {
            MaskingEntry::Rules { rules, .. } => assert_eq!(*rules, RuleSet::keys(["a", "b", "c"])),
            other => panic!("unexpected entry {:?}", other),
        }
        assert!(remove_duplicates(&entries, MaskingKind::Url, &RuleSet::new()).is_none());
    }

    #[test]
    fn test_processor_entries_are_never_merged() {
        let entries = vec![MaskingEntry::from(FnProcessor::masking("custom", Ok).shared())];
        assert!(remove_duplicates(&entries, MaskingKind::Password, &RuleSet::keys(["a"])).is_none());
        assert_eq!(names(&convert(&entries)), ["custom"]);
    }
}
