//! Context map keys.

use serde::{Serialize, Serializer};

/// A context key: either a positional integer or a string name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// Interpret a textual key the way decoded documents do: canonical
    /// decimal integers become [`Key::Int`], everything else stays a string.
    pub fn from_text(s: &str) -> Key {
        let canonical = !s.is_empty()
            && (s == "0" || !s.starts_with('0'))
            && !s.starts_with("-0")
            && s != "-";
        if canonical {
            if let Ok(n) = s.parse::<i64>() {
                if n.to_string() == s {
                    return Key::Int(n);
                }
            }
        }
        Key::Str(s.to_string())
    }

    /// Key comparison used by masking rules: strings compare after
    /// lowercasing, integers compare exactly, mixed kinds never match.
    pub fn matches(&self, other: &Key) -> bool {
        match (self, other) {
            (Key::Str(a), Key::Str(b)) => a == b || a.to_lowercase() == b.to_lowercase(),
            (Key::Int(a), Key::Int(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            Key::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(n) => Some(*n),
            Key::Str(_) => None,
        }
    }

    /// Sequence index this key addresses, if any.
    pub fn as_index(&self) -> Option<usize> {
        self.as_int().and_then(|n| usize::try_from(n).ok())
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Key::Int(_))
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{}", n),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Str(s.clone())
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Int(n.into())
    }
}

impl From<usize> for Key {
    fn from(n: usize) -> Self {
        Key::Int(n as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_text_coerces_canonical_integers() {
        assert_eq!(Key::from_text("0"), Key::Int(0));
        assert_eq!(Key::from_text("42"), Key::Int(42));
        assert_eq!(Key::from_text("-7"), Key::Int(-7));
        assert_eq!(Key::from_text("007"), Key::Str("007".into()));
        assert_eq!(Key::from_text("-0"), Key::Str("-0".into()));
        assert_eq!(Key::from_text("1.5"), Key::Str("1.5".into()));
        assert_eq!(Key::from_text(""), Key::Str(String::new()));
    }

    #[test]
    fn test_matches_is_case_insensitive_for_strings_only() {
        assert!(Key::from("Password").matches(&Key::from("password")));
        assert!(Key::from("ПАРОЛЬ").matches(&Key::from("пароль")));
        assert!(Key::Int(3).matches(&Key::Int(3)));
        assert!(!Key::Int(3).matches(&Key::from("3")));
    }

    proptest! {
        #[test]
        fn prop_case_fold_matches(name in "[a-zA-Z_]{1,16}") {
            let key = Key::from(name.as_str());
            prop_assert!(key.matches(&Key::from(name.to_uppercase())));
            prop_assert!(key.matches(&Key::from(name.to_lowercase())));
        }
    }
}
