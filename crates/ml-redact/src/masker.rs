//! Leaf maskers: given one value, return its masked replacement.

use ml_common::{Key, MaskerKind, Value};

/// Sentinel written by the replacing masker and embedded by the string
/// masker.
pub const REPLACEMENT: &str = "*REDACTED*";
/// Word substituted for masked query parameters.
pub const URL_REPLACEMENT: &str = "REDACTED";
/// Sentinel for a well-formed password.
pub const MASKED_PASSWORD: &str = "*REDACTED.PASSWORD*";
/// Passwords shorter than this are reported as invalid.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Password classification sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordStatus {
    Empty,
    InvalidType,
    InvalidLength,
    Masked,
}

impl PasswordStatus {
    fn template(self) -> &'static str {
        match self {
            PasswordStatus::Empty => "*REDACTED.EMPTY-PASSWORD(%s)*",
            PasswordStatus::InvalidType => "*REDACTED.INVALID-TYPE-PASSWORD(%s)*",
            PasswordStatus::InvalidLength => "*REDACTED.INVALID-LENGTH-PASSWORD(%s)*",
            PasswordStatus::Masked => MASKED_PASSWORD,
        }
    }

    /// Render the sentinel with its detail.
    pub fn format(self, detail: impl std::fmt::Display) -> String {
        self.template().replace("%s", &detail.to_string())
    }
}

/// Sentinel for a value the string masker cannot handle.
pub fn invalid_type_sentinel(value: &Value) -> String {
    format!("*REDACTED.INVALID-TYPE-({})*", value.debug_type())
}

/// Produces masked replacements for leaf values.
///
/// `cell` is the rule key that selected the value, `None` when the value is
/// masked outside of a rule (for example by a field annotation).
pub trait Masker: Send + Sync {
    fn add_mask(&self, cell: Option<&Key>, value: Value) -> Value;

    /// Name of the context processor built around this masker.
    fn processor_name(&self) -> &'static str;
}

/// Fresh masker for an annotation kind.
pub fn masker_for(kind: MaskerKind) -> Box<dyn Masker> {
    match kind {
        MaskerKind::Replace => Box::new(ReplaceMasker),
        MaskerKind::Password => Box::new(PasswordMasker),
        MaskerKind::String => Box::new(StringMasker),
        MaskerKind::Url => Box::new(UrlMasker::default()),
    }
}

/// Replaces every value with [`REPLACEMENT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceMasker;

impl Masker for ReplaceMasker {
    fn processor_name(&self) -> &'static str {
        "MaskingProcessor"
    }

    fn add_mask(&self, _cell: Option<&Key>, _value: Value) -> Value {
        Value::from(REPLACEMENT)
    }
}

/// Classifies passwords; never reveals any part of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordMasker;

impl Masker for PasswordMasker {
    fn processor_name(&self) -> &'static str {
        "PasswordMaskingProcessor"
    }

    fn add_mask(&self, _cell: Option<&Key>, value: Value) -> Value {
        if !value.is_truthy() {
            return PasswordStatus::Empty.format(value.debug_type()).into();
        }
        let Value::String(password) = &value else {
            return PasswordStatus::InvalidType.format(value.debug_type()).into();
        };
        let len = password.chars().count();
        if len < MIN_PASSWORD_LENGTH {
            return PasswordStatus::InvalidLength.format(len).into();
        }
        Value::from(MASKED_PASSWORD)
    }
}

/// Reveals the edges of long strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringMasker;

impl Masker for StringMasker {
    fn processor_name(&self) -> &'static str {
        "StringMaskingProcessor"
    }

    fn add_mask(&self, _cell: Option<&Key>, value: Value) -> Value {
        if !value.is_truthy() {
            return value;
        }
        let Value::String(s) = &value else {
            return invalid_type_sentinel(&value).into();
        };
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len();
        let tail: String = chars[len.saturating_sub(2)..].iter().collect();
        if len > 7 {
            let head: String = chars[..3].iter().collect();
            return format!("{}{}{}", head, REPLACEMENT, tail).into();
        }
        if len > 4 {
            return format!("{}{}{}", chars[0], REPLACEMENT, tail).into();
        }
        Value::from(REPLACEMENT)
    }
}

/// Masks query parameters inside URL strings.
///
/// `params` maps a rule key to the query parameters to mask for values
/// selected by that key. Parameters are matched by name for `name=value`
/// pairs and by position for bare tokens. A rule key with no entry masks
/// every parameter.
#[derive(Debug, Clone, Default)]
pub struct UrlMasker {
    params: Vec<(Key, Vec<Key>)>,
}

impl UrlMasker {
    pub fn new(params: Vec<(Key, Vec<Key>)>) -> Self {
        UrlMasker { params }
    }

    pub fn params(&self) -> &[(Key, Vec<Key>)] {
        &self.params
    }

    fn keys_for(&self, cell: Option<&Key>) -> &[Key] {
        cell.and_then(|cell| self.params.iter().find(|(k, _)| k == cell))
            .map_or(&[], |(_, keys)| keys.as_slice())
    }

    /// Mask the query string of `url` for the given rule key.
    pub fn mask_url(&self, cell: Option<&Key>, url: &str) -> String {
        let Some((host, query_with_fragment)) = url.split_once('?') else {
            return url.to_string();
        };
        let (query, fragment) = match query_with_fragment.split_once('#') {
            Some((query, fragment)) => (query, Some(fragment)),
            None => (query_with_fragment, None),
        };
        let keys = self.keys_for(cell);
        let parts: Vec<String> = query
            .split('&')
            .enumerate()
            .map(|(position, part)| match part.split_once('=') {
                Some((name, _)) => {
                    if keys.is_empty() || keys.contains(&Key::from(name)) {
                        format!("{}={}", name, URL_REPLACEMENT)
                    } else {
                        part.to_string()
                    }
                }
                None => {
                    if keys.is_empty() || keys.contains(&Key::from(position)) {
                        URL_REPLACEMENT.to_string()
                    } else {
                        part.to_string()
                    }
                }
            })
            .collect();
        let mut out = format!("{}?{}", host, parts.join("&"));
        if let Some(fragment) = fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

impl Masker for UrlMasker {
    fn processor_name(&self) -> &'static str {
        "UrlMaskingProcessor"
    }

    fn add_mask(&self, cell: Option<&Key>, value: Value) -> Value {
        match &value {
            Value::String(url) => Value::String(self.mask_url(cell, url)),
            _ => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_common::{map, Map, ObjectValue};
    use proptest::prelude::*;

    fn mask<M: Masker>(masker: &M, value: impl Into<Value>) -> Value {
        masker.add_mask(None, value.into())
    }

    #[test]
    fn test_replace_masks_any_type() {
        assert_eq!(mask(&ReplaceMasker, 42), Value::from(REPLACEMENT));
        assert_eq!(mask(&ReplaceMasker, Value::Null), Value::from(REPLACEMENT));
    }

    #[test]
    fn test_password_bands() {
        assert_eq!(
            mask(&PasswordMasker, ""),
            Value::from("*REDACTED.EMPTY-PASSWORD(string)*")
        );
        assert_eq!(
            mask(&PasswordMasker, Value::Null),
            Value::from("*REDACTED.EMPTY-PASSWORD(null)*")
        );
        assert_eq!(
            mask(&PasswordMasker, 1234),
            Value::from("*REDACTED.INVALID-TYPE-PASSWORD(int)*")
        );
        assert_eq!(
            mask(&PasswordMasker, "short"),
            Value::from("*REDACTED.INVALID-LENGTH-PASSWORD(5)*")
        );
        assert_eq!(mask(&PasswordMasker, "12345678"), Value::from(MASKED_PASSWORD));
    }

    #[test]
    fn test_password_invalid_type_names_wrapped_object() {
        let obj = Value::Object(ObjectValue::new("App\\Secret", map! { "v" => 1 }));
        assert_eq!(
            mask(&PasswordMasker, obj),
            Value::from("*REDACTED.INVALID-TYPE-PASSWORD(App\\Secret)*")
        );
        let anon = Value::Object(ObjectValue::anonymous(Map::new()));
        assert_eq!(
            mask(&PasswordMasker, anon),
            Value::from("*REDACTED.INVALID-TYPE-PASSWORD(class@anonymous)*")
        );
    }

    #[test]
    fn test_password_length_counts_characters() {
        assert_eq!(
            mask(&PasswordMasker, "пароль"),
            Value::from("*REDACTED.INVALID-LENGTH-PASSWORD(6)*")
        );
        assert_eq!(mask(&PasswordMasker, "парольчик"), Value::from(MASKED_PASSWORD));
    }

    #[test]
    fn test_string_bands() {
        assert_eq!(mask(&StringMasker, "ab"), Value::from(REPLACEMENT));
        assert_eq!(mask(&StringMasker, "abcde"), Value::from("a*REDACTED*de"));
        assert_eq!(mask(&StringMasker, "abcdefgh"), Value::from("abc*REDACTED*gh"));
        assert_eq!(mask(&StringMasker, "Password"), Value::from("Pas*REDACTED*rd"));
        assert_eq!(mask(&StringMasker, "m23eh7ph3"), Value::from("m23*REDACTED*h3"));
    }

    #[test]
    fn test_string_falsy_passes_through() {
        assert_eq!(mask(&StringMasker, ""), Value::from(""));
        assert_eq!(mask(&StringMasker, 0), Value::Int(0));
        assert_eq!(mask(&StringMasker, Value::Null), Value::Null);
    }

    #[test]
    fn test_string_invalid_type() {
        assert_eq!(
            mask(&StringMasker, 15),
            Value::from("*REDACTED.INVALID-TYPE-(int)*")
        );
        assert_eq!(
            mask(&StringMasker, vec![1]),
            Value::from("*REDACTED.INVALID-TYPE-(array)*")
        );
    }

    #[test]
    fn test_string_multibyte() {
        assert_eq!(mask(&StringMasker, "секретный"), Value::from("сек*REDACTED*ый"));
    }

    #[test]
    fn test_url_masks_all_without_params() {
        let masker = UrlMasker::default();
        assert_eq!(
            masker.mask_url(None, "https://ex.com/path?token=abc&user=bob"),
            "https://ex.com/path?token=REDACTED&user=REDACTED"
        );
        assert_eq!(masker.mask_url(None, "https://ex.com/path"), "https://ex.com/path");
    }

    #[test]
    fn test_url_selected_params() {
        let masker = UrlMasker::new(vec![(Key::from("url"), vec![Key::from("token")])]);
        let cell = Key::from("url");
        assert_eq!(
            masker.mask_url(Some(&cell), "https://x.com?token=abc&user=bob"),
            "https://x.com?token=REDACTED&user=bob"
        );
    }

    #[test]
    fn test_url_positional_params_and_fragment() {
        let masker = UrlMasker::new(vec![(
            Key::from("url"),
            vec![Key::Int(0), Key::Int(2), Key::from("param2"), Key::Int(5)],
        )]);
        let cell = Key::from("url");
        assert_eq!(
            masker.mask_url(Some(&cell), "https://ex.com?first&param1=1&third&param2=2#top"),
            "https://ex.com?REDACTED&param1=1&REDACTED&param2=REDACTED#top"
        );
    }

    #[test]
    fn test_url_fragment_before_query_is_kept() {
        let masker = UrlMasker::default();
        assert_eq!(
            masker.mask_url(None, "https://ex.com/path#frag?param=1"),
            "https://ex.com/path#frag?param=REDACTED"
        );
    }

    #[test]
    fn test_url_non_string_untouched() {
        assert_eq!(UrlMasker::default().add_mask(None, Value::Int(5)), Value::Int(5));
    }

    proptest! {
        #[test]
        fn prop_string_masker_never_leaks_middle(s in "[a-z]{8,32}") {
            let masked = StringMasker.add_mask(None, Value::from(s.as_str()));
            let masked = masked.as_str().unwrap().to_string();
            prop_assert!(masked.starts_with(&s[..3]));
            prop_assert!(masked.ends_with(&s[s.len() - 2..]));
            prop_assert_eq!(masked.len(), 3 + REPLACEMENT.len() + 2);
        }
    }
}
