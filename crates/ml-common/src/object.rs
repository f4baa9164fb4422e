//! Application objects carried in log contexts.
//!
//! Objects are converted into [`ObjectValue`](crate::ObjectValue)s before
//! masking rules see them. Instead of runtime reflection, each type declares
//! its public fields and a static table of per-field masking annotations.

use std::any::Any;

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LogError;
use crate::map::Map;
use crate::value::Value;

/// Marker used in place of a type name for anonymous objects.
pub const ANONYMOUS_CLASS: &str = "class@anonymous";

/// An object that can be placed in a log context.
pub trait LogObject: Any + Send + Sync + std::fmt::Debug {
    /// Qualified type name, or `None` for anonymous types.
    fn type_name(&self) -> Option<&str>;

    /// Public fields. Nested objects may be returned as [`Value::Raw`].
    fn fields(&self) -> Map;

    /// Per-field masking annotations consulted by the masking converter.
    fn mask_attributes(&self) -> &'static [MaskAttribute] {
        &[]
    }
}

/// Masking strategies that can be named by a field annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskerKind {
    /// Fixed redaction sentinel.
    #[default]
    Replace,
    /// Password-aware sentinels.
    Password,
    /// Partial reveal of long strings.
    String,
    /// Query-parameter masking.
    Url,
}

impl MaskerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MaskerKind::Replace => "replace",
            MaskerKind::Password => "password",
            MaskerKind::String => "string",
            MaskerKind::Url => "url",
        }
    }

    pub fn parse_str(s: &str) -> Option<MaskerKind> {
        match s.to_lowercase().as_str() {
            "replace" | "masking" | "default" => Some(MaskerKind::Replace),
            "password" => Some(MaskerKind::Password),
            "string" => Some(MaskerKind::String),
            "url" => Some(MaskerKind::Url),
            _ => None,
        }
    }
}

impl std::str::FromStr for MaskerKind {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MaskerKind::parse_str(s).ok_or_else(|| {
            LogError::invalid_argument(format!("`{}` does not name a masking processor", s))
        })
    }
}

impl std::fmt::Display for MaskerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Annotation attaching a masking strategy to one public field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskAttribute {
    pub field: &'static str,
    pub masker: MaskerKind,
}

impl MaskAttribute {
    pub const fn new(field: &'static str, masker: MaskerKind) -> Self {
        MaskAttribute { field, masker }
    }

    /// Annotation with the default replacing masker.
    pub const fn replace(field: &'static str) -> Self {
        MaskAttribute::new(field, MaskerKind::Replace)
    }
}

fn date_fields(date: String) -> Map {
    let mut fields = Map::new();
    fields.insert("date", Value::String(date));
    fields
}

impl LogObject for DateTime<Utc> {
    fn type_name(&self) -> Option<&str> {
        Some("DateTime")
    }

    fn fields(&self) -> Map {
        date_fields(self.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
    }
}

impl LogObject for DateTime<FixedOffset> {
    fn type_name(&self) -> Option<&str> {
        Some("DateTime")
    }

    fn fields(&self) -> Map {
        date_fields(self.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
    }
}

impl LogObject for DateTime<Local> {
    fn type_name(&self) -> Option<&str> {
        Some("DateTime")
    }

    fn fields(&self) -> Map {
        date_fields(self.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_masker_kind_parse() {
        assert_eq!("Password".parse::<MaskerKind>().unwrap(), MaskerKind::Password);
        assert_eq!("masking".parse::<MaskerKind>().unwrap(), MaskerKind::Replace);
        assert!(matches!(
            "Reverse".parse::<MaskerKind>(),
            Err(LogError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_datetime_converts_to_atom_date() {
        let date = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let fields = date.fields();
        assert_eq!(
            fields.get_str("date"),
            Some(&Value::from("2025-03-01T12:30:00+00:00"))
        );
        assert_eq!(LogObject::type_name(&date), Some("DateTime"));
    }

    #[test]
    fn test_default_attributes_are_empty() {
        let date = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert!(date.mask_attributes().is_empty());
    }
}
