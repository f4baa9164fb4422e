//! Log records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::level::Level;
use crate::map::Map;

/// An immutable log record. Processors return updated copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub datetime: DateTime<Utc>,
    pub channel: String,
    pub level: Level,
    pub message: String,
    pub context: Map,
    pub extra: Map,
}

impl LogRecord {
    pub fn new(
        channel: impl Into<String>,
        level: Level,
        message: impl Into<String>,
        context: Map,
    ) -> Self {
        LogRecord {
            datetime: Utc::now(),
            channel: channel.into(),
            level,
            message: message.into(),
            context,
            extra: Map::new(),
        }
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        LogRecord {
            message: message.into(),
            ..self
        }
    }

    pub fn with_context(self, context: Map) -> Self {
        LogRecord { context, ..self }
    }

    pub fn with_extra(self, extra: Map) -> Self {
        LogRecord { extra, ..self }
    }

    pub fn with_channel(self, channel: impl Into<String>) -> Self {
        LogRecord {
            channel: channel.into(),
            ..self
        }
    }

    /// JSON document in the shape sinks write.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "datetime": self.datetime.to_rfc3339(),
            "channel": self.channel,
            "level": self.level.code(),
            "level_name": self.level.name(),
            "message": self.message,
            "context": self.context,
            "extra": self.extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map;

    #[test]
    fn test_functional_updates_leave_original_untouched() {
        let record = LogRecord::new("app", Level::Info, "hello {name}", map! { "name" => "bob" });
        let updated = record.clone().with_message("hello bob");
        assert_eq!(record.message, "hello {name}");
        assert_eq!(updated.message, "hello bob");
        assert_eq!(updated.context, record.context);
    }

    #[test]
    fn test_to_json_shape() {
        let record = LogRecord::new("app", Level::Warning, "msg", map! { "k" => 1 });
        let json = record.to_json();
        assert_eq!(json["level"], 300);
        assert_eq!(json["level_name"], "WARNING");
        assert_eq!(json["context"]["k"], 1);
        assert_eq!(json["extra"], serde_json::json!({}));
    }
}
