//! HTTP messages as log objects.
//!
//! Requests and responses from the `http` crate can be placed in a context
//! directly. Plain conversion exposes the request line or status line and
//! the headers; reading the body is left to the normalizers in `ml-core`.

use std::fmt::Debug;

use http::{HeaderMap, HeaderValue, Request, Response, Version};

use crate::map::Map;
use crate::object::LogObject;
use crate::value::Value;

/// Header value as text. Bytes that are not UTF-8 are replaced.
pub fn header_text(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}

/// Headers keyed by lowercase name, each holding every value sent under it.
pub fn header_fields(headers: &HeaderMap) -> Map {
    let mut map = Map::new();
    for name in headers.keys() {
        let values: Vec<String> = headers.get_all(name).iter().map(header_text).collect();
        map.insert(name.as_str(), Value::from(values));
    }
    map
}

/// Protocol version without the `HTTP/` prefix.
pub fn protocol_version(version: Version) -> &'static str {
    if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_2 {
        "2"
    } else if version == Version::HTTP_3 {
        "3"
    } else {
        "1.1"
    }
}

impl<B: Debug + Send + Sync + 'static> LogObject for Request<B> {
    fn type_name(&self) -> Option<&str> {
        Some("HttpRequest")
    }

    fn fields(&self) -> Map {
        let mut fields = Map::new();
        fields.insert("method", self.method().as_str());
        fields.insert("uri", self.uri().to_string());
        fields.insert("protocol_version", protocol_version(self.version()));
        fields.insert("headers", header_fields(self.headers()));
        fields
    }
}

impl<B: Debug + Send + Sync + 'static> LogObject for Response<B> {
    fn type_name(&self) -> Option<&str> {
        Some("HttpResponse")
    }

    fn fields(&self) -> Map {
        let status = self.status();
        let mut fields = Map::new();
        fields.insert("protocol_version", protocol_version(self.version()));
        fields.insert("status_code", i64::from(status.as_u16()));
        fields.insert("reason_phrase", status.canonical_reason().unwrap_or(""));
        fields.insert("headers", header_fields(self.headers()));
        fields
    }
}
