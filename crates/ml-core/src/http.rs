//! HTTP request and response normalizers.
//!
//! Registered on a factory with `FactorySetup::push_object_processor`, these
//! processors run before object conversion and replace [`HttpRequest`] and
//! [`HttpResponse`] objects found anywhere in a context with plain object
//! values that masking rules can address: lowercase header names, parsed
//! cookies and a body read under a size limit, decoded when it is JSON.
//!
//! Messages are `http` crate types whose body is a shared [`BodyStream`],
//! so the body can be read for logging without being consumed.

use std::any::Any;
use std::sync::{Arc, Mutex};

use http::header::{CONTENT_TYPE, COOKIE};
use http::HeaderMap;
use ml_common::http::{header_fields, header_text, protocol_version};
use ml_common::{LogError, LogRecord, Map, ObjectValue, Processor, RawObject, Result, Value};
use uuid::Uuid;

/// Default upper bound for a logged body, in bytes.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576;
/// Default read size after the first chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
const FIRST_CHUNK: usize = 8192;
/// Error code reported for a JSON body that fails to decode.
pub const JSON_SYNTAX_ERROR: i64 = 4;

/// A processor that rewrites particular objects before they are converted.
pub trait ObjectProcessor: Processor {
    /// Replacement for `object`, or `None` to leave it alone.
    fn update_object(&self, object: &RawObject) -> Result<Option<Value>>;

    fn update_value(&self, value: Value) -> Result<Value> {
        match value {
            Value::Raw(raw) => Ok(self.update_object(&raw)?.unwrap_or(Value::Raw(raw))),
            Value::Seq(items) => items
                .into_iter()
                .map(|item| self.update_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Seq),
            Value::Map(map) => self.update(map).map(Value::Map),
            other => Ok(other),
        }
    }

    /// Rewrite every matching object in `context`.
    fn update(&self, context: Map) -> Result<Map> {
        context
            .into_iter()
            .map(|(key, value)| Ok((key, self.update_value(value)?)))
            .collect()
    }
}

/// Readable message body with a cursor.
pub trait BodyStream: Send + Sync + std::fmt::Debug {
    fn type_name(&self) -> &str;

    /// Identity of this stream instance.
    fn id(&self) -> String;

    fn size(&self) -> Option<u64>;

    fn is_readable(&self) -> bool;

    fn is_seekable(&self) -> bool;

    fn tell(&self) -> Result<u64>;

    fn seek(&self, position: u64) -> Result<()>;

    fn rewind(&self) -> Result<()> {
        self.seek(0)
    }

    fn eof(&self) -> bool;

    /// Up to `len` bytes from the cursor.
    fn read(&self, len: usize) -> Result<Vec<u8>>;
}

/// In-memory body.
#[derive(Debug)]
pub struct MemoryBody {
    id: Uuid,
    data: Vec<u8>,
    position: Mutex<usize>,
    readable: bool,
    seekable: bool,
}

impl MemoryBody {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        MemoryBody {
            id: Uuid::new_v4(),
            data: content.into(),
            position: Mutex::new(0),
            readable: true,
            seekable: true,
        }
    }

    /// This body as the stream type HTTP messages carry.
    pub fn shared(self) -> Arc<dyn BodyStream> {
        Arc::new(self)
    }

    pub fn unseekable(mut self) -> Self {
        self.seekable = false;
        self
    }

    pub fn unreadable(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn position(&self) -> usize {
        self.position.lock().map(|p| *p).unwrap_or(0)
    }

    fn cursor(&self) -> Result<std::sync::MutexGuard<'_, usize>> {
        self.position
            .lock()
            .map_err(|_| LogError::runtime("body cursor lock poisoned"))
    }
}

impl BodyStream for MemoryBody {
    fn type_name(&self) -> &str {
        "MemoryBody"
    }

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_readable(&self) -> bool {
        self.readable
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn tell(&self) -> Result<u64> {
        Ok(*self.cursor()? as u64)
    }

    fn seek(&self, position: u64) -> Result<()> {
        if !self.seekable {
            return Err(LogError::runtime("stream is not seekable"));
        }
        *self.cursor()? = (position as usize).min(self.data.len());
        Ok(())
    }

    fn eof(&self) -> bool {
        self.position() >= self.data.len()
    }

    fn read(&self, len: usize) -> Result<Vec<u8>> {
        if !self.readable {
            return Err(LogError::runtime("stream is not readable"));
        }
        let mut position = self.cursor()?;
        let end = (*position + len).min(self.data.len());
        let part = self.data[*position..end].to_vec();
        *position = end;
        Ok(part)
    }
}

/// Request normalized by [`HttpRequestProcessor`].
pub type HttpRequest = http::Request<Arc<dyn BodyStream>>;

/// Response normalized by [`HttpResponseProcessor`].
pub type HttpResponse = http::Response<Arc<dyn BodyStream>>;

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONTENT_TYPE)
        .iter()
        .any(|value| header_text(value).to_ascii_lowercase().contains("application/json"))
}

/// Extra data a server-side request carries, attached as a request
/// extension.
#[derive(Debug, Clone, Default)]
pub struct ServerParams {
    pub attributes: Map,
    pub server_params: Map,
    pub uploaded_files: Map,
}

/// Size limits shared by both normalizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BodyLimits {
    max_body_size: usize,
    chunk_size: usize,
}

impl BodyLimits {
    fn new(max_body_size: i64, chunk_size: i64, subject: &str) -> Result<Self> {
        if max_body_size <= 0 {
            return Err(LogError::invalid_argument(format!(
                "The {} body size value cannot be less than or equal to 0",
                subject
            )));
        }
        if chunk_size <= 0 {
            return Err(LogError::invalid_argument(
                "The chunk size value cannot be less than or equal to 0",
            ));
        }
        Ok(BodyLimits {
            max_body_size: max_body_size as usize,
            chunk_size: chunk_size as usize,
        })
    }
}

impl Default for BodyLimits {
    fn default() -> Self {
        BodyLimits {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

fn stream_format(
    stream: &dyn BodyStream,
    content: Option<String>,
    position: Option<u64>,
    error: Option<String>,
) -> Map {
    let mut map = Map::new();
    map.insert("class", stream.type_name());
    map.insert("id", stream.id());
    map.insert("size", stream.size().map(|s| s as i64));
    map.insert("position", position.map(|p| p as i64));
    map.insert("content", content);
    if let Some(error) = error {
        map.insert("error", error);
    }
    map
}

/// Read a body without consuming it: the cursor is restored afterwards.
/// Bodies over `max_size` are reported with an `error` entry instead of
/// content. Unreadable bodies give `None`.
pub fn read_body_safely(stream: &dyn BodyStream, max_size: usize, chunk_size: usize) -> Result<Option<Map>> {
    if !stream.is_readable() {
        return Ok(None);
    }
    let mut position = None;
    if stream.is_seekable() {
        position = stream.tell().ok();
    }
    if let Some(size) = stream.size() {
        if size > max_size as u64 {
            let error = format!(
                "Exceeding the established size of {} for the body. Origin {}",
                max_size, size
            );
            return Ok(Some(stream_format(stream, None, position, Some(error))));
        }
    }
    if stream.is_seekable() && stream.rewind().is_err() {
        position = None;
    }

    let restore = |position: Option<u64>| {
        if let Some(pos) = position {
            if stream.is_seekable() {
                let _ = stream.seek(pos);
            }
        }
    };

    let mut need = max_size + 1;
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = need.min(FIRST_CHUNK);
    while need > 0 && !stream.eof() {
        let part = stream.read(chunk)?;
        if part.is_empty() {
            break;
        }
        need = need.saturating_sub(part.len());
        buf.extend_from_slice(&part);
        if buf.len() > max_size {
            restore(position);
            let error = format!("Exceeding the established size of {} for the body", max_size);
            return Ok(Some(stream_format(stream, None, position, Some(error))));
        }
        chunk = need.min(chunk_size);
    }
    restore(position);

    let content = String::from_utf8_lossy(&buf).into_owned();
    Ok(Some(stream_format(stream, Some(content), position, None)))
}

/// Decode the `content` of a read body when the message is JSON.
pub fn decode_json_body(body: Option<Map>, json: bool) -> Value {
    let Some(mut body) = body else {
        return Value::Null;
    };
    if !json {
        return Value::Map(body);
    }
    let Some(Value::String(content)) = body.get_str("content").cloned() else {
        return Value::Map(body);
    };
    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(decoded) => {
            body.insert("content", Value::from(decoded));
        }
        Err(e) => {
            body.insert("content", Value::Null);
            body.insert("json_error_code", JSON_SYNTAX_ERROR);
            body.insert("json_decode_error", e.to_string());
        }
    }
    Value::Map(body)
}

fn parse_cookie_values(values: &[String]) -> Value {
    let cookies = values.iter().map(|value| {
        if !value.contains(';') {
            return Value::from(value.as_str());
        }
        let items: Vec<&str> = value.split(';').map(str::trim).collect();
        if items.iter().all(|item| item.contains('=')) {
            Value::from(items.into_iter().filter(|item| !item.is_empty()).collect::<Vec<_>>())
        } else {
            Value::from(value.trim())
        }
    });
    Value::Seq(cookies.collect())
}

fn headers_with_cookies(headers: &HeaderMap) -> Map {
    let mut map = header_fields(headers);
    let cookies: Vec<String> = headers.get_all(COOKIE).iter().map(header_text).collect();
    if !cookies.is_empty() {
        map.insert("cookies", parse_cookie_values(&cookies));
    }
    map
}

fn downcast<T: 'static>(object: &RawObject) -> Option<&T> {
    let any: &dyn Any = object.object();
    any.downcast_ref::<T>()
}

/// Normalizes [`HttpRequest`] objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpRequestProcessor {
    limits: BodyLimits,
}

impl HttpRequestProcessor {
    pub const NAME: &'static str = "HttpRequestProcessor";

    pub fn new() -> Self {
        HttpRequestProcessor::default()
    }

    pub fn with_limits(max_body_size: i64, chunk_size: i64) -> Result<Self> {
        Ok(HttpRequestProcessor {
            limits: BodyLimits::new(max_body_size, chunk_size, "request")?,
        })
    }

    pub fn normalize(&self, request: &HttpRequest) -> Result<ObjectValue> {
        let mut fields = Map::new();
        fields.insert("method", request.method().as_str());
        fields.insert("uri", request.uri().to_string());
        fields.insert("protocol_version", protocol_version(request.version()));
        fields.insert("headers", headers_with_cookies(request.headers()));
        let body = read_body_safely(
            request.body().as_ref(),
            self.limits.max_body_size,
            self.limits.chunk_size,
        )?;
        fields.insert("body", decode_json_body(body, is_json(request.headers())));
        if let Some(server) = request.extensions().get::<ServerParams>() {
            fields.insert("attributes", server.attributes.clone());
            fields.insert("server_params", server.server_params.clone());
            fields.insert("uploaded_files", server.uploaded_files.clone());
        }
        Ok(ObjectValue::new("HttpRequest", fields))
    }
}

impl Processor for HttpRequestProcessor {
    fn process(&self, record: LogRecord) -> Result<LogRecord> {
        if record.context.is_empty() {
            return Ok(record);
        }
        let context = self.update(record.context.clone())?;
        Ok(record.with_context(context))
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

impl ObjectProcessor for HttpRequestProcessor {
    fn update_object(&self, object: &RawObject) -> Result<Option<Value>> {
        match downcast::<HttpRequest>(object) {
            Some(request) => Ok(Some(Value::Object(self.normalize(request)?))),
            None => Ok(None),
        }
    }
}

/// Normalizes [`HttpResponse`] objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpResponseProcessor {
    limits: BodyLimits,
}

impl HttpResponseProcessor {
    pub const NAME: &'static str = "HttpResponseProcessor";

    pub fn new() -> Self {
        HttpResponseProcessor::default()
    }

    pub fn with_limits(max_body_size: i64, chunk_size: i64) -> Result<Self> {
        Ok(HttpResponseProcessor {
            limits: BodyLimits::new(max_body_size, chunk_size, "response")?,
        })
    }

    pub fn normalize(&self, response: &HttpResponse) -> Result<ObjectValue> {
        let status = response.status();
        let mut fields = Map::new();
        fields.insert("protocol_version", protocol_version(response.version()));
        fields.insert("status_code", i64::from(status.as_u16()));
        fields.insert("reason_phrase", status.canonical_reason().unwrap_or(""));
        fields.insert("headers", headers_with_cookies(response.headers()));
        let body = read_body_safely(
            response.body().as_ref(),
            self.limits.max_body_size,
            self.limits.chunk_size,
        )?;
        fields.insert("body", decode_json_body(body, is_json(response.headers())));
        Ok(ObjectValue::new("HttpResponse", fields))
    }
}

impl Processor for HttpResponseProcessor {
    fn process(&self, record: LogRecord) -> Result<LogRecord> {
        if record.context.is_empty() {
            return Ok(record);
        }
        let context = self.update(record.context.clone())?;
        Ok(record.with_context(context))
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

impl ObjectProcessor for HttpResponseProcessor {
    fn update_object(&self, object: &RawObject) -> Result<Option<Value>> {
        match downcast::<HttpResponse>(object) {
            Some(response) => Ok(Some(Value::Object(self.normalize(response)?))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_common::{map, Level};

    fn body_of(object: &ObjectValue) -> &Map {
        object.fields.get_str("body").and_then(Value::as_map).unwrap()
    }

    #[test]
    fn test_limits_must_be_positive() {
        let err = HttpRequestProcessor::with_limits(0, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument: The request body size value cannot be less than or equal to 0"
        );
        let err = HttpResponseProcessor::with_limits(10, -1).unwrap_err();
        assert!(matches!(err, LogError::InvalidArgument(_)));
        assert!(HttpResponseProcessor::with_limits(10, 1).is_ok());
    }

    #[test]
    fn test_read_body_restores_cursor() {
        let body = MemoryBody::new("hello world");
        body.seek(6).unwrap();
        let read = read_body_safely(&body, 100, 4).unwrap().unwrap();
        assert_eq!(read.get_str("content"), Some(&Value::from("hello world")));
        assert_eq!(read.get_str("position"), Some(&Value::Int(6)));
        assert_eq!(read.get_str("size"), Some(&Value::Int(11)));
        assert_eq!(body.position(), 6);
    }

    #[test]
    fn test_read_body_over_limit() {
        let body = MemoryBody::new("0123456789");
        let read = read_body_safely(&body, 4, 2).unwrap().unwrap();
        assert_eq!(read.get_str("content"), Some(&Value::Null));
        assert_eq!(
            read.get_str("error"),
            Some(&Value::from("Exceeding the established size of 4 for the body. Origin 10"))
        );
    }

    #[test]
    fn test_unreadable_body_is_null() {
        let body = MemoryBody::new("secret").unreadable();
        assert!(read_body_safely(&body, 100, 10).unwrap().is_none());
        assert_eq!(decode_json_body(None, true), Value::Null);
    }

    #[test]
    fn test_decode_json_body() {
        let ok = map! { "content" => "{\"token\":\"abc\"}" };
        let decoded = decode_json_body(Some(ok), true);
        assert_eq!(
            decoded.get("content").and_then(|c| c.get("token")),
            Some(&Value::from("abc"))
        );

        let bad = decode_json_body(Some(map! { "content" => "{oops" }), true);
        assert_eq!(bad.get("content"), Some(&Value::Null));
        assert_eq!(bad.get("json_error_code"), Some(&Value::Int(4)));
        assert!(bad.get("json_decode_error").is_some());

        let plain = decode_json_body(Some(map! { "content" => "{oops" }), false);
        assert_eq!(plain.get("content"), Some(&Value::from("{oops")));
    }

    #[test]
    fn test_cookie_parsing() {
        let parsed = parse_cookie_values(&[
            "a=1; b=2".to_string(),
            "plain".to_string(),
            "a=1; flag".to_string(),
        ]);
        assert_eq!(
            parsed,
            Value::Seq(vec![
                Value::from(vec!["a=1", "b=2"]),
                Value::from("plain"),
                Value::from("a=1; flag"),
            ])
        );
    }

    #[test]
    fn test_request_normalized_field_order() {
        let request: HttpRequest = http::Request::builder()
            .method("POST")
            .uri("https://api.test/login")
            .header("Content-Type", "application/json")
            .header("Cookie", "sid=1; theme=dark")
            .extension(ServerParams::default())
            .body(MemoryBody::new(r#"{"password":"hunter22"}"#).shared())
            .unwrap();
        let object = HttpRequestProcessor::new().normalize(&request).unwrap();
        let keys: Vec<String> = object.fields.keys().map(|k| k.to_string()).collect();
        assert_eq!(
            keys,
            [
                "method",
                "uri",
                "protocol_version",
                "headers",
                "body",
                "attributes",
                "server_params",
                "uploaded_files"
            ]
        );
        let headers = object.fields.get_str("headers").unwrap();
        assert!(headers.get("content-type").is_some());
        assert!(headers.get("cookies").is_some());
        let content = body_of(&object).get_str("content").unwrap();
        assert_eq!(content.get("password"), Some(&Value::from("hunter22")));
    }

    #[test]
    fn test_processor_replaces_nested_objects() {
        let response: HttpResponse = http::Response::builder()
            .status(404)
            .header("X-Trace", "t1")
            .body(MemoryBody::new("").shared())
            .unwrap();
        let context = map! {
            "nested" => map! { "response" => Value::object(response) },
            "count" => 1,
        };
        let record = LogRecord::new("app", Level::Info, "m", context);
        let out = HttpResponseProcessor::new().process(record).unwrap();
        let converted = out
            .context
            .get_str("nested")
            .and_then(|n| n.get("response"))
            .and_then(Value::as_object)
            .unwrap();
        assert_eq!(converted.display_name(), "HttpResponse");
        assert_eq!(converted.fields.get_str("status_code"), Some(&Value::Int(404)));
        assert_eq!(out.context.get_str("count"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_request_processor_ignores_other_objects() {
        let response: HttpResponse = http::Response::new(MemoryBody::new("").shared());
        let response = Value::object(response);
        let updated = HttpRequestProcessor::new().update_value(response.clone()).unwrap();
        assert_eq!(updated, response);
    }

    #[test]
    fn test_request_without_server_params() {
        let request: HttpRequest = http::Request::builder()
            .uri("/health")
            .header("X-Trace", "a")
            .header("X-Trace", "b")
            .body(MemoryBody::new("").shared())
            .unwrap();
        let object = HttpRequestProcessor::new().normalize(&request).unwrap();
        assert_eq!(object.fields.get_str("method"), Some(&Value::from("GET")));
        assert!(object.fields.get_str("attributes").is_none());
        let headers = object.fields.get_str("headers").unwrap();
        assert_eq!(headers.get("x-trace"), Some(&Value::from(vec!["a", "b"])));
        assert!(headers.get("cookies").is_none());
    }

    #[test]
    fn test_requests_with_other_bodies_are_left_alone() {
        let request = Value::object(http::Request::new("inline body"));
        let updated = HttpRequestProcessor::new().update_value(request.clone()).unwrap();
        assert_eq!(updated, request);
    }
}
