//! Shared data model for the masklog pipeline.
//!
//! Every crate in the workspace speaks in terms of these types:
//!
//! - [`Value`], [`Map`] and [`Key`]: the recursive, ordered context tree that
//!   masking processors walk.
//! - [`LogRecord`]: an immutable record flowing through processors into
//!   handlers.
//! - [`Level`]: the eight ordered severities.
//! - [`Processor`] and [`Handler`]: the two capabilities a pipeline is
//!   assembled from.
//! - [`LogObject`]: application objects placed in a context before they are
//!   converted into [`ObjectValue`]s. `http` requests and responses are log
//!   objects out of the box.

pub mod error;
pub mod http;
pub mod key;
pub mod level;
pub mod map;
pub mod object;
pub mod processor;
pub mod record;
pub mod value;

pub use error::{LogError, Result};
pub use key::Key;
pub use level::Level;
pub use map::Map;
pub use object::{LogObject, MaskAttribute, MaskerKind, ANONYMOUS_CLASS};
pub use processor::{FnProcessor, Handler, Processor, SharedHandler, SharedProcessor};
pub use record::LogRecord;
pub use value::{ObjectValue, RawObject, Value};
