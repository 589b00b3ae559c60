pub mod client;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod reader;

pub use client::{ByteStream, ChatTransport, HttpTransport};
pub use dispatcher::{DispatchOutcome, EventDispatcher, StreamHandler};
pub use error::{EventParseError, StreamError};
pub use event::{parse_event, StreamEvent};
pub use reader::{LineReader, DEFAULT_MAX_LINE_BYTES};
