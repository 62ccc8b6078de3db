//! HTTP/1.x message handling subsystem.
//!
//! # Data Flow
//! ```text
//! socket bytes
//!     → codec.rs (start line, header lines, `proxy*` filter)
//!     → start_line.rs (verb/path/version or code/reason)
//!     → chunked.rs / content-length (body de-framing)
//!     → message.rs (Message handed to observers)
//!     → codec.rs (serialize in header order, re-frame body)
//!     → socket bytes
//! ```

pub mod chunked;
pub mod codec;
pub mod message;
pub mod start_line;

pub use codec::{read_message, write_message, CodecError};
pub use message::{BodyFraming, Message, MessageKind};
pub use start_line::{RequestLine, StartLine, StatusLine};
