//! HTTP transport adaptation
//!
//! The two delivery transports built on the channel abstraction: the
//! persistent chunked-streaming response and the single-shot long-poll
//! (JSONP) reply, plus the 4096-byte chunk padding both the preamble
//! and every streamed message go through. HTTP parsing, keep-alive and
//! chunked framing themselves are hyper's job.

pub mod body;
pub(crate) mod handler;
pub mod padding;

pub use body::StreamingBody;
pub use handler::PUBLISH_KEY_HEADER;
