//! Frame transports.
//!
//! A transport presents a connection as "read one frame, write one frame".
//! The dispatcher is unaware of whether frames travel as lines on stdio or as
//! SSE events over HTTP.

use std::future::Future;
use std::io;

pub mod sse;
pub mod stdio;

pub use sse::SseServer;
pub use stdio::{LineTransport, stdio};

/// One bidirectional connection carrying JSON-RPC frames.
pub trait Transport: Send {
    /// Wait for the next frame. `Ok(None)` is a clean end of input.
    fn read_frame(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send;

    /// Send one frame. The frame holds no raw newlines.
    fn write_frame(&mut self, frame: &str) -> impl Future<Output = io::Result<()>> + Send;
}
