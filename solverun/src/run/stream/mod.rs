//! Push channel: framing, envelope decoding, transports and the subscriber.
//!
//! ```text
//! PushTransport ──► FrameStream ──► decode_frame ──► PushHandlers
//!  (HttpEventStream,   (Frame)        (StreamEvent)    (snapshot, final, ...)
//!   test transports)
//! ```

mod envelope;
mod frame;
mod subscriber;
mod transport;

pub use envelope::decode_frame;
pub use frame::{Frame, SseFrameDecoder};
pub use subscriber::{ChannelStatus, CloseHandle, PushHandlers, PushSubscriber};
pub use transport::{decode_byte_stream, FrameStream, HttpEventStream, PushTransport};

#[cfg(test)]
pub(crate) use subscriber::tests as test_support;
