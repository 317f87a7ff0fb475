//! Decoded audio and video frames on their way from a decoder thread to the
//! consumer that plays them.
//!
//! Decoding itself happens in an external library. This crate holds the
//! bounded `FrameQueue` between the decode thread and the consumer, and the
//! `open_stream` boundary that checks a codec before frames start flowing.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

pub mod errors;
pub mod queue;
pub mod stream;

pub use self::errors::StreamError;
pub use self::queue::{Frame, FrameQueue};
pub use self::stream::{open_stream, Codec, Decoder, MediaKind, Stream};

pub mod prelude {
    pub use super::{open_stream, Codec, Decoder, Frame, FrameQueue, MediaKind, Stream, StreamError};
}
