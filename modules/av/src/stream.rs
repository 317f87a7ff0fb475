use std::fmt;
use std::sync::Arc;

use crate::errors::StreamError;
use crate::queue::{Frame, FrameQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Describes the encoded stream a decoder is opened for.
#[derive(Debug, Clone, PartialEq)]
pub struct Codec {
    pub name: String,
    pub kind: MediaKind,
    /// Samples per second of audio streams.
    pub sample_rate: u32,
    pub channels: u16,
    /// Frame size of video streams.
    pub dimensions: (u32, u32),
}

impl Codec {
    pub fn audio<T: Into<String>>(name: T, sample_rate: u32, channels: u16) -> Self {
        Codec {
            name: name.into(),
            kind: MediaKind::Audio,
            sample_rate,
            channels,
            dimensions: (0, 0),
        }
    }

    pub fn video<T: Into<String>>(name: T, width: u32, height: u32) -> Self {
        Codec {
            name: name.into(),
            kind: MediaKind::Video,
            sample_rate: 0,
            channels: 0,
            dimensions: (width, height),
        }
    }

    /// Codecs that decoders are known to exist for.
    pub fn is_supported(&self) -> bool {
        let names: &[&str] = match self.kind {
            MediaKind::Audio => &["pcm", "vorbis", "mp3", "aac", "flac", "opus"],
            MediaKind::Video => &["h264", "hevc", "vp8", "vp9", "theora", "mpeg4"],
        };

        names.contains(&self.name.as_str())
    }

    fn check_parameters(&self) -> ::std::result::Result<(), String> {
        match self.kind {
            MediaKind::Audio if self.sample_rate == 0 => Err("sample rate is zero".into()),
            MediaKind::Audio if self.channels == 0 => Err("no channels".into()),
            MediaKind::Video if self.dimensions.0 == 0 || self.dimensions.1 == 0 => Err(format!(
                "empty frame size {}x{}",
                self.dimensions.0, self.dimensions.1
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({:?})", self.name, self.kind)
    }
}

/// Turns packets into frames. Implemented on top of the external decoding
/// library.
pub trait Decoder<F: Frame>: Send {
    /// Decodes one packet. Returns `None` if the packet did not complete a
    /// frame.
    fn decode(&mut self, packet: &[u8]) -> ::std::result::Result<Option<F>, String>;
}

/// An opened stream feeding decoded frames into a shared queue.
pub struct Stream<F: Frame> {
    codec: Codec,
    decoder: Box<dyn Decoder<F>>,
    queue: Arc<FrameQueue<F>>,
}

/// Checks `codec` and opens a stream decoding with `decoder`.
pub fn open_stream<F: Frame>(
    codec: Codec,
    decoder: Box<dyn Decoder<F>>,
    queue: Arc<FrameQueue<F>>,
) -> ::std::result::Result<Stream<F>, StreamError> {
    if !codec.is_supported() {
        warn!("Unsupported codec {}.", codec);
        return Err(StreamError::UnsupportedCodec(codec.name.clone()));
    }

    if let Err(reason) = codec.check_parameters() {
        return Err(StreamError::CodecOpen {
            codec: codec.name.clone(),
            reason,
        });
    }

    info!("Opened {} stream.", codec);
    Ok(Stream {
        codec,
        decoder,
        queue,
    })
}

impl<F: Frame> Stream<F> {
    #[inline]
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    #[inline]
    pub fn queue(&self) -> &Arc<FrameQueue<F>> {
        &self.queue
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.queue.is_active()
    }

    /// Stops the stream. Blocked and later pushes return immediately.
    pub fn set_inactive(&self) {
        self.queue.set_inactive();
    }

    /// Decodes `packet` and queues the frame it completes. Blocks while the
    /// queue is full.
    pub fn push_packet(&mut self, packet: &[u8]) -> ::std::result::Result<bool, StreamError> {
        if !self.queue.is_active() {
            return Err(StreamError::Inactive);
        }

        match self.decoder.decode(packet).map_err(StreamError::Decode)? {
            Some(frame) => {
                self.queue.push(frame);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Samples(Vec<u8>);

    impl Frame for Samples {
        fn size(&self) -> usize {
            self.0.len()
        }
    }

    struct Passthrough;

    impl Decoder<Samples> for Passthrough {
        fn decode(&mut self, packet: &[u8]) -> ::std::result::Result<Option<Samples>, String> {
            if packet.is_empty() {
                return Ok(None);
            }

            if packet[0] == 0xff {
                return Err("corrupt packet".into());
            }

            Ok(Some(Samples(packet.to_vec())))
        }
    }

    fn queue() -> Arc<FrameQueue<Samples>> {
        Arc::new(FrameQueue::new(1 << 16, 4))
    }

    #[test]
    fn open() {
        let err = open_stream(Codec::audio("wma", 44100, 2), Box::new(Passthrough), queue());
        assert_eq!(err.err(), Some(StreamError::UnsupportedCodec("wma".into())));

        let err = open_stream(Codec::video("h264", 0, 720), Box::new(Passthrough), queue());
        match err {
            Err(StreamError::CodecOpen { codec, .. }) => assert_eq!(codec, "h264"),
            _ => panic!("opened a video stream without a frame size"),
        }

        assert!(open_stream(Codec::audio("vorbis", 44100, 2), Box::new(Passthrough), queue()).is_ok());
    }

    #[test]
    fn packets() {
        let queue = queue();
        let mut stream =
            open_stream(Codec::audio("pcm", 48000, 1), Box::new(Passthrough), queue.clone()).unwrap();

        assert_eq!(stream.push_packet(&[1, 2, 3]), Ok(true));
        assert_eq!(stream.push_packet(&[]), Ok(false));
        assert!(stream.push_packet(&[0xff]).is_err());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.cached_bytes(), 3);

        stream.set_inactive();
        assert_eq!(stream.push_packet(&[4]), Err(StreamError::Inactive));
    }
}
