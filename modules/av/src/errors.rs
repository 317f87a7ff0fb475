#[derive(Debug, Clone, PartialEq, Eq, Fail)]
pub enum StreamError {
    #[fail(display = "Codec '{}' is not supported.", _0)]
    UnsupportedCodec(String),
    #[fail(display = "Failed to open codec '{}': {}", codec, reason)]
    CodecOpen { codec: String, reason: String },
    #[fail(display = "Failed to decode packet: {}", _0)]
    Decode(String),
    #[fail(display = "Stream is inactive.")]
    Inactive,
}
