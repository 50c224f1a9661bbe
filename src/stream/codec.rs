//! NDJSON codec for the child process's output channel.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! misbehaving child emitting an unterminated or enormous line cannot force
//! unbounded memory growth. Used as the codec parameter for
//! [`tokio_util::codec::FramedRead`] over the child's stdout.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum line length accepted by the stream codec: 8 MiB.
///
/// Screenshot-bearing messages can run large; everything past this limit
/// causes [`StreamCodec::decode`] to return [`AppError::Stream`] for that
/// line rather than allocating further.
pub const MAX_LINE_BYTES: usize = 8 * 1_048_576;

/// NDJSON line framer for the child's output stream.
///
/// Each newline-terminated UTF-8 string is one complete wire message. Lines
/// longer than [`MAX_LINE_BYTES`] yield [`AppError::Stream`]`("line too
/// long…")`; the reader treats that as a skippable condition, not a loop
/// failure.
#[derive(Debug)]
pub struct StreamCodec(LinesCodec);

impl StreamCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for StreamCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for StreamCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next newline-terminated line, buffering partial input.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    /// Decode any final unterminated line once the stream reaches EOF.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Stream(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
