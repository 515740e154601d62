use bytes::{Buf, BytesMut};
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame};
use crate::Error;

/// Splits a byte stream into frames and writes frames back as bytes.
///
/// A partially received frame stays in the buffer until the rest arrives. Input that can never
/// become a frame is dropped together with everything else buffered behind it, so the next
/// decode starts from whatever the client sends afterwards.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&src[..]);
        match Frame::parse(&mut cursor) {
            Ok(frame) => {
                let position = cursor.position() as usize;

                // Remove the parsed frame from the buffer.
                src.advance(position);

                Ok(Some(frame))
            }
            // Check if the frame size exceeds a certain limit to prevent DoS attacks.
            Err(frame::Error::Incomplete) if src.len() > self.max_frame_size => {
                src.clear();
                Err(frame::Error::FrameTooLarge(self.max_frame_size).into())
            }
            // Not enough data to parse a frame.
            Err(frame::Error::Incomplete) => Ok(None),
            Err(err) => {
                src.clear();
                Err(err.into())
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}
