use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Result;

pub struct Connection {
    pub id: Uuid,
    stream: BufWriter<TcpStream>,
    // Data is read from the socket into the read buffer. When a frame is parsed, the corresponding
    // data is removed from the buffer.
    buffer: BytesMut,
    // Replies are encoded here before being written to the socket.
    out: BytesMut,
    codec: FrameCodec,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Self::with_codec(stream, FrameCodec::default())
    }

    pub fn with_codec(stream: TcpStream, codec: FrameCodec) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            stream: BufWriter::new(stream),
            // Allocate the buffer with 4kb of capacity.
            buffer: BytesMut::with_capacity(4096),
            out: BytesMut::with_capacity(4096),
            codec,
        }
    }

    /// Reads the next frame, waiting for more data while the buffered bytes hold only part of one.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection cleanly. A protocol error leaves
    /// the connection usable: the offending bytes are discarded and the next call reads afresh.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buffer)? {
                return Ok(Some(frame));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                }

                // The peer went away in the middle of sending a frame.
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )
                .into());
            }
        }
    }

    /// Writes the whole frame to the socket before returning.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<()> {
        self.codec.encode(frame, &mut self.out)?;

        let written = self.stream.write_all(&self.out).await;
        self.out.clear();
        written?;

        self.stream.flush().await?;
        Ok(())
    }
}
