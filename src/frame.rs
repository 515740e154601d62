// https://redis.io/docs/reference/protocol-spec

use std::fmt;
use std::io::Cursor;
use std::str;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Arrays deeper than this are rejected instead of recursing further.
const MAX_NESTING: usize = 512;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    #[error("invalid length prefix")]
    InvalidLength,
    #[error("invalid integer")]
    InvalidInteger,
    #[error("invalid UTF-8 string")]
    InvalidUtf8,
    #[error("bulk string is not terminated by CRLF")]
    MissingTerminator,
    #[error("arrays are nested deeper than {} levels", MAX_NESTING)]
    NestingTooDeep,
    #[error("frame exceeds the maximum size of {0} bytes")]
    FrameTooLarge(usize),
}

/// A single RESP value. Both the null bulk string (`$-1`) and the null array (`*-1`) are
/// represented by `Null`, which is always written back as a null bulk string.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    /// Parses one frame starting at the cursor position, leaving the cursor right after it.
    ///
    /// Returns `Error::Incomplete` when the buffer ends before the frame does; every other error
    /// means the input can never become a valid frame.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        parse_nested(src, 0)
    }

    /// Appends the wire representation of the frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(DataType::SimpleString.into());
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Error(s) => {
                dst.put_u8(DataType::SimpleError.into());
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Integer(i) => {
                dst.put_u8(DataType::Integer.into());
                dst.put_slice(i.to_string().as_bytes());
                dst.put_slice(CRLF);
            }
            // $<length>\r\n<data>\r\n
            Frame::Bulk(bytes) => {
                dst.put_u8(DataType::BulkString.into());
                dst.put_slice(bytes.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                dst.put_slice(bytes);
                dst.put_slice(CRLF);
            }
            Frame::Null => dst.put_slice(b"$-1\r\n"),
            // *<number-of-elements>\r\n<element-1>...<element-n>
            Frame::Array(frames) => {
                dst.put_u8(DataType::Array.into());
                dst.put_slice(frames.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                for frame in frames {
                    frame.encode(dst);
                }
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = BytesMut::new();
        self.encode(&mut bytes);
        bytes.to_vec()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
        }
    }
}

fn parse_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Frame, Error> {
    if depth > MAX_NESTING {
        return Err(Error::NestingTooDeep);
    }

    // The first byte in an RESP-serialized payload always identifies its type.
    // Subsequent bytes constitute the type's contents.
    let first_byte = get_byte(src)?;
    let data_type = DataType::try_from(first_byte)?;

    match data_type {
        DataType::SimpleString => get_line_string(src).map(Frame::Simple),
        DataType::SimpleError => get_line_string(src).map(Frame::Error),
        DataType::Integer => get_integer(src).map(Frame::Integer),
        DataType::BulkString => {
            let length = match get_length(src)? {
                Some(length) => length,
                None => return Ok(Frame::Null),
            };

            if src.remaining() < length.saturating_add(CRLF.len()) {
                return Err(Error::Incomplete);
            }

            let data = src.copy_to_bytes(length);
            if &src.chunk()[..CRLF.len()] != CRLF {
                return Err(Error::MissingTerminator);
            }
            src.advance(CRLF.len());

            Ok(Frame::Bulk(data))
        }
        DataType::Array => {
            let length = match get_length(src)? {
                Some(length) => length,
                None => return Ok(Frame::Null),
            };

            // The smallest element (`+\r\n`) takes three bytes, so a count larger than that
            // cannot be backed by the buffer yet and must not drive the allocation.
            let mut frames = Vec::with_capacity(length.min(src.remaining() / 3));
            for _ in 0..length {
                frames.push(parse_nested(src, depth + 1)?);
            }

            Ok(Frame::Array(frames))
        }
    }
}

/// Returns the bytes up to the next CRLF and moves the cursor past it.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_line_string(src: &mut Cursor<&[u8]>) -> Result<String, Error> {
    let line = get_line(src)?;
    str::from_utf8(line)
        .map(|s| s.to_string())
        .map_err(|_| Error::InvalidUtf8)
}

fn get_integer(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let line = get_line(src)?;
    str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(Error::InvalidInteger)
}

/// Reads a length prefix. `-1` is the null marker and yields `None`.
fn get_length(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, Error> {
    let length = get_integer(src).map_err(|err| match err {
        Error::InvalidInteger => Error::InvalidLength,
        err => err,
    })?;

    match length {
        -1 => Ok(None),
        length => usize::try_from(length)
            .map(Some)
            .map_err(|_| Error::InvalidLength),
    }
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}
