// https://redis.io/docs/reference/protocol-spec

use std::fmt;
use std::io::Cursor;
use std::str;
use std::string::FromUtf8Error;

use bytes::{Buf, Bytes};
use itertools::Itertools;
use strum_macros::IntoStaticStr;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Deepest array nesting accepted in a single reply.
pub const MAX_DEPTH: usize = 512;

/// Largest bulk string accepted, the server side default of `proto-max-bulk-len`.
pub const MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {:?}", as_char(.0))]
    InvalidDataType(u8),
    #[error("invalid length prefix: {0}")]
    InvalidLength(String),
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    #[error("bulk string is not terminated by CRLF")]
    MissingTerminator,
    #[error("frame nesting exceeds the maximum depth")]
    TooDeep,
    #[error("invalid frame format; {0}")]
    InvalidUtf8(#[from] FromUtf8Error),
}

/// A single RESP2 reply.
///
/// Bulk strings and arrays each have their own null variant, so `$-1` and `$0` (or `*-1` and
/// `*0`) never collapse into the same value.
#[derive(Clone, Debug, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    NullBulk,
    Array(Vec<Frame>),
    NullArray,
}

impl Frame {
    /// Parses one frame starting at the cursor position. On success the cursor is left right
    /// after the frame; on [`Error::Incomplete`] its position is meaningless and the caller should
    /// retry from the start once more data arrived.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        Self::parse_nested(src, 0)
    }

    fn parse_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Self, Error> {
        if depth > MAX_DEPTH {
            return Err(Error::TooDeep);
        }

        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => {
                let line = get_line(src)?.to_vec();
                let string = String::from_utf8(line)?;
                Ok(Frame::Simple(string.trim().to_string()))
            }
            DataType::SimpleError => {
                let line = get_line(src)?.to_vec();
                Ok(Frame::Error(String::from_utf8(line)?))
            }
            DataType::Integer => {
                let line = get_line(src)?;
                Ok(Frame::Integer(parse_integer(line)?))
            }
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = match parse_length(get_line(src)?)? {
                    Some(length) => length,
                    None => return Ok(Frame::NullBulk),
                };

                if length > MAX_BULK_LENGTH {
                    return Err(Error::InvalidLength(length.to_string()));
                }

                // The payload is binary safe, so it is taken by length and never scanned for CRLF.
                if src.remaining() < length + CRLF.len() {
                    return Err(Error::Incomplete);
                }

                let data = Bytes::copy_from_slice(&src.chunk()[..length]);
                src.advance(length);

                if &src.chunk()[..CRLF.len()] != CRLF {
                    return Err(Error::MissingTerminator);
                }
                src.advance(CRLF.len());

                Ok(Frame::Bulk(data))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                let length = match parse_length(get_line(src)?)? {
                    Some(length) => length,
                    None => return Ok(Frame::NullArray),
                };

                // The count comes from the peer, so it is not trusted for the allocation size.
                let mut frames = Vec::with_capacity(length.min(1024));
                for _ in 0..length {
                    frames.push(Self::parse_nested(src, depth + 1)?);
                }

                Ok(Frame::Array(frames))
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }

    fn write_to(&self, bytes: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                bytes.push(u8::from(DataType::SimpleString));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Error(s) => {
                bytes.push(u8::from(DataType::SimpleError));
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Integer(i) => {
                bytes.push(u8::from(DataType::Integer));
                bytes.extend_from_slice(i.to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
            }
            Frame::Bulk(data) => {
                bytes.push(u8::from(DataType::BulkString));
                bytes.extend_from_slice(data.len().to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes.extend_from_slice(data);
                bytes.extend_from_slice(CRLF);
            }
            Frame::NullBulk => {
                bytes.push(u8::from(DataType::BulkString));
                bytes.extend_from_slice(b"-1");
                bytes.extend_from_slice(CRLF);
            }
            Frame::Array(arr) => {
                bytes.push(u8::from(DataType::Array));
                bytes.extend_from_slice(arr.len().to_string().as_bytes());
                bytes.extend_from_slice(CRLF);
                for frame in arr {
                    frame.write_to(bytes);
                }
            }
            Frame::NullArray => {
                bytes.push(u8::from(DataType::Array));
                bytes.extend_from_slice(b"-1");
                bytes.extend_from_slice(CRLF);
            }
        }
    }

    /// Name of the variant, handy for "expected X, got Y" messages.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Frame::Simple(s) if s == "OK")
    }
}

// Renders the way `redis-cli` prints replies.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "{}", s),
            Frame::Error(s) => write!(f, "(error) {}", s),
            Frame::Integer(i) => write!(f, "(integer) {}", i),
            Frame::Bulk(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Frame::NullBulk | Frame::NullArray => write!(f, "(nil)"),
            Frame::Array(arr) if arr.is_empty() => write!(f, "(empty array)"),
            Frame::Array(arr) => {
                let width = arr.len().to_string().len();
                let indent = format!("\n{}", " ".repeat(width + 2));

                for (i, frame) in arr.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    let item = frame.to_string().lines().join(&indent);
                    write!(f, "{:>width$}) {}", i + 1, item, width = width)?;
                }
                Ok(())
            }
        }
    }
}

/// What [`scan`] stepped over.
#[derive(Debug, PartialEq)]
pub(crate) enum Scanned {
    /// A whole frame without children: a scalar, a null, or an empty array.
    Value,
    /// The header of an array holding that many (at least one) frames.
    Array(usize),
}

/// Steps over one scalar frame, or only the header of an array, without allocating.
///
/// Running this until every opened array is closed tells whether a whole frame is buffered,
/// without building it.
pub(crate) fn scan(src: &mut Cursor<&[u8]>) -> Result<Scanned, Error> {
    let data_type = DataType::try_from(get_byte(src)?)?;

    match data_type {
        DataType::SimpleString | DataType::SimpleError => {
            get_line(src)?;
            Ok(Scanned::Value)
        }
        DataType::Integer => {
            parse_integer(get_line(src)?)?;
            Ok(Scanned::Value)
        }
        DataType::BulkString => {
            let length = match parse_length(get_line(src)?)? {
                Some(length) => length,
                None => return Ok(Scanned::Value),
            };

            if length > MAX_BULK_LENGTH {
                return Err(Error::InvalidLength(length.to_string()));
            }
            if src.remaining() < length + CRLF.len() {
                return Err(Error::Incomplete);
            }
            src.advance(length);

            if &src.chunk()[..CRLF.len()] != CRLF {
                return Err(Error::MissingTerminator);
            }
            src.advance(CRLF.len());

            Ok(Scanned::Value)
        }
        DataType::Array => match parse_length(get_line(src)?)? {
            None | Some(0) => Ok(Scanned::Value),
            Some(length) => Ok(Scanned::Array(length)),
        },
    }
}

fn as_char(byte: &u8) -> char {
    char::from(*byte)
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let end = src.get_ref().len();

    let line_end = src.get_ref()[start..end]
        .windows(2)
        .position(|window| window == CRLF)
        .ok_or(Error::Incomplete)
        .map(|index| start + index)?;

    src.set_position((line_end + CRLF.len()) as u64);

    Ok(&src.get_ref()[start..line_end])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

fn parse_integer(line: &[u8]) -> Result<i64, Error> {
    str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Error::InvalidInteger(String::from_utf8_lossy(line).into_owned()))
}

/// `None` stands for the `-1` null length.
fn parse_length(line: &[u8]) -> Result<Option<usize>, Error> {
    let invalid = || Error::InvalidLength(String::from_utf8_lossy(line).into_owned());

    match parse_integer(line).map_err(|_| invalid())? {
        -1 => Ok(None),
        length => usize::try_from(length).map(Some).map_err(|_| invalid()),
    }
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
