use std::io::{self, Read, Write};
use std::net::TcpStream;

use bytes::BytesMut;
use tracing::debug;
use uuid::Uuid;

use crate::codec::{self, FrameCodec};
use crate::command::Command;
use crate::config::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_READ_CHUNK_SIZE};
use crate::frame::Frame;
use crate::Error;

/// A blocking byte stream that reads and writes whole frames.
pub struct Connection<S = TcpStream> {
    pub id: Uuid,
    stream: S,
    // Data is read from the socket into the read buffer. When a frame is parsed, the corresponding
    // data is removed from the buffer.
    buffer: BytesMut,
    // Remembers how much of the buffered frame was already checked, so a large reply costs one
    // pass over its bytes however many reads it takes.
    codec: FrameCodec,
    chunk: Vec<u8>,
    max_frame_size: usize,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S) -> Connection<S> {
        Connection::with_limits(stream, DEFAULT_READ_CHUNK_SIZE, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_limits(stream: S, read_chunk_size: usize, max_frame_size: usize) -> Connection<S> {
        Connection {
            id: Uuid::new_v4(),
            stream,
            buffer: BytesMut::with_capacity(read_chunk_size),
            codec: FrameCodec::default(),
            chunk: vec![0; read_chunk_size.max(1)],
            max_frame_size,
        }
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        debug!(connection_id = %self.id, len = bytes.len(), "writing request");
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn write_command(&mut self, command: &Command) -> Result<(), Error> {
        let bytes = codec::encode(command)?;
        // Only the name is logged, arguments may carry credentials.
        if let Some(name) = command.name() {
            debug!(
                connection_id = %self.id,
                command = %String::from_utf8_lossy(name),
                args = command.len() - 1,
                "sending command"
            );
        }
        self.write_all(&bytes)
    }

    /// Reads one frame, blocking until it is complete.
    ///
    /// Returns `Ok(None)` if the peer closed the stream cleanly between frames. A close in the
    /// middle of a frame is a protocol error.
    pub fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buffer)? {
                debug!(connection_id = %self.id, kind = frame.kind(), "received frame");
                return Ok(Some(frame));
            }

            if self.buffer.len() > self.max_frame_size {
                return Err(Error::Protocol("frame size exceeds limit".to_string()));
            }

            let n = match self.stream.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };

            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(Error::Protocol(
                    "connection closed before the reply was complete".to_string(),
                ));
            }

            self.buffer.extend_from_slice(&self.chunk[..n]);
        }
    }

    /// Like [`Connection::read_frame`], but the stream closing is an error: a reply was expected.
    pub fn next_frame(&mut self) -> Result<Frame, Error> {
        self.read_frame()?.ok_or_else(|| {
            Error::Protocol("connection closed before a reply was received".to_string())
        })
    }

    /// Reads one reply, raising a top level error reply as [`Error::Server`].
    pub fn read_reply(&mut self) -> Result<Frame, Error> {
        match self.next_frame()? {
            Frame::Error(msg) => Err(Error::Server(msg)),
            frame => Ok(frame),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}
