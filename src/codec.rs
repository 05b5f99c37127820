use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

use crate::command::Command;
use crate::frame::{self, Frame, Scanned, MAX_DEPTH};
use crate::Error;

/// Encodes a command as an array of bulk strings: `*<N>\r\n` then `$<len>\r\n<arg>\r\n` per
/// argument.
pub fn encode(command: &Command) -> Result<Bytes, Error> {
    if command.is_empty() {
        return Err(Error::InvalidCommand);
    }

    let frame = command.clone().into_frame();
    Ok(Bytes::from(frame.serialize()))
}

/// Decodes one frame from the front of `src`.
///
/// Returns `Ok(None)` when `src` does not hold a whole frame yet, leaving it untouched so the
/// caller can read more bytes and try again. On success the frame's bytes are removed from `src`.
/// Every call starts over, [`FrameCodec`] keeps its progress between calls instead.
pub fn decode(src: &mut BytesMut) -> Result<Option<Frame>, frame::Error> {
    FrameCodec::default().decode(src)
}

/// Incremental frame decoder for a buffer that grows between calls.
///
/// Completeness is checked by scanning, which never allocates and resumes where the previous
/// call stopped, so a reply split over many reads is walked once. The frame is only built once
/// all of its bytes are buffered.
#[derive(Debug, Default)]
pub struct FrameCodec {
    // Bytes at the front of the buffer holding whole elements of the frame being read.
    scanned: usize,
    // Elements still missing from each array the scan is inside of, innermost last.
    open: Vec<usize>,
}

impl FrameCodec {
    /// Same contract as [`decode`]. The buffer must only be appended to between calls that
    /// return `Ok(None)`.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, frame::Error> {
        match self.scan(&src[..]) {
            Ok(()) => {}
            // Not enough data to parse a frame, the progress so far is kept for the next call.
            Err(frame::Error::Incomplete) => return Ok(None),
            Err(err) => {
                self.reset();
                return Err(err);
            }
        }

        let mut cursor = Cursor::new(&src[..]);
        let frame = Frame::parse(&mut cursor);
        // The cursor never moves past the end of the buffer it borrows.
        let position = cursor.position() as usize;
        self.reset();

        let frame = frame?;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }

    /// Scans from where the last call stopped. `Ok` once a whole frame is buffered.
    fn scan(&mut self, src: &[u8]) -> Result<(), frame::Error> {
        let mut cursor = Cursor::new(src);
        cursor.set_position(self.scanned as u64);

        loop {
            let scanned = frame::scan(&mut cursor)?;
            self.scanned = cursor.position() as usize;

            match scanned {
                Scanned::Array(length) => {
                    // Its elements would sit deeper than the parser accepts.
                    if self.open.len() >= MAX_DEPTH {
                        return Err(frame::Error::TooDeep);
                    }
                    self.open.push(length);
                }
                Scanned::Value => loop {
                    // A finished value may finish its enclosing arrays too.
                    let Some(remaining) = self.open.last_mut() else {
                        return Ok(());
                    };
                    *remaining -= 1;
                    if *remaining > 0 {
                        break;
                    }
                    self.open.pop();
                },
            }
        }
    }

    fn reset(&mut self) {
        self.scanned = 0;
        self.open.clear();
    }
}
