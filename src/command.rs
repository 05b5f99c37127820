use std::fmt;
use std::str;

use bytes::Bytes;
use itertools::Itertools;

use crate::frame::Frame;
use crate::Error;

/// An ordered list of arguments, the command name being the first one.
///
/// Commands that take variable shaped input (field/value pairs, multiple keys) are flattened
/// into individual arguments by the caller, the wire framing never nests.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: impl ToArg) -> Command {
        Command {
            args: vec![name.to_arg()],
        }
    }

    pub fn from_args<I>(args: I) -> Command
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        args.into_iter().collect()
    }

    pub fn arg(mut self, arg: impl ToArg) -> Command {
        self.args.push(arg.to_arg());
        self
    }

    pub fn push(&mut self, arg: impl ToArg) {
        self.args.push(arg.to_arg());
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// The command name, as sent.
    pub fn name(&self) -> Option<&[u8]> {
        self.args.first().map(|name| &name[..])
    }

    pub fn into_frame(self) -> Frame {
        Frame::Array(self.args.into_iter().map(Frame::Bulk).collect())
    }
}

impl<T: ToArg> FromIterator<T> for Command {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Command {
            args: iter.into_iter().map(ToArg::to_arg).collect(),
        }
    }
}

// Mostly for logs, binary arguments are rendered lossily.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self
            .args
            .iter()
            .map(|arg| String::from_utf8_lossy(arg))
            .join(" ");
        write!(f, "{}", line)
    }
}

impl TryFrom<Frame> for Command {
    type Error = Error;

    /// Reads a request the way a server does: clients send commands as RESP arrays of strings.
    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(Error::Protocol(format!(
                    "expected array, got {}",
                    frame.kind()
                )))
            }
        };

        let args = frames
            .into_iter()
            .map(|frame| match frame {
                Frame::Bulk(bytes) => Ok(bytes),
                Frame::Simple(s) => Ok(Bytes::from(s)),
                frame => Err(Error::Protocol(format!(
                    "expected simple or bulk string, got {}",
                    frame.kind()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        if args.is_empty() {
            return Err(Error::InvalidCommand);
        }

        Ok(Command { args })
    }
}

/// Conversion of a single command argument into the bytes sent on the wire.
///
/// Integers are sent in their decimal text form, the way the server expects them.
pub trait ToArg {
    fn to_arg(self) -> Bytes;
}

impl ToArg for Bytes {
    fn to_arg(self) -> Bytes {
        self
    }
}

impl ToArg for &Bytes {
    fn to_arg(self) -> Bytes {
        self.clone()
    }
}

impl ToArg for &str {
    fn to_arg(self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(self) -> Bytes {
        Bytes::from(self)
    }
}

impl ToArg for &String {
    fn to_arg(self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for &[u8] {
    fn to_arg(self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl<const N: usize> ToArg for &[u8; N] {
    fn to_arg(self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(self) -> Bytes {
        Bytes::from(self)
    }
}

macro_rules! integer_to_arg {
    ($($ty:ty),*) => {
        $(
            impl ToArg for $ty {
                fn to_arg(self) -> Bytes {
                    Bytes::from(self.to_string())
                }
            }
        )*
    };
}

integer_to_arg!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_with_mixed_arguments() {
        let cmd = Command::new("SET")
            .arg("key")
            .arg(42)
            .arg(Bytes::from("raw"))
            .arg(b"\x00\xff");

        assert_eq!(
            cmd.args(),
            &[
                Bytes::from("SET"),
                Bytes::from("key"),
                Bytes::from("42"),
                Bytes::from("raw"),
                Bytes::from_static(b"\x00\xff"),
            ]
        );
        assert_eq!(cmd.name(), Some(&b"SET"[..]));
        assert_eq!(cmd.len(), 5);
    }

    #[test]
    fn negative_integers_keep_their_sign() {
        let cmd = Command::new("INCRBY").arg("counter").arg(-10i64);

        assert_eq!(cmd.args()[2], Bytes::from("-10"));
    }

    #[test]
    fn collect_from_iterator() {
        let cmd: Command = vec!["HSET", "hash", "field", "value"].into_iter().collect();

        assert_eq!(cmd, Command::from_args(["HSET", "hash", "field", "value"]));
        assert_eq!(cmd.to_string(), "HSET hash field value");
    }

    #[test]
    fn parse_request_frame() {
        let frame = Frame::Array(vec![
            Frame::Simple(String::from("GET")),
            Frame::Bulk(Bytes::from("foo-from-bytes")),
        ]);

        let cmd = Command::try_from(frame).unwrap();

        assert_eq!(cmd, Command::new("GET").arg("foo-from-bytes"));
    }

    #[test]
    fn parse_request_frame_rejects_non_arrays() {
        let err = Command::try_from(Frame::Simple(String::from("GET"))).unwrap_err();

        assert!(matches!(err, Error::Protocol(ref msg) if msg == "expected array, got simple"));
    }

    #[test]
    fn parse_request_frame_rejects_nested_arguments() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("HSET")),
            Frame::Array(vec![Frame::Bulk(Bytes::from("field"))]),
        ]);

        assert!(matches!(Command::try_from(frame), Err(Error::Protocol(_))));
    }

    #[test]
    fn parse_request_frame_rejects_empty_arrays() {
        let err = Command::try_from(Frame::Array(vec![])).unwrap_err();

        assert!(matches!(err, Error::InvalidCommand));
    }
}
