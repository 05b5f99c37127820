use std::io;

use thiserror::Error as ThisError;

use crate::frame;

#[derive(Debug, ThisError)]
pub enum Error {
    /// The server could not be resolved, refused the connection or did not answer in time.
    #[error("connection error; {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("authentication failed; {0}")]
    Auth(String),
    #[error("protocol error; {0}")]
    Protocol(String),
    /// A `-` reply, carrying the server's message verbatim.
    #[error("{0}")]
    Server(String),
    #[error("invalid command; a command requires at least one argument")]
    InvalidCommand,
    #[error("transaction in progress; {queued} command(s) queued, run or discard them first")]
    TransactionInProgress { queued: usize },
    #[error("io error; {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether the error leaves the stream at an unknown position, making the connection unusable.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. } | Error::Protocol(_) | Error::Io(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        let source = match self {
            Error::Connection { source, .. } => source,
            Error::Io(source) => source,
            _ => return false,
        };

        matches!(
            source.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        )
    }
}

impl From<frame::Error> for Error {
    fn from(src: frame::Error) -> Error {
        Error::Protocol(src.to_string())
    }
}
