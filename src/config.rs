use std::env;
use std::time::Duration;

use crate::frame::MAX_BULK_LENGTH;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6379";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;
/// Room for the largest bulk string plus its `$<length>\r\n` header and terminator.
pub const DEFAULT_MAX_FRAME_SIZE: usize = MAX_BULK_LENGTH + 64;

/// Settings of a single client connection.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// `host:port`, resolved on every connect.
    pub address: String,
    /// Read and write timeout of the established stream.
    pub timeout: Option<Duration>,
    pub connect_timeout: Duration,
    /// Sent as `AUTH username password` when a password is set as well.
    pub username: Option<String>,
    /// When set, `AUTH` is sent right after connecting.
    pub password: Option<String>,
    /// Upper bound of a single read from the socket.
    pub read_chunk_size: usize,
    /// Upper bound of bytes buffered for a single reply.
    pub max_frame_size: usize,
}

impl Config {
    pub fn new(address: impl Into<String>) -> Config {
        Config {
            address: address.into(),
            ..Config::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Config {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Config {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_auth(mut self, username: Option<String>, password: impl Into<String>) -> Config {
        self.username = username;
        self.password = Some(password.into());
        self
    }

    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Config {
        self.read_chunk_size = read_chunk_size.max(1);
        self
    }

    fn max_frame_size() -> usize {
        env::var("MAX_FRAME_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: DEFAULT_ADDRESS.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            connect_timeout: DEFAULT_TIMEOUT,
            username: None,
            password: None,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_frame_size: Config::max_frame_size(),
        }
    }
}
