use std::io;
use std::mem;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, instrument, warn};

use crate::codec;
use crate::command::Command;
use crate::config::Config;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::Error;

/// A handle over a single server connection.
///
/// Requests are strictly request-then-response: every operation takes `&mut self` and runs to
/// completion before returning, so a handle is never used by two callers at once. Use one handle
/// per concurrent caller.
pub struct Client {
    config: Config,
    connection: Option<Connection>,
    // Encoded commands waiting for `execute_transaction`.
    pending: Vec<Bytes>,
}

impl Client {
    /// Creates a disconnected handle, the connection is opened on first use.
    pub fn new(config: Config) -> Client {
        Client {
            config,
            connection: None,
            pending: Vec::new(),
        }
    }

    pub fn open(address: impl Into<String>) -> Client {
        Client::new(Config::new(address))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Number of commands queued for the next transaction.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Opens the connection, authenticating when a password is configured. Does nothing when
    /// already connected.
    pub fn connect(&mut self) -> Result<(), Error> {
        let result = self.connection().map(|_| ());
        self.check(result)
    }

    /// Closes the connection. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            info!(connection_id = %connection.id, "disconnecting");
            // The socket is closed on drop anyway, shutting it down just makes it immediate.
            let _ = connection.get_ref().shutdown(Shutdown::Both);
        }
    }

    /// Sends a single command and waits for its reply.
    ///
    /// A top level error reply is returned as [`Error::Server`]. Fails with
    /// [`Error::TransactionInProgress`], without touching the socket, while commands are queued.
    pub fn execute(&mut self, command: Command) -> Result<Frame, Error> {
        if !self.pending.is_empty() {
            return Err(Error::TransactionInProgress {
                queued: self.pending.len(),
            });
        }

        let request = codec::encode(&command)?;

        let result = self.connection().and_then(|connection| {
            connection.write_all(&request)?;
            connection.read_reply()
        });

        self.check(result)
    }

    /// Queues a command for the next transaction. Nothing is sent until
    /// [`Client::execute_transaction`].
    pub fn enqueue(&mut self, command: Command) -> Result<(), Error> {
        let request = codec::encode(&command)?;
        self.pending.push(request);

        debug!(queued = self.pending.len(), "command queued");
        Ok(())
    }

    /// Drops every queued command, returning how many there were.
    pub fn discard(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }

    /// Sends `MULTI`, the queued commands in order and `EXEC` in one write, then reads one reply
    /// per command written.
    ///
    /// The replies come back in the order written: the first one acknowledges `MULTI`, the last
    /// one is the `EXEC` result. Error replies are returned in place. The queue is emptied
    /// whatever the outcome; with an empty queue nothing is sent and no replies are returned.
    #[instrument(skip(self), fields(queued = self.pending.len()))]
    pub fn execute_transaction(&mut self) -> Result<Vec<Frame>, Error> {
        let pending = mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let multi = codec::encode(&Command::new("MULTI"))?;
        let exec = codec::encode(&Command::new("EXEC"))?;
        let replies = pending.len() + 2;

        let size = multi.len() + exec.len() + pending.iter().map(Bytes::len).sum::<usize>();
        let mut request = BytesMut::with_capacity(size);
        request.extend_from_slice(&multi);
        for command in &pending {
            request.extend_from_slice(command);
        }
        request.extend_from_slice(&exec);

        let result = self.connection().and_then(|connection| {
            connection.write_all(&request)?;
            (0..replies)
                .map(|_| connection.next_frame())
                .collect::<Result<Vec<_>, _>>()
        });

        self.check(result)
    }

    fn connection(&mut self) -> Result<&mut Connection, Error> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => open(&self.config)?,
        };
        Ok(self.connection.insert(connection))
    }

    // After an I/O or protocol failure the stream position is unknown, so the connection is
    // dropped and the next call reconnects. I/O failures on the stream, read timeouts included,
    // are reported as connection errors.
    fn check<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(Error::Io(source)) => Error::Connection {
                address: self.config.address.clone(),
                source,
            },
            Err(err) => err,
        };

        if err.is_connection_fatal() {
            if let Some(connection) = self.connection.take() {
                warn!(connection_id = %connection.id, "dropping connection: {}", err);
            }
        }
        Err(err)
    }
}

#[instrument(name = "connect", skip(config), fields(address = %config.address, connection_id))]
fn open(config: &Config) -> Result<Connection, Error> {
    let stream = open_stream(config)?;
    let mut connection =
        Connection::with_limits(stream, config.read_chunk_size, config.max_frame_size);

    tracing::Span::current().record("connection_id", connection.id.to_string());

    if let Some(password) = &config.password {
        authenticate(&mut connection, config.username.as_deref(), password)?;
    }

    info!("connected");
    Ok(connection)
}

fn open_stream(config: &Config) -> Result<TcpStream, Error> {
    let connection_error = |source: io::Error| Error::Connection {
        address: config.address.clone(),
        source,
    };

    let addrs = config
        .address
        .to_socket_addrs()
        .map_err(connection_error)?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, config.connect_timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(config.timeout)
                    .map_err(connection_error)?;
                stream
                    .set_write_timeout(config.timeout)
                    .map_err(connection_error)?;
                stream.set_nodelay(true).map_err(connection_error)?;
                return Ok(stream);
            }
            Err(err) => {
                debug!(%addr, "connect failed: {}", err);
                last_err = Some(err);
            }
        }
    }

    let err = last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing")
    });
    Err(connection_error(err))
}

fn authenticate(
    connection: &mut Connection,
    username: Option<&str>,
    password: &str,
) -> Result<(), Error> {
    let mut auth = Command::new("AUTH");
    if let Some(username) = username {
        auth.push(username);
    }
    auth.push(password);

    connection.write_command(&auth)?;

    match connection.read_reply() {
        Ok(frame) if frame.is_ok() => Ok(()),
        Ok(frame) => Err(Error::Auth(format!("expected OK, got {}", frame.kind()))),
        Err(Error::Server(msg)) => Err(Error::Auth(msg)),
        Err(err) => Err(err),
    }
}
