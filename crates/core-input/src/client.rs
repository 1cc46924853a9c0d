//! Blocking line client for the helper socket.
//!
//! One connection, one outstanding request. A send or receive failure closes
//! the connection, reopens it, and retries the request exactly once; a
//! second failure surfaces as "helper not available". Responses that arrive
//! but fail to parse are protocol errors and are never retried.

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use core_proto::{Command, Response};
use tracing::{debug, warn};

use crate::InputError;

struct Connection {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

pub struct HelperClient {
    socket_path: PathBuf,
    connection: Option<Connection>,
}

impl HelperClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            connection: None,
        }
    }

    /// Send one command and read its response line.
    pub fn request(&mut self, command: &Command) -> Result<Response, InputError> {
        let line = command.encode_line();
        let raw = match self.exchange(&line) {
            Ok(raw) => raw,
            Err(first) => {
                // Transport failure: reconnect and retry exactly once.
                debug!(target: "orchestrator.client", error = %first, "retrying_after_transport_error");
                self.disconnect();
                self.exchange(&line).map_err(|second| {
                    warn!(target: "orchestrator.client", error = %second, "helper_unreachable");
                    InputError::HelperUnavailable
                })?
            }
        };
        Ok(Response::parse_line(&raw)?)
    }

    pub fn disconnect(&mut self) {
        self.connection = None;
    }

    fn exchange(&mut self, line: &str) -> io::Result<String> {
        let connection = self.connect_if_needed()?;
        let outcome = Self::write_then_read(connection, line);
        if outcome.is_err() {
            self.connection = None;
        }
        outcome
    }

    fn write_then_read(connection: &mut Connection, line: &str) -> io::Result<String> {
        connection.writer.write_all(line.as_bytes())?;
        let mut response = String::new();
        let n = connection.reader.read_line(&mut response)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "helper closed the connection",
            ));
        }
        Ok(response)
    }

    fn connect_if_needed(&mut self) -> io::Result<&mut Connection> {
        if self.connection.is_none() {
            let stream = UnixStream::connect(&self.socket_path)?;
            let reader = BufReader::new(stream.try_clone()?);
            debug!(
                target: "orchestrator.client",
                socket = %self.socket_path.display(),
                "helper_connected"
            );
            self.connection = Some(Connection {
                reader,
                writer: stream,
            });
        }
        Ok(self.connection.as_mut().expect("connection just created"))
    }
}
