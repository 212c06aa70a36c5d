//! Client side of the list store's append command.
//!
//! Each delivery is one `RPUSH <key> <payload>` request in RESP framing,
//! followed by a blocking read of the reply. An integer reply is the
//! acknowledgement; anything else invalidates the connection.

use std::{
    io::{self, BufRead, BufReader, Read, Write},
    time::Duration,
};

use thiserror::Error;

use crate::codec::CodecError;

use super::address::{StoreAddress, StoreStream};

/// Largest bulk string the store accepts.
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;
const MAX_REPLY_LINE: u64 = 64 * 1024;

/// Why a delivery attempt failed.
///
/// The emitter retries every variant the same way; the distinction exists
/// for logging and tests.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Connecting, writing, or reading the reply failed.
    #[error("connection fault: {0}")]
    ConnectionFault(#[from] io::Error),
    /// The store answered with an error or an unexpected reply.
    #[error("protocol fault: {0}")]
    ProtocolFault(String),
    /// The record could not be expressed as a store command.
    #[error("encoding fault: {0}")]
    EncodingFault(#[from] CodecError),
}

/// Coarse classification of a [`DeliveryError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    Connection,
    Protocol,
    Encoding,
}

impl DeliveryError {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::ConnectionFault(_) => FaultKind::Connection,
            Self::ProtocolFault(_) => FaultKind::Protocol,
            Self::EncodingFault(_) => FaultKind::Encoding,
        }
    }
}

/// A live link to the store.
pub trait StoreConnection: Send {
    /// Append `payload` to the list named `key` and wait for the store to
    /// acknowledge it.
    fn append(&mut self, key: &str, payload: &[u8]) -> Result<(), DeliveryError>;
}

/// Factory for [`StoreConnection`]s, invoked on startup and after every
/// failure.
pub trait StoreConnector: Send {
    type Connection: StoreConnection;

    fn connect(&mut self) -> Result<Self::Connection, DeliveryError>;

    /// Human-readable target for log lines.
    fn describe(&self) -> String;
}

/// Connector speaking RESP over TCP or a Unix socket.
#[derive(Clone, Debug)]
pub struct RedisConnector {
    address: StoreAddress,
    connect_timeout: Duration,
    io_timeout: Option<Duration>,
}

impl RedisConnector {
    pub fn new(address: StoreAddress, connect_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
            io_timeout: None,
        }
    }

    /// Bound each write and reply read. Unset means the transport decides.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn address(&self) -> &StoreAddress {
        &self.address
    }
}

impl StoreConnector for RedisConnector {
    type Connection = RedisConnection;

    fn connect(&mut self) -> Result<RedisConnection, DeliveryError> {
        let stream = self.address.connect(self.connect_timeout)?;
        stream.set_write_timeout(self.io_timeout)?;
        stream.set_read_timeout(self.io_timeout)?;
        Ok(RedisConnection::new(stream))
    }

    fn describe(&self) -> String {
        self.address.to_string()
    }
}

/// One RESP session. Dropped wholesale on any error.
#[derive(Debug)]
pub struct RedisConnection {
    stream: BufReader<StoreStream>,
    request: Vec<u8>,
}

impl RedisConnection {
    pub fn new(stream: StoreStream) -> Self {
        Self {
            stream: BufReader::new(stream),
            request: Vec::with_capacity(256),
        }
    }
}

impl StoreConnection for RedisConnection {
    fn append(&mut self, key: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        self.request.clear();
        write_command(&mut self.request, &[b"RPUSH", key.as_bytes(), payload])?;
        let stream = self.stream.get_mut();
        stream.write_all(&self.request)?;
        stream.flush()?;
        read_ack(&mut self.stream)
    }
}

/// Serialise a command as a RESP array of bulk strings.
pub fn write_command(buf: &mut Vec<u8>, args: &[&[u8]]) -> Result<(), CodecError> {
    buf.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        if arg.len() > MAX_BULK_LEN {
            return Err(CodecError::FieldTooLarge {
                part: "bulk string",
                len: arg.len(),
            });
        }
        buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
    Ok(())
}

/// Read one reply and accept it only if it is an integer.
pub fn read_ack<R: BufRead>(reader: &mut R) -> Result<(), DeliveryError> {
    let mut line = Vec::new();
    let read = reader.by_ref().take(MAX_REPLY_LINE).read_until(b'\n', &mut line)?;
    if read == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "store closed the connection").into());
    }
    if !line.ends_with(b"\r\n") {
        return Err(DeliveryError::ProtocolFault("unterminated reply line".into()));
    }
    if line.len() < 3 {
        return Err(DeliveryError::ProtocolFault("empty reply line".into()));
    }
    let body = &line[1..line.len() - 2];
    match line[0] {
        b':' => std::str::from_utf8(body)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|_| ())
            .ok_or_else(|| DeliveryError::ProtocolFault("invalid integer reply".into())),
        b'-' => Err(DeliveryError::ProtocolFault(
            String::from_utf8_lossy(body).into_owned(),
        )),
        other => Err(DeliveryError::ProtocolFault(format!(
            "unexpected reply type {:?}",
            char::from(other)
        ))),
    }
}
