//! Store addressing and the raw stream transport beneath it.

use std::{
    fmt,
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Port used when a host address carries none.
pub const DEFAULT_STORE_PORT: u16 = 6379;

/// Where the store listens.
///
/// Anything containing a `/` is a Unix socket path; everything else is a
/// host with an optional `:port`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreAddress {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

/// The address string could not be classified.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("store address is empty")]
    Empty,
    #[error("invalid port in store address {0:?}")]
    InvalidPort(String),
}

impl StoreAddress {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AddressError::Empty);
        }
        if raw.contains('/') {
            return Ok(Self::Unix(PathBuf::from(raw)));
        }
        let (host, port) = split_host_port(raw)?;
        if host.is_empty() {
            return Err(AddressError::Empty);
        }
        Ok(Self::Tcp {
            host: host.to_owned(),
            port: port.unwrap_or(DEFAULT_STORE_PORT),
        })
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Unix(_))
    }

    /// Open a stream to the store.
    pub fn connect(&self, timeout: Duration) -> io::Result<StoreStream> {
        match self {
            Self::Tcp { host, port } => connect_tcp(host, *port, timeout).map(StoreStream::Tcp),
            Self::Unix(path) => {
                #[cfg(unix)]
                {
                    UnixStream::connect(path).map(StoreStream::Unix)
                }
                #[cfg(not(unix))]
                {
                    let _ = (path, timeout);
                    Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "unix domain sockets are not supported on this platform",
                    ))
                }
            }
        }
    }
}

fn split_host_port(raw: &str) -> Result<(&str, Option<u16>), AddressError> {
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(raw.to_owned()))
    };
    if let Some(rest) = raw.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| AddressError::InvalidPort(raw.to_owned()))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, Some(parse_port(port)?))),
            None if tail.is_empty() => Ok((host, None)),
            None => Err(AddressError::InvalidPort(raw.to_owned())),
        };
    }
    match raw.matches(':').count() {
        0 => Ok((raw, None)),
        1 => {
            let (host, port) = raw.split_once(':').unwrap_or((raw, ""));
            Ok((host, Some(parse_port(port)?)))
        }
        // Bare IPv6 literal.
        _ => Ok((raw, None)),
    }
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
            Self::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

impl std::str::FromStr for StoreAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{host}:{port} resolved to no addresses"),
        )
    }))
}

/// An open byte stream to the store.
#[derive(Debug)]
pub enum StoreStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl StoreStream {
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_write_timeout(timeout),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_write_timeout(timeout),
        }
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_read_timeout(timeout),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_read_timeout(timeout),
        }
    }
}

impl Read for StoreStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for StoreStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("localhost", StoreAddress::Tcp { host: "localhost".into(), port: DEFAULT_STORE_PORT })]
    #[case("10.0.0.5:7000", StoreAddress::Tcp { host: "10.0.0.5".into(), port: 7000 })]
    #[case("[::1]:6380", StoreAddress::Tcp { host: "::1".into(), port: 6380 })]
    #[case("[::1]", StoreAddress::Tcp { host: "::1".into(), port: DEFAULT_STORE_PORT })]
    #[case("fe80::1", StoreAddress::Tcp { host: "fe80::1".into(), port: DEFAULT_STORE_PORT })]
    #[case("/tmp/redis.sock", StoreAddress::Unix(PathBuf::from("/tmp/redis.sock")))]
    #[case("./relative/store.sock", StoreAddress::Unix(PathBuf::from("./relative/store.sock")))]
    #[case("  cache  ", StoreAddress::Tcp { host: "cache".into(), port: DEFAULT_STORE_PORT })]
    fn classifies_addresses(#[case] raw: &str, #[case] expected: StoreAddress) {
        assert_eq!(StoreAddress::parse(raw), Ok(expected));
    }

    #[rstest]
    #[case("", AddressError::Empty)]
    #[case(":6379", AddressError::Empty)]
    #[case("cache:http", AddressError::InvalidPort("cache:http".into()))]
    #[case("cache:70000", AddressError::InvalidPort("cache:70000".into()))]
    #[case("[::1", AddressError::InvalidPort("[::1".into()))]
    fn rejects_malformed_addresses(#[case] raw: &str, #[case] expected: AddressError) {
        assert_eq!(StoreAddress::parse(raw), Err(expected));
    }

    #[rstest]
    #[case("cache", "cache:6379")]
    #[case("[::1]:7000", "[::1]:7000")]
    #[case("/run/store.sock", "/run/store.sock")]
    fn display_round_trips_through_parse(#[case] raw: &str, #[case] shown: &str) {
        let address: StoreAddress = raw.parse().expect("valid address");
        assert_eq!(address.to_string(), shown);
        assert_eq!(shown.parse::<StoreAddress>(), Ok(address));
    }

    #[rstest]
    fn only_socket_paths_are_local() {
        assert!(StoreAddress::Unix("/run/s".into()).is_local());
        assert!(!StoreAddress::parse("cache").expect("valid").is_local());
    }

    #[cfg(unix)]
    #[rstest]
    fn connect_to_missing_socket_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let address = StoreAddress::Unix(dir.path().join("absent.sock"));
        assert!(address.connect(Duration::from_millis(50)).is_err());
    }
}
