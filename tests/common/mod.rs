//! In-process stand-in for the list store, speaking just enough RESP to
//! answer `RPUSH`.

#![allow(dead_code)]

use std::{
    io::{self, BufRead, BufReader, Read, Write},
    net::TcpListener,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

#[cfg(unix)]
use std::os::unix::net::UnixListener;

use lumberjack::{BackoffPolicy, StoreAddress};
use parking_lot::Mutex;

/// Misbehaviour injected by the fake store.
#[derive(Clone, Copy, Debug, Default)]
pub enum Fault {
    #[default]
    None,
    /// Hang up instead of storing every nth command.
    HangUpEvery(u64),
    /// Answer every nth command with an error reply instead of storing it.
    ErrorEvery(u64),
}

#[derive(Default)]
struct Shared {
    received: Mutex<Vec<(String, Vec<u8>)>>,
    commands: AtomicU64,
    connections: AtomicU64,
}

#[derive(Clone)]
pub struct FakeStore {
    address: StoreAddress,
    fault: Fault,
    shared: Arc<Shared>,
}

impl FakeStore {
    pub fn tcp(fault: Fault) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake store");
        let port = listener.local_addr().expect("local addr").port();
        let store = Self {
            address: StoreAddress::Tcp {
                host: "127.0.0.1".into(),
                port,
            },
            fault,
            shared: Arc::default(),
        };
        let accept = store.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let conn = accept.clone();
                thread::spawn(move || conn.serve(stream));
            }
        });
        store
    }

    #[cfg(unix)]
    pub fn unix(path: &Path, fault: Fault) -> Self {
        let listener = UnixListener::bind(path).expect("bind fake store socket");
        let store = Self {
            address: StoreAddress::Unix(path.to_path_buf()),
            fault,
            shared: Arc::default(),
        };
        let accept = store.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let conn = accept.clone();
                thread::spawn(move || conn.serve(stream));
            }
        });
        store
    }

    pub fn address(&self) -> StoreAddress {
        self.address.clone()
    }

    pub fn received(&self) -> Vec<(String, Vec<u8>)> {
        self.shared.received.lock().clone()
    }

    pub fn connections(&self) -> u64 {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Poll until `count` records are stored or `timeout` elapses.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<(String, Vec<u8>)> {
        let deadline = Instant::now() + timeout;
        loop {
            let received = self.received();
            if received.len() >= count || Instant::now() >= deadline {
                return received;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn serve<S: Read + Write>(self, stream: S) {
        self.shared.connections.fetch_add(1, Ordering::SeqCst);
        let mut reader = BufReader::new(stream);
        while let Ok(Some(args)) = read_command(&mut reader) {
            let n = self.shared.commands.fetch_add(1, Ordering::SeqCst) + 1;
            let reply = match self.fault {
                Fault::HangUpEvery(every) if n % every == 0 => return,
                Fault::ErrorEvery(every) if n % every == 0 => b"-ERR injected\r\n".to_vec(),
                _ => self.store(args),
            };
            let stream = reader.get_mut();
            if stream.write_all(&reply).and_then(|()| stream.flush()).is_err() {
                return;
            }
        }
    }

    fn store(&self, args: Vec<Vec<u8>>) -> Vec<u8> {
        match args.as_slice() {
            [cmd, key, payload] if cmd.as_slice() == b"RPUSH" => {
                let mut received = self.shared.received.lock();
                received.push((String::from_utf8_lossy(key).into_owned(), payload.clone()));
                format!(":{}\r\n", received.len()).into_bytes()
            }
            _ => b"-ERR unknown command\r\n".to_vec(),
        }
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }
    if !line.ends_with(b"\r\n") {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad line"));
    }
    line.truncate(line.len() - 2);
    Ok(Some(line))
}

fn parse_len(line: &[u8], marker: u8) -> io::Result<usize> {
    match line.split_first() {
        Some((&first, rest)) if first == marker => std::str::from_utf8(rest)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad length")),
        _ => Err(io::Error::new(io::ErrorKind::InvalidData, "bad marker")),
    }
}

/// Read one RESP array of bulk strings; `None` on a clean EOF.
fn read_command<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<Vec<u8>>>> {
    let Some(header) = read_line(reader)? else {
        return Ok(None);
    };
    let count = parse_len(&header, b'*')?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let line = read_line(reader)?
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        let len = parse_len(&line, b'$')?;
        let mut arg = vec![0; len + 2];
        reader.read_exact(&mut arg)?;
        arg.truncate(len);
        args.push(arg);
    }
    Ok(Some(args))
}

/// Backoff tight enough for tests.
pub fn fast_policy() -> BackoffPolicy {
    BackoffPolicy {
        min: Duration::from_millis(1),
        max: Duration::from_millis(20),
        ..BackoffPolicy::default()
    }
}
