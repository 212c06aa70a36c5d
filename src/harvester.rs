//! Line-oriented file producer.
//!
//! A [`Harvester`] reads one file from the start, turns every line into a
//! [`FieldSet`], and pushes the encoded record onto the queue. In follow mode
//! it keeps polling for appended data once it reaches the end of the file.
//! Rotation and truncation are not detected.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, info};
use thiserror::Error;

use crate::{
    codec::{CodecError, FieldSet, encode},
    queue::QueueSender,
};

/// Sleep between end-of-file checks when following.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("record queue closed while harvesting {0:?}")]
    QueueClosed(PathBuf),
    #[error("failed to spawn harvester thread: {0}")]
    Spawn(#[source] io::Error),
}

/// What a harvester pushed before it stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HarvestStats {
    pub lines: u64,
    /// Bytes consumed from the file, line terminators included.
    pub bytes: u64,
}

/// The local hostname, lossily decoded.
pub fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

pub struct Harvester {
    path: PathBuf,
    host: String,
    fields: Vec<(String, String)>,
    follow: bool,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    queue: QueueSender,
}

impl Harvester {
    pub fn new(path: impl Into<PathBuf>, queue: QueueSender) -> Self {
        Self {
            path: path.into(),
            host: local_hostname(),
            fields: Vec::new(),
            follow: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop: Arc::new(AtomicBool::new(false)),
            queue,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Extra fields appended to every event, in order.
    pub fn with_fields(mut self, fields: Vec<(String, String)>) -> Self {
        self.fields = fields;
        self
    }

    /// Keep polling at end of file instead of returning.
    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Flag that ends a following harvester at its next end-of-file check.
    ///
    /// An unterminated last line is shipped before it returns.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build the event for one line starting at byte `offset`.
    pub fn event(&self, offset: u64, line: &[u8]) -> FieldSet {
        let mut event = FieldSet::with_capacity(4 + self.fields.len());
        event.push("file", self.path.to_string_lossy().as_bytes());
        event.push("host", self.host.as_bytes());
        event.push("offset", offset.to_string());
        event.push("line", line);
        for (key, value) in &self.fields {
            event.push(key.as_bytes(), value.as_bytes());
        }
        event
    }

    /// Read the file until end (or until stopped when following).
    pub fn run(self) -> Result<HarvestStats, HarvestError> {
        let file = File::open(&self.path).map_err(|source| HarvestError::Open {
            path: self.path.clone(),
            source,
        })?;
        info!("harvesting {:?}", self.path);
        let mut reader = BufReader::new(file);
        let mut stats = HarvestStats::default();
        let mut buf = Vec::new();
        loop {
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| HarvestError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            if buf.last() == Some(&b'\n') {
                self.ship_line(&mut stats, &mut buf)?;
                continue;
            }
            if read > 0 {
                // Partial line; wait for the rest.
                continue;
            }
            if !self.follow || self.stop.load(Ordering::Acquire) {
                if !buf.is_empty() {
                    debug!("shipping unterminated last line of {:?}", self.path);
                    self.ship_line(&mut stats, &mut buf)?;
                }
                break;
            }
            thread::sleep(self.poll_interval);
        }
        debug!(
            "finished {:?}: {} lines, {} bytes",
            self.path, stats.lines, stats.bytes
        );
        Ok(stats)
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> Result<JoinHandle<Result<HarvestStats, HarvestError>>, HarvestError> {
        thread::Builder::new()
            .name("lumberjack-harvester".into())
            .spawn(move || self.run())
            .map_err(HarvestError::Spawn)
    }

    /// Enqueue the line in `buf`, then advance `stats` and clear `buf`.
    fn ship_line(&self, stats: &mut HarvestStats, buf: &mut Vec<u8>) -> Result<(), HarvestError> {
        let record = encode(&self.event(stats.bytes, trim_newline(buf)))?;
        self.queue
            .enqueue(record)
            .map_err(|_| HarvestError::QueueClosed(self.path.clone()))?;
        stats.lines += 1;
        stats.bytes += buf.len() as u64;
        buf.clear();
        Ok(())
    }
}

impl std::fmt::Debug for Harvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("path", &self.path)
            .field("host", &self.host)
            .field("follow", &self.follow)
            .finish_non_exhaustive()
    }
}

fn trim_newline(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use std::{fs::OpenOptions, io::Write};

    use rstest::{fixture, rstest};
    use tempfile::NamedTempFile;

    use super::*;
    use crate::{codec::decode, queue::record_queue};

    #[fixture]
    fn log_file() -> NamedTempFile {
        NamedTempFile::new().expect("temp file")
    }

    fn lines_of(rx: &crate::queue::QueueReceiver) -> Vec<FieldSet> {
        let mut events = Vec::new();
        while let Ok(record) = rx.dequeue_timeout(Duration::from_millis(10)) {
            events.push(decode(record.as_bytes()).expect("decodable"));
        }
        events
    }

    #[rstest]
    fn ships_each_line_with_fields(mut log_file: NamedTempFile) {
        write!(log_file, "first\r\nsecond\n\nlast").expect("write");
        let (tx, rx) = record_queue(16);
        let stats = Harvester::new(log_file.path(), tx)
            .with_host("web1")
            .with_fields(vec![("env".into(), "prod".into())])
            .run()
            .expect("harvest");

        assert_eq!(stats, HarvestStats { lines: 4, bytes: 19 });
        let events = lines_of(&rx);
        let lines: Vec<_> = events.iter().map(|e| e.get(b"line").expect("line")).collect();
        assert_eq!(lines, [&b"first"[..], b"second", b"", b"last"]);
        let offsets: Vec<_> = events.iter().map(|e| e.get(b"offset").expect("offset")).collect();
        assert_eq!(offsets, [&b"0"[..], b"7", b"14", b"15"]);

        let first = &events[0];
        let keys: Vec<_> = first.iter().map(|f| f.key.as_slice()).collect();
        assert_eq!(keys, [&b"file"[..], b"host", b"offset", b"line", b"env"]);
        assert_eq!(first.get(b"host"), Some(&b"web1"[..]));
        assert_eq!(
            first.get(b"file"),
            Some(log_file.path().to_string_lossy().as_bytes())
        );
        assert_eq!(first.get(b"env"), Some(&b"prod"[..]));
    }

    #[rstest]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (tx, _rx) = record_queue(1);
        let err = Harvester::new(dir.path().join("absent.log"), tx)
            .run()
            .expect_err("open must fail");
        assert!(matches!(err, HarvestError::Open { .. }));
    }

    #[rstest]
    fn closed_queue_stops_harvest(mut log_file: NamedTempFile) {
        writeln!(log_file, "orphan").expect("write");
        let (tx, rx) = record_queue(1);
        drop(rx);
        let err = Harvester::new(log_file.path(), tx).run().expect_err("no consumer");
        assert!(matches!(err, HarvestError::QueueClosed(_)));
    }

    #[rstest]
    fn follow_picks_up_appended_lines(log_file: NamedTempFile) {
        let path = log_file.path().to_path_buf();
        let (tx, rx) = record_queue(16);
        let harvester = Harvester::new(&path, tx)
            .follow(true)
            .with_poll_interval(Duration::from_millis(5));
        let stop = harvester.stop_flag();
        let handle = harvester.spawn().expect("spawn");

        let mut file = OpenOptions::new().append(true).open(&path).expect("open");
        write!(file, "par").expect("write");
        file.flush().expect("flush");
        thread::sleep(Duration::from_millis(30));
        writeln!(file, "tial").expect("write");
        file.flush().expect("flush");

        let record = rx
            .dequeue_timeout(Duration::from_secs(5))
            .expect("appended line shipped");
        let event = decode(record.as_bytes()).expect("decodable");
        assert_eq!(event.get(b"line"), Some(&b"partial"[..]));

        stop.store(true, Ordering::Release);
        let stats = handle.join().expect("thread").expect("harvest");
        assert_eq!(stats.lines, 1);
    }

    #[rstest]
    fn stop_ships_buffered_partial_line(log_file: NamedTempFile) {
        let path = log_file.path().to_path_buf();
        let (tx, rx) = record_queue(16);
        let harvester = Harvester::new(&path, tx)
            .follow(true)
            .with_poll_interval(Duration::from_millis(5));
        let stop = harvester.stop_flag();
        let handle = harvester.spawn().expect("spawn");

        let mut file = OpenOptions::new().append(true).open(&path).expect("open");
        write!(file, "complete\nno newline yet").expect("write");
        file.flush().expect("flush");
        thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::Release);

        let stats = handle.join().expect("thread").expect("harvest");
        assert_eq!(stats, HarvestStats { lines: 2, bytes: 23 });
        let lines: Vec<_> = lines_of(&rx)
            .iter()
            .map(|e| e.get(b"line").expect("line").to_vec())
            .collect();
        assert_eq!(lines, [b"complete".to_vec(), b"no newline yet".to_vec()]);
    }
}
