//! Lifecycle of the relay child process.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::emitter::StoreAddress;

use super::config::TunnelConfig;

const READY_POLL: Duration = Duration::from_millis(20);

/// Fatal tunnel failures. None of these are retried.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to launch {program:?}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to pass configuration to the relay: {0}")]
    Configure(#[source] io::Error),
    #[error("relay exited before it was ready ({0})")]
    ExitedEarly(ExitStatus),
    #[error("relay socket {path:?} did not appear within {timeout:?}")]
    ReadyTimeout { path: PathBuf, timeout: Duration },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A running relay.
///
/// Dropping the process kills the child and removes its scratch files.
#[derive(Debug)]
pub struct TunnelProcess {
    child: Option<Child>,
    config: TunnelConfig,
}

impl TunnelProcess {
    /// Launch the relay and pipe it its configuration.
    pub fn start(config: TunnelConfig) -> Result<Self, TunnelError> {
        remove_stale(&config.rendezvous)?;
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|source| TunnelError::Launch {
                program: config.program.clone(),
                source,
            })?;
        info!(
            "started relay {:?} (pid {}) for {}",
            config.program,
            child.id(),
            config.remote
        );
        // Wrap first so a failed write still reaps the child.
        let mut process = Self {
            child: None,
            config,
        };
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(process.config.render().as_bytes()),
            None => Err(io::Error::other("relay stdin was not captured")),
        };
        process.child = Some(child);
        written.map_err(TunnelError::Configure)?;
        Ok(process)
    }

    /// Block until the rendezvous socket exists.
    pub fn wait_ready(&mut self) -> Result<StoreAddress, TunnelError> {
        let timeout = self.config.ready_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            if self.config.rendezvous.exists() {
                debug!("relay listening on {:?}", self.config.rendezvous);
                return Ok(self.rendezvous_address());
            }
            if let Some(status) = self.try_wait()? {
                self.child = None;
                return Err(TunnelError::ExitedEarly(status));
            }
            if Instant::now() >= deadline {
                return Err(TunnelError::ReadyTimeout {
                    path: self.config.rendezvous.clone(),
                    timeout,
                });
            }
            thread::sleep(READY_POLL);
        }
    }

    pub fn rendezvous_address(&self) -> StoreAddress {
        self.config.rendezvous_address()
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    /// Child pid, while it runs.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Kill the relay, reap it, and remove its scratch files.
    pub fn terminate(&mut self) -> Result<Option<ExitStatus>, TunnelError> {
        let status = match self.child.take() {
            Some(mut child) => {
                if let Err(err) = child.kill()
                    && err.kind() != io::ErrorKind::InvalidInput
                {
                    return Err(err.into());
                }
                Some(child.wait()?)
            }
            None => None,
        };
        remove_stale(&self.config.rendezvous)?;
        remove_stale(&self.config.pid_file)?;
        Ok(status)
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.try_wait(),
            None => Ok(None),
        }
    }
}

impl Drop for TunnelProcess {
    fn drop(&mut self) {
        if let Err(err) = self.terminate() {
            warn!("failed to stop relay: {err}");
        }
    }
}

fn remove_stale(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
