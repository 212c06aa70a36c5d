//! Builder for the optional encryption relay.

use std::{path::PathBuf, time::Duration};

use crate::{emitter::StoreAddress, tunnel::TunnelConfig};

use super::{BuildError, ensure_positive, option_setter};

/// Collects the ssl options and relay overrides.
///
/// The three ssl paths are all-or-none: with none set there is no tunnel,
/// with all set [`build`](Self::build) yields a [`TunnelConfig`].
#[derive(Clone, Debug, Default)]
pub struct TunnelBuilder {
    ca_path: Option<PathBuf>,
    certificate: Option<PathBuf>,
    key: Option<PathBuf>,
    stunnel_path: Option<PathBuf>,
    rendezvous: Option<PathBuf>,
    pid_file: Option<PathBuf>,
    ready_timeout_ms: Option<u64>,
}

impl TunnelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    option_setter!(with_ca_path, ca_path, PathBuf);
    option_setter!(with_certificate, certificate, PathBuf);
    option_setter!(with_key, key, PathBuf);
    option_setter!(
        #[doc = "Relay program to launch instead of `stunnel` from `PATH`."]
        with_stunnel_path,
        stunnel_path,
        PathBuf
    );
    option_setter!(with_rendezvous, rendezvous, PathBuf);
    option_setter!(with_pid_file, pid_file, PathBuf);
    option_setter!(with_ready_timeout_ms, ready_timeout_ms, u64);

    /// Whether any ssl option was given.
    pub fn is_requested(&self) -> bool {
        self.ca_path.is_some() || self.certificate.is_some() || self.key.is_some()
    }

    fn missing_ssl_options(&self) -> Vec<&'static str> {
        [
            ("ssl_ca_path", self.ca_path.is_none()),
            ("ssl_certificate", self.certificate.is_none()),
            ("ssl_key", self.key.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }

    /// Relay configuration for `remote`, or `None` when no ssl option is set.
    pub fn build(&self, remote: &StoreAddress) -> Result<Option<TunnelConfig>, BuildError> {
        if !self.is_requested() {
            return Ok(None);
        }
        let missing = self.missing_ssl_options();
        if !missing.is_empty() {
            return Err(BuildError::InvalidConfig(format!(
                "missing {} (all ssl options are required)",
                missing.join(", ")
            )));
        }
        if remote.is_local() {
            return Err(BuildError::InvalidConfig(format!(
                "ssl requires a network store address, got socket path {remote}"
            )));
        }
        let Some(ca_path) = self.ca_path.clone() else {
            return Ok(None);
        };

        let mut config = TunnelConfig::new(ca_path, remote.clone());
        config.certificate = self.certificate.clone();
        config.key = self.key.clone();
        if let Some(program) = &self.stunnel_path {
            config.program = program.clone();
        }
        if let Some(path) = &self.rendezvous {
            config.rendezvous = path.clone();
        }
        if let Some(path) = &self.pid_file {
            config.pid_file = path.clone();
        }
        if let Some(timeout) = self.ready_timeout_ms {
            let timeout = ensure_positive!(timeout, "ready_timeout_ms")?;
            config.ready_timeout = Duration::from_millis(timeout);
        }
        Ok(Some(config))
    }
}
