//! Relay configuration and its rendering to stunnel's config syntax.

use std::{
    env,
    ffi::OsString,
    fmt,
    path::PathBuf,
    process,
    time::Duration,
};

use crate::emitter::StoreAddress;

/// Program launched when no other is configured.
pub const DEFAULT_STUNNEL_PROGRAM: &str = "stunnel";
/// How long to wait for the rendezvous socket to appear.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);
/// Name of the service section in the generated config.
pub const SERVICE_NAME: &str = "lumberjack";

/// Everything needed to launch a client-mode relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TunnelConfig {
    pub program: PathBuf,
    /// Arguments passed to `program`; the config is always piped to stdin.
    pub args: Vec<OsString>,
    pub ca_path: PathBuf,
    pub certificate: Option<PathBuf>,
    pub key: Option<PathBuf>,
    /// The real store the relay connects to.
    pub remote: StoreAddress,
    /// Local socket the relay accepts on.
    pub rendezvous: PathBuf,
    pub pid_file: PathBuf,
    pub ready_timeout: Duration,
}

impl TunnelConfig {
    /// Config for `remote` with the default program and scratch paths.
    pub fn new(ca_path: impl Into<PathBuf>, remote: StoreAddress) -> Self {
        let pid = process::id();
        let scratch = env::temp_dir();
        Self {
            program: PathBuf::from(DEFAULT_STUNNEL_PROGRAM),
            args: vec!["-fd".into(), "0".into()],
            ca_path: ca_path.into(),
            certificate: None,
            key: None,
            remote,
            rendezvous: scratch.join(format!("lumberjack-{pid}.sock")),
            pid_file: scratch.join(format!("lumberjack-stunnel-{pid}.pid")),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    /// Replace the launched command, keeping every other setting.
    pub fn with_command<I, S>(mut self, program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program = program.into();
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// The address the emitter should use while the relay runs.
    pub fn rendezvous_address(&self) -> StoreAddress {
        StoreAddress::Unix(self.rendezvous.clone())
    }

    /// Render the relay's configuration file.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

/// The stunnel configuration text, as piped to the relay's stdin.
impl fmt::Display for TunnelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "compression = deflate")?;
        writeln!(f, "foreground = yes")?;
        writeln!(f, "pid = {}", self.pid_file.display())?;
        writeln!(f, "CAfile = {}", self.ca_path.display())?;
        if let Some(cert) = &self.certificate {
            writeln!(f, "cert = {}", cert.display())?;
        }
        if let Some(key) = &self.key {
            writeln!(f, "key = {}", key.display())?;
        }
        writeln!(f, "options = NO_SSLv2")?;
        writeln!(f, "options = NO_SSLv3")?;
        writeln!(f, "client = yes")?;
        writeln!(f)?;
        writeln!(f, "[{SERVICE_NAME}]")?;
        writeln!(f, "accept = {}", self.rendezvous.display())?;
        writeln!(f, "connect = {}", self.remote)
    }
}
