//! Encrypted transport through a relay subprocess.
//!
//! When ssl options are configured the shipper does not speak TLS itself.
//! It starts `stunnel` in client mode, accepting on a local Unix socket and
//! forwarding to the real store, then points the emitter at that socket.

mod config;
mod process;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_READY_TIMEOUT, DEFAULT_STUNNEL_PROGRAM, SERVICE_NAME, TunnelConfig};
pub use process::{TunnelError, TunnelProcess};
