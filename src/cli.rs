//! Command-line arguments for the `lumberjack` binary.

use std::path::PathBuf;

use clap::Parser;
use lumberjack::settings::{Settings, parse_field};

/// Ship log lines from files to a Redis list.
///
/// If ssl options are given, an stunnel instance is run as a child process
/// to provide the encryption.
#[derive(Parser, Debug)]
#[command(name = "lumberjack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// INI settings file; flags given here take precedence.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Store address: 'host', 'host:port', or 'path/to/unix_socket'.
    #[arg(long)]
    pub redis: Option<String>,

    /// List that events are pushed onto.
    #[arg(long)]
    pub redis_key: Option<String>,

    /// Extra field added to every event. Repeatable.
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field_arg)]
    pub fields: Vec<(String, String)>,

    /// CA certificate file used to verify the store.
    #[arg(long)]
    pub ssl_ca_path: Option<PathBuf>,

    /// Client certificate presented to the store.
    #[arg(long)]
    pub ssl_certificate: Option<PathBuf>,

    /// Key for the client certificate.
    #[arg(long)]
    pub ssl_key: Option<PathBuf>,

    /// stunnel binary to launch.
    #[arg(long)]
    pub stunnel_path: Option<PathBuf>,

    /// Read each file to its end and exit instead of following it.
    #[arg(long)]
    pub once: bool,

    /// Files to ship.
    #[arg(required = true, value_name = "FILE")]
    pub paths: Vec<PathBuf>,
}

impl Cli {
    /// The overrides carried by the flags.
    pub fn settings(&self) -> Settings {
        Settings {
            redis: self.redis.clone(),
            redis_key: self.redis_key.clone(),
            ssl_ca_path: self.ssl_ca_path.clone(),
            ssl_certificate: self.ssl_certificate.clone(),
            ssl_key: self.ssl_key.clone(),
            stunnel_path: self.stunnel_path.clone(),
            fields: self.fields.clone(),
            ..Settings::default()
        }
    }
}

fn parse_field_arg(raw: &str) -> Result<(String, String), String> {
    parse_field(raw).map_err(|err| err.to_string())
}
