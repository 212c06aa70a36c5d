//! Shipper settings from an INI file and the command line.
//!
//! ```ini
//! [lumberjack]
//! redis = logs.example.com:6379
//! redis_key = lumberjack
//! queue_capacity = 100
//!
//! [fields]
//! env = prod
//! ```
//!
//! Command-line values override the file. Extra fields from both sources are
//! kept, file fields first.

use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use ini::Ini;
use log::warn;
use thiserror::Error;

use crate::builders::{BackoffOverrides, EmitterBuilder, TunnelBuilder};

/// Section holding shipper options.
pub const MAIN_SECTION: &str = "lumberjack";
/// Section holding extra event fields.
pub const FIELDS_SECTION: &str = "fields";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is missing, unknown, or does not parse.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{origin} is not valid INI: {message}")]
    Parse { origin: String, message: String },
}

/// Every user-settable option. `None` means "not given here".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub redis: Option<String>,
    pub redis_key: Option<String>,
    pub queue_capacity: Option<usize>,
    pub report_interval: Option<u64>,
    pub backoff_min_ms: Option<u64>,
    pub backoff_max_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub ssl_ca_path: Option<PathBuf>,
    pub ssl_certificate: Option<PathBuf>,
    pub ssl_key: Option<PathBuf>,
    pub stunnel_path: Option<PathBuf>,
    pub fields: Vec<(String, String)>,
}

impl Settings {
    /// Load settings from an INI file on disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini_str(&text, &path.display().to_string())
    }

    /// Parse INI `text`; `origin` names it in errors.
    pub fn from_ini_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|err| ConfigError::Parse {
            origin: origin.to_owned(),
            message: err.to_string(),
        })?;
        let mut settings = Self::default();
        for (section, props) in ini.iter() {
            match section {
                Some(MAIN_SECTION) => {
                    for (key, value) in props.iter() {
                        settings.set(key, value)?;
                    }
                }
                Some(FIELDS_SECTION) => settings.fields.extend(
                    props
                        .iter()
                        .map(|(key, value)| (key.to_owned(), value.to_owned())),
                ),
                None if props.is_empty() => {}
                None => warn!("{origin}: ignoring keys outside any section"),
                Some(other) => warn!("{origin}: ignoring unknown section [{other}]"),
            }
        }
        Ok(settings)
    }

    /// Apply a single `[lumberjack]` key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key {
            "redis" => self.redis = Some(value.to_owned()),
            "redis_key" => self.redis_key = Some(value.to_owned()),
            "queue_capacity" => self.queue_capacity = Some(parse_number(key, value)?),
            "report_interval" => self.report_interval = Some(parse_number(key, value)?),
            "backoff_min_ms" => self.backoff_min_ms = Some(parse_number(key, value)?),
            "backoff_max_ms" => self.backoff_max_ms = Some(parse_number(key, value)?),
            "max_attempts" => self.max_attempts = Some(parse_number(key, value)?),
            "ssl_ca_path" => self.ssl_ca_path = Some(value.into()),
            "ssl_certificate" => self.ssl_certificate = Some(value.into()),
            "ssl_key" => self.ssl_key = Some(value.into()),
            "stunnel_path" => self.stunnel_path = Some(value.into()),
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown option {other:?} in [{MAIN_SECTION}]"
                )));
            }
        }
        Ok(())
    }

    /// Layer `overrides` on top of `self`.
    pub fn merge(mut self, overrides: Settings) -> Self {
        fn pick<T>(base: &mut Option<T>, over: Option<T>) {
            if over.is_some() {
                *base = over;
            }
        }
        pick(&mut self.redis, overrides.redis);
        pick(&mut self.redis_key, overrides.redis_key);
        pick(&mut self.queue_capacity, overrides.queue_capacity);
        pick(&mut self.report_interval, overrides.report_interval);
        pick(&mut self.backoff_min_ms, overrides.backoff_min_ms);
        pick(&mut self.backoff_max_ms, overrides.backoff_max_ms);
        pick(&mut self.max_attempts, overrides.max_attempts);
        pick(&mut self.ssl_ca_path, overrides.ssl_ca_path);
        pick(&mut self.ssl_certificate, overrides.ssl_certificate);
        pick(&mut self.ssl_key, overrides.ssl_key);
        pick(&mut self.stunnel_path, overrides.stunnel_path);
        self.fields.extend(overrides.fields);
        self
    }

    pub fn emitter_builder(&self) -> EmitterBuilder {
        let mut backoff = BackoffOverrides::new();
        if let Some(ms) = self.backoff_min_ms {
            backoff = backoff.with_min_ms(ms);
        }
        if let Some(ms) = self.backoff_max_ms {
            backoff = backoff.with_max_ms(ms);
        }
        if let Some(attempts) = self.max_attempts {
            backoff = backoff.with_max_attempts(attempts);
        }
        let mut builder = EmitterBuilder::new().with_backoff(backoff);
        if let Some(redis) = &self.redis {
            builder = builder.with_address(redis.clone());
        }
        if let Some(key) = &self.redis_key {
            builder = builder.with_list_key(key.clone());
        }
        if let Some(capacity) = self.queue_capacity {
            builder = builder.with_queue_capacity(capacity);
        }
        if let Some(interval) = self.report_interval {
            builder = builder.with_report_interval(interval);
        }
        builder
    }

    pub fn tunnel_builder(&self) -> TunnelBuilder {
        let mut builder = TunnelBuilder::new();
        if let Some(path) = &self.ssl_ca_path {
            builder = builder.with_ca_path(path.clone());
        }
        if let Some(path) = &self.ssl_certificate {
            builder = builder.with_certificate(path.clone());
        }
        if let Some(path) = &self.ssl_key {
            builder = builder.with_key(path.clone());
        }
        if let Some(path) = &self.stunnel_path {
            builder = builder.with_stunnel_path(path.clone());
        }
        builder
    }
}

/// Split a `key=value` field assignment at the first `=`.
pub fn parse_field(raw: &str) -> Result<(String, String), ConfigError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(ConfigError::InvalidConfig(format!(
            "invalid field {raw:?}, expected 'foo=bar' form"
        ))),
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| ConfigError::InvalidConfig(format!("{key} = {value:?}: {err}")))
}
