//! Validating builders for the emitter and the tunnel.
//!
//! Builders collect optional overrides, reject nonsensical values up front,
//! and fill the gaps from the defaults in each component's config module.

use thiserror::Error;

use crate::emitter::AddressError;

/// Errors raised while turning user input into component configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Address(#[from] AddressError),
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err($crate::builders::BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}
pub(crate) use ensure_positive;

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}
pub(crate) use option_setter;

pub mod emitter_builder;
pub mod tunnel_builder;

pub use emitter_builder::{BackoffOverrides, EmitterBuilder};
pub use tunnel_builder::TunnelBuilder;
